use std::io::ErrorKind;
use tracing::{debug, info, warn};

use crate::shell::run_line;
use crate::{
    CommandBatchReport, CommandFailure, ExecCallback, ExecConfig, ExecEvent, ToleratedLaunch,
};

/// Runs a plan's commands in order, stopping at the first failure
pub struct CommandExecutor<'a> {
    config: &'a ExecConfig,
}

impl<'a> CommandExecutor<'a> {
    pub fn new(config: &'a ExecConfig) -> Self {
        Self { config }
    }

    /// Run every command in order
    pub async fn execute(&self, commands: &[String]) -> Result<CommandBatchReport, CommandFailure> {
        self.execute_with_callback(commands, None).await
    }

    /// Run every command in order, streaming progress to `on_event`.
    ///
    /// Commands after the first failing one are never launched.
    pub async fn execute_with_callback(
        &self,
        commands: &[String],
        on_event: Option<ExecCallback>,
    ) -> Result<CommandBatchReport, CommandFailure> {
        let mut report = CommandBatchReport::default();

        // A missing directory also fails spawns with NotFound
        if let (Some(first), Err(e)) = (commands.first(), self.config.check_working_dir()) {
            warn!(error = %e, "Cannot run commands");
            return Err(CommandFailure {
                index: 0,
                command: first.clone(),
                exit_code: None,
                stderr: None,
                launch_error: Some(e.to_string()),
            });
        }

        for (index, command) in commands.iter().enumerate() {
            if let Some(ref callback) = on_event {
                callback(ExecEvent::CommandStarted { index, command });
            }

            let output = match run_line(index, command, self.config, on_event.as_ref()).await {
                Ok(output) => output,
                Err(e)
                    if e.kind() == ErrorKind::NotFound
                        && self.config.tolerate_missing_executable =>
                {
                    warn!(
                        index,
                        command = command.as_str(),
                        error = %e,
                        "Launcher reported not found; treating as success and ending the batch"
                    );
                    report.tolerated_missing = Some(ToleratedLaunch {
                        index,
                        command: command.clone(),
                        error: e.to_string(),
                    });
                    return Ok(report);
                }
                Err(e) => {
                    warn!(index, command = command.as_str(), error = %e, "Command could not be launched");
                    return Err(CommandFailure {
                        index,
                        command: command.clone(),
                        exit_code: None,
                        stderr: None,
                        launch_error: Some(e.to_string()),
                    });
                }
            };

            if let Some(ref callback) = on_event {
                callback(ExecEvent::CommandFinished {
                    index,
                    exit_code: output.exit_code,
                    duration: output.duration,
                });
            }

            if !output.success() {
                info!(
                    index,
                    exit_code = ?output.exit_code,
                    "Command failed; skipping remaining commands"
                );
                return Err(CommandFailure {
                    index,
                    command: command.clone(),
                    exit_code: output.exit_code,
                    stderr: (!output.stderr.is_empty()).then(|| output.stderr.clone()),
                    launch_error: None,
                });
            }

            debug!(index, stdout_lines = output.stdout_lines(), "Command succeeded");
            report.outputs.push(output);
        }

        Ok(report)
    }
}
