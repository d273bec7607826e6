use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Output captured from one shell command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Position of the command in the plan
    pub index: usize,
    /// The shell line as given by the plan
    pub command: String,
    /// Combined stdout output
    pub stdout: String,
    /// Combined stderr output
    pub stderr: String,
    /// Exit code, `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    /// Duration of execution
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl CommandOutput {
    /// Exit code 0 is the only success criterion
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Count lines in stdout
    pub fn stdout_lines(&self) -> usize {
        self.stdout.lines().count()
    }
}

/// Result of a command batch in which no command failed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandBatchReport {
    /// Outputs of the commands that ran, in order
    pub outputs: Vec<CommandOutput>,
    /// Set when the batch ended early on a tolerated "not found" launch error
    pub tolerated_missing: Option<ToleratedLaunch>,
}

impl CommandBatchReport {
    /// Number of commands that ran to completion
    pub fn completed(&self) -> usize {
        self.outputs.len()
    }
}

/// A launch failure that was accepted as success
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToleratedLaunch {
    pub index: usize,
    pub command: String,
    pub error: String,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
