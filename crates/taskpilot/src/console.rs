//! Terminal presenter built on dialoguer prompts.

use async_trait::async_trait;
use colored::Colorize;
use dialoguer::{Confirm, Input};
use std::io::{self, IsTerminal};

use taskpilot_core::{Presenter, PresenterError};
use taskpilot_plan::Plan;

/// Characters of file content shown in the plan preview
const PREVIEW_CHARS: usize = 200;

#[derive(Default)]
pub struct ConsolePresenter;

impl ConsolePresenter {
    pub fn new() -> Self {
        Self
    }
}

/// Run a blocking dialoguer prompt off the async runtime
async fn prompt<T, F>(f: F) -> Result<T, PresenterError>
where
    T: Send + 'static,
    F: FnOnce() -> dialoguer::Result<T> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PresenterError::Io(io::Error::other(e)))?;

    result.map_err(|err| match err {
        dialoguer::Error::IO(e) => match e.kind() {
            io::ErrorKind::Interrupted => PresenterError::Interrupted,
            io::ErrorKind::UnexpectedEof => PresenterError::Closed,
            _ => PresenterError::Io(e),
        },
    })
}

/// Undo terminal changes left by a prompt that never finished.
///
/// Prompts run on blocking threads; when an abort wins the race the thread
/// keeps the terminal until the process exits.
pub fn restore_terminal() {
    if !io::stderr().is_terminal() {
        return;
    }
    let _ = crossterm::terminal::disable_raw_mode();
    let _ = crossterm::execute!(io::stderr(), crossterm::cursor::Show);
}

/// Flatten newlines and cut to the preview length
fn preview(content: &str) -> String {
    let flat = content.replace(['\r', '\n'], " ");
    if flat.chars().count() > PREVIEW_CHARS {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        flat
    }
}

#[async_trait]
impl Presenter for ConsolePresenter {
    async fn request_task(&self) -> Result<String, PresenterError> {
        prompt(|| {
            Input::<String>::new()
                .with_prompt("What task would you like to accomplish?")
                .interact_text()
        })
        .await
    }

    fn show_plan(&self, plan: &Plan) {
        eprintln!();
        eprintln!("{}", "Proposed plan:".bold());
        for (i, step) in plan.steps.iter().enumerate() {
            eprintln!("  {} {}", format!("{}.", i + 1).dimmed(), step);
        }

        if plan.has_commands() {
            eprintln!();
            eprintln!("{}", "Commands to execute:".bold());
            for command in &plan.commands {
                eprintln!("  {} {}", "$".bright_blue(), command.bright_blue());
            }
        }

        if plan.has_files() {
            eprintln!();
            eprintln!("{}", "Files to create:".bold());
            for file in &plan.files {
                eprintln!("  {}", file.path.cyan());
                eprintln!("    {}", preview(&file.content).dimmed());
            }
        }
        eprintln!();
    }

    async fn request_approval(&self, _plan: &Plan) -> Result<bool, PresenterError> {
        prompt(|| {
            Confirm::new()
                .with_prompt("Do you want to proceed with this plan?")
                .interact()
        })
        .await
    }

    async fn request_outcome_judgment(&self) -> Result<bool, PresenterError> {
        prompt(|| {
            Confirm::new()
                .with_prompt("Did the task complete successfully?")
                .interact()
        })
        .await
    }

    async fn request_feedback(&self) -> Result<String, PresenterError> {
        prompt(|| {
            Input::<String>::new()
                .with_prompt("What went wrong? Please provide feedback")
                .allow_empty(true)
                .interact_text()
        })
        .await
    }
}
