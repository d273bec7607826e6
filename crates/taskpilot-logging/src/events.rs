use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Category of a narrated line, used for styling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeTag {
    Info,
    Success,
    Error,
    Command,
}

/// Type of output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Stdout,
    Stderr,
}

/// Structured log events for the plan/execute loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    SessionStarted {
        task: String,
        working_dir: PathBuf,
        platform: String,
        model: String,
    },
    StateChanged {
        iteration: usize,
        from: String,
        to: String,
    },
    GenerationStarted {
        iteration: usize,
        prompt_len: usize,
    },
    GenerationCompleted {
        iteration: usize,
        plan: String,
        duration_secs: f64,
    },
    GenerationFailed {
        iteration: usize,
        error: String,
    },
    PlanApproved {
        iteration: usize,
    },
    PlanDeclined {
        iteration: usize,
    },
    FileWritten {
        iteration: usize,
        path: PathBuf,
        bytes: usize,
    },
    FileWriteFailed {
        iteration: usize,
        path: PathBuf,
        error: String,
    },
    CommandStarted {
        iteration: usize,
        index: usize,
        command: String,
    },
    /// Streaming output line from a running command
    CommandOutputLine {
        iteration: usize,
        index: usize,
        stream: StreamType,
        line: String,
    },
    CommandSucceeded {
        iteration: usize,
        index: usize,
        duration_secs: f64,
    },
    CommandFailed {
        iteration: usize,
        index: usize,
        command: String,
        exit_code: Option<i32>,
        diagnostic: Option<String>,
    },
    MissingExecutableTolerated {
        iteration: usize,
        index: usize,
        command: String,
        error: String,
    },
    AbortRequested {
        during_execution: bool,
    },
    FeedbackRecorded {
        iteration: usize,
        feedback: String,
    },
    SessionFinished {
        outcome: String,
        iterations: usize,
        duration_secs: f64,
    },
}

impl LogEvent {
    /// Narration category of the event
    pub fn tag(&self) -> NoticeTag {
        match self {
            LogEvent::CommandStarted { .. } => NoticeTag::Command,
            LogEvent::GenerationCompleted { .. }
            | LogEvent::PlanApproved { .. }
            | LogEvent::FileWritten { .. }
            | LogEvent::CommandSucceeded { .. }
            | LogEvent::MissingExecutableTolerated { .. } => NoticeTag::Success,
            LogEvent::GenerationFailed { .. }
            | LogEvent::FileWriteFailed { .. }
            | LogEvent::CommandFailed { .. } => NoticeTag::Error,
            LogEvent::SessionFinished { outcome, .. } if outcome == "succeeded" => {
                NoticeTag::Success
            }
            _ => NoticeTag::Info,
        }
    }

    /// One-line human-readable description
    pub fn message(&self) -> String {
        match self {
            LogEvent::SessionStarted { task, .. } => format!("Task: {}", task),
            LogEvent::StateChanged { from, to, .. } => format!("{} -> {}", from, to),
            LogEvent::GenerationStarted { .. } => "Generating plan...".to_string(),
            LogEvent::GenerationCompleted {
                plan,
                duration_secs,
                ..
            } => format!("Plan ready: {} ({:.1}s)", plan, duration_secs),
            LogEvent::GenerationFailed { error, .. } => {
                format!("Could not generate a plan: {}", error)
            }
            LogEvent::PlanApproved { .. } => "Plan approved".to_string(),
            LogEvent::PlanDeclined { .. } => "Task aborted by user".to_string(),
            LogEvent::FileWritten { path, bytes, .. } => {
                format!("Created file: {} ({} bytes)", path.display(), bytes)
            }
            LogEvent::FileWriteFailed { path, error, .. } => {
                format!("Error creating {}: {}", path.display(), error)
            }
            LogEvent::CommandStarted { command, .. } => format!("Executing: {}", command),
            LogEvent::CommandOutputLine { line, .. } => line.clone(),
            LogEvent::CommandSucceeded { duration_secs, .. } => {
                format!("Command executed ({:.1}s)", duration_secs)
            }
            LogEvent::CommandFailed {
                command,
                exit_code,
                diagnostic,
                ..
            } => {
                let mut msg = match exit_code {
                    Some(code) => format!("Command failed with error code {}: {}", code, command),
                    None => format!("Command did not complete: {}", command),
                };
                if let Some(diagnostic) = diagnostic {
                    msg.push_str(&format!("\nError output:\n{}", diagnostic));
                }
                msg
            }
            LogEvent::MissingExecutableTolerated { command, error, .. } => format!(
                "Launcher reported '{}' for `{}`; treated as executed, remaining commands skipped",
                error, command
            ),
            LogEvent::AbortRequested {
                during_execution: true,
            } => "Abort requested; the running command will not be stopped, aborting once the batch finishes"
                .to_string(),
            LogEvent::AbortRequested { .. } => "Abort requested, stopping".to_string(),
            LogEvent::FeedbackRecorded { feedback, .. } => {
                format!("Refining task with your feedback: {}", feedback)
            }
            LogEvent::SessionFinished {
                outcome,
                iterations,
                duration_secs,
            } => format!(
                "Session {} after {} iteration(s) ({:.1}s)",
                outcome, iterations, duration_secs
            ),
        }
    }

    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for taskpilot events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // Log to file if configured (always JSON format for file)
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::SessionStarted {
                task,
                working_dir,
                platform,
                model,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╭─────────────────────────────────────────────────────────────────────╮"
                        .bright_blue()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {}{}",
                    "│".bright_blue(),
                    "taskpilot".bold().bright_white(),
                    " ".repeat(58) + &"│".bright_blue().to_string()
                );
                let dir = working_dir.display().to_string();
                for (label, value, max_len) in [
                    ("Task:", task.as_str(), 61),
                    ("Dir:", dir.as_str(), 62),
                    ("Platform:", platform.as_str(), 57),
                    ("Model:", model.as_str(), 60),
                ] {
                    let _ = writeln!(
                        stderr,
                        "{}  {} {}",
                        "│".bright_blue(),
                        label.dimmed(),
                        Self::truncate_with_padding(value, max_len, 67 - label.len()).dimmed()
                    );
                }
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╰─────────────────────────────────────────────────────────────────────╯"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::GenerationStarted { iteration, .. } => {
                let iter_text = format!("─ Iteration {} ", iteration + 1);
                let padding = "─".repeat(67usize.saturating_sub(iter_text.chars().count()));
                let _ = writeln!(
                    stderr,
                    "{}{}{}",
                    "┌".bright_blue(),
                    iter_text.bright_blue().bold(),
                    padding.bright_blue()
                );
                let _ = writeln!(stderr, "  {} {}", "▶".bright_cyan(), event.message());
            }
            LogEvent::StateChanged { .. } => {
                // Debug detail, available in json and compact formats
            }
            LogEvent::CommandOutputLine { line, stream, .. } => {
                let prefix = "    │".dimmed();
                let styled_line = match stream {
                    StreamType::Stdout => line.normal(),
                    StreamType::Stderr => line.dimmed(),
                };
                let _ = writeln!(stderr, "{} {}", prefix, styled_line);
            }
            _ => {
                let message = event.message();
                let styled = match event.tag() {
                    NoticeTag::Success => format!("✓ {}", message).bright_green(),
                    NoticeTag::Error => format!("✗ {}", message).bright_red(),
                    NoticeTag::Command => format!("⚙ {}", message).bright_cyan(),
                    NoticeTag::Info => message.normal(),
                };
                let _ = writeln!(stderr, "  {}", styled);
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let _ = writeln!(std::io::stderr(), "{}", Self::compact_line(event));
    }

    fn compact_line(event: &LogEvent) -> String {
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let tag = match event.tag() {
            NoticeTag::Info => "info",
            NoticeTag::Success => "ok",
            NoticeTag::Error => "error",
            NoticeTag::Command => "cmd",
        };
        let message = event.message().replace('\n', " | ");
        format!("[{}] {}: {}", timestamp, tag, message)
    }

    /// Truncate a string and pad to exact width
    fn truncate_with_padding(s: &str, max_len: usize, total_width: usize) -> String {
        let truncated = if s.chars().count() > max_len {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{}...", kept)
        } else {
            s.to_string()
        };

        let padding_needed = total_width.saturating_sub(truncated.chars().count() + 1);
        format!("{}{}│", truncated, " ".repeat(padding_needed))
    }
}
