mod config;
mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::debug;

use taskpilot_core::{AbortReason, LoopOutcome, TaskLoopController};
use taskpilot_exec::ExecConfig;
use taskpilot_logging::{init_tracing, LogFormat, Logger};
use taskpilot_model::GeminiModel;
use taskpilot_plan::{PlanPrompts, PlatformProfile, Task};

use crate::config::{CliOverrides, ConfigFile, Settings, API_KEY_ENV};
use crate::console::ConsolePresenter;

#[derive(Parser, Debug)]
#[command(
    name = "taskpilot",
    about = "Turn a task into an AI-generated plan, approve it, and run it",
    version,
    author
)]
struct Cli {
    /// Task description (prompted for if not provided)
    #[arg(short, long)]
    task: Option<String>,

    /// Working directory (default: current directory)
    #[arg(short = 'd', long)]
    working_dir: Option<PathBuf>,

    /// Model to request plans from
    #[arg(short, long)]
    model: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Diagnostic log level (overridden by RUST_LOG)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Append events as JSON lines to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Output final result as JSON
    #[arg(long)]
    json_output: bool,

    /// Dry run: show resolved settings and the first prompt without contacting the model
    #[arg(long)]
    dry_run: bool,

    /// Treat a command whose launcher is not found as a failure
    #[arg(long)]
    no_tolerate_missing_executable: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.into();
    init_tracing(&cli.log_level, log_format);

    let working_dir = match cli.working_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    if !working_dir.is_dir() {
        anyhow::bail!(
            "Working directory {} does not exist or is not a directory",
            working_dir.display()
        );
    }

    let global = ConfigFile::load_global().context("Failed to load global configuration")?;
    let project =
        ConfigFile::load_project(&working_dir).context("Failed to load project configuration")?;
    let overrides = CliOverrides {
        model: cli.model.clone(),
        no_tolerate_missing_executable: cli.no_tolerate_missing_executable,
    };
    let settings = Settings::resolve(&overrides, std::env::var(API_KEY_ENV).ok(), project, global);
    debug!(?settings, "Resolved settings");

    let platform = PlatformProfile::detect();
    let task = cli
        .task
        .clone()
        .map(Task::new)
        .transpose()
        .context("Invalid --task")?;

    if cli.dry_run {
        print_dry_run(&settings, &working_dir, &platform, task.as_ref());
        return Ok(());
    }

    let model = GeminiModel::new(settings.gemini_config()?)
        .context("Failed to create the model client")?;

    let logger = match cli.log_file {
        Some(ref path) => Logger::with_file(log_format, path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(log_format),
    };
    let logger = Arc::new(logger);

    let mut exec_config = ExecConfig::new(working_dir)
        .with_platform(platform)
        .with_tolerate_missing_executable(settings.tolerate_missing_executable);
    for (key, value) in &settings.command_env {
        exec_config = exec_config.with_env(key.clone(), value.clone());
    }

    let presenter = ConsolePresenter::new();
    let controller = TaskLoopController::new(&model, &presenter, exec_config, logger);

    // First Ctrl+C stops the loop at the next safe point, a second one exits
    let abort = controller.abort_handle();
    ctrlc::set_handler(move || {
        if abort.request() {
            console::restore_terminal();
            eprintln!("\nInterrupted again. Exiting.");
            std::process::exit(130);
        }
    })
    .context("Failed to set Ctrl+C handler")?;

    let outcome = match task {
        Some(task) => controller.run(task).await?,
        None => controller.run_interactive().await?,
    };

    // A prompt abandoned by an abort may have left the cursor hidden
    console::restore_terminal();

    if cli.json_output {
        let json = serde_json::to_string_pretty(&outcome)?;
        println!("{}", json);
    } else {
        print_outcome(&outcome);
    }

    std::process::exit(outcome.exit_code());
}

fn print_dry_run(
    settings: &Settings,
    working_dir: &std::path::Path,
    platform: &PlatformProfile,
    task: Option<&Task>,
) {
    println!("=== Dry Run ===");
    println!("Working dir: {}", working_dir.display());
    println!("Platform: {}", platform.os_name);
    println!("{}", settings);
    match task {
        Some(task) => {
            println!();
            println!("=== First Prompt ===");
            println!("{}", PlanPrompts::build(task, None, platform));
        }
        None => println!("Task: (will be prompted)"),
    }
}

fn print_outcome(outcome: &LoopOutcome) {
    match outcome {
        LoopOutcome::Succeeded {
            iterations,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("=== SUCCESS ===");
            eprintln!("Iterations: {}", iterations);
            eprintln!("Duration: {:.1}s", total_duration_secs);
        }
        LoopOutcome::AbortedByUser {
            iterations,
            reason,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            match reason {
                AbortReason::Declined => {
                    eprintln!("=== PLAN DECLINED ===");
                    eprintln!("Stopped after {} iteration(s)", iterations);
                }
                AbortReason::Interrupted => {
                    eprintln!("=== INTERRUPTED ===");
                    eprintln!("User stopped after {} iteration(s)", iterations);
                }
            }
            eprintln!("Duration: {:.1}s", total_duration_secs);
        }
    }
}
