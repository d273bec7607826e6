mod config;
mod error;
mod executor;
mod materializer;
mod output;
mod shell;

pub use config::{ExecCallback, ExecConfig, ExecEvent};
pub use error::{CommandFailure, FileWriteError};
pub use executor::CommandExecutor;
pub use materializer::FileMaterializer;
pub use output::{CommandBatchReport, CommandOutput, ToleratedLaunch};
pub use shell::ShellInvocation;
pub use taskpilot_logging::StreamType;
