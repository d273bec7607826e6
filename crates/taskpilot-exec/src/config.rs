use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use taskpilot_logging::StreamType;
use taskpilot_plan::PlatformProfile;

/// Configuration shared by the file materializer and command executor
#[derive(Debug, Clone)]
pub struct ExecConfig {
    /// Directory commands run in and relative file paths resolve against
    pub working_dir: PathBuf,
    /// Host platform, selects the shell invocation strategy
    pub platform: PlatformProfile,
    /// Extra environment for spawned commands, from `[execution.env]`
    pub env_vars: HashMap<String, String>,
    /// Treat a "not found" launch error as success and end the batch there.
    ///
    /// Some hosts report a legitimate command as missing; disabling this
    /// turns that case into an ordinary command failure.
    pub tolerate_missing_executable: bool,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            platform: PlatformProfile::detect(),
            env_vars: HashMap::new(),
            tolerate_missing_executable: true,
        }
    }
}

impl ExecConfig {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            ..Default::default()
        }
    }

    pub fn with_platform(mut self, platform: PlatformProfile) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_env(mut self, key: String, value: String) -> Self {
        self.env_vars.insert(key, value);
        self
    }

    pub fn with_tolerate_missing_executable(mut self, tolerate: bool) -> Self {
        self.tolerate_missing_executable = tolerate;
        self
    }

    /// Fails unless the working directory exists and is a directory.
    ///
    /// A missing directory makes every spawn fail with `NotFound`, which
    /// must not be mistaken for a missing executable.
    pub fn check_working_dir(&self) -> io::Result<()> {
        let metadata = std::fs::metadata(&self.working_dir).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!(
                    "working directory {} is not accessible: {}",
                    self.working_dir.display(),
                    e
                ),
            )
        })?;
        if !metadata.is_dir() {
            return Err(io::Error::other(format!(
                "working directory {} is not a directory",
                self.working_dir.display()
            )));
        }
        Ok(())
    }

    /// Resolve a plan path against the working directory
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }
}

/// Progress reported while a plan is being applied
#[derive(Debug, Clone, Copy)]
pub enum ExecEvent<'a> {
    FileWritten {
        index: usize,
        path: &'a Path,
        bytes: usize,
    },
    CommandStarted {
        index: usize,
        command: &'a str,
    },
    OutputLine {
        index: usize,
        stream: StreamType,
        line: &'a str,
    },
    CommandFinished {
        index: usize,
        exit_code: Option<i32>,
        duration: Duration,
    },
}

/// Callback receiving progress while files are written and commands run
pub type ExecCallback = Arc<dyn Fn(ExecEvent<'_>) + Send + Sync>;
