//! Configuration file support for taskpilot.
//!
//! Settings come from, in order of precedence: command-line flags, the
//! `GEMINI_API_KEY` environment variable (credential only), `taskpilot.toml`
//! in the working directory, and `config.toml` in the user config directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use taskpilot_model::{GeminiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT};

/// Project config file name
pub const CONFIG_FILE_NAME: &str = "taskpilot.toml";

/// Global config directory name (under the user config dir)
pub const GLOBAL_CONFIG_DIR: &str = "taskpilot";

/// Global config file name
pub const GLOBAL_CONFIG_FILE: &str = "config.toml";

/// Environment variable holding the API credential
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Contents of a global or project config file
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub api_base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub execution: ExecutionSection,
}

/// `[execution]` table
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExecutionSection {
    pub tolerate_missing_executable: Option<bool>,
    /// `[execution.env]`: extra environment for plan commands
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl ConfigFile {
    /// Path of the global config file, if the platform has a config dir
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILE))
    }

    /// Load `config.toml` from the user config directory
    pub fn load_global() -> Result<Option<Self>> {
        match Self::global_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    /// Load `taskpilot.toml` from the working directory
    pub fn load_project(working_dir: &Path) -> Result<Option<Self>> {
        Self::load_from(&working_dir.join(CONFIG_FILE_NAME))
    }

    /// Returns `Ok(None)` when the file does not exist. A file that exists
    /// but fails to parse is a hard error.
    fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        Ok(Some(config))
    }
}

/// Values given on the command line
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub model: Option<String>,
    pub no_tolerate_missing_executable: bool,
}

/// Effective settings, resolved once at startup
#[derive(Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub tolerate_missing_executable: bool,
    /// Command environment; project entries override global ones
    pub command_env: BTreeMap<String, String>,
}

impl Settings {
    pub fn resolve(
        cli: &CliOverrides,
        env_api_key: Option<String>,
        project: Option<ConfigFile>,
        global: Option<ConfigFile>,
    ) -> Self {
        let project = project.unwrap_or_default();
        let global = global.unwrap_or_default();

        let api_key = env_api_key
            .filter(|key| !key.trim().is_empty())
            .or(project.api_key)
            .or(global.api_key);

        let model = cli
            .model
            .clone()
            .or(project.model)
            .or(global.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let api_base_url = project
            .api_base_url
            .or(global.api_base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let request_timeout = project
            .request_timeout_secs
            .or(global.request_timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        let tolerate_missing_executable = !cli.no_tolerate_missing_executable
            && project
                .execution
                .tolerate_missing_executable
                .or(global.execution.tolerate_missing_executable)
                .unwrap_or(true);

        let mut command_env = global.execution.env;
        command_env.extend(project.execution.env);

        Self {
            api_key,
            model,
            api_base_url,
            request_timeout,
            tolerate_missing_executable,
            command_env,
        }
    }

    /// Client configuration, or an error naming where the key can be set
    pub fn gemini_config(&self) -> Result<GeminiConfig> {
        let Some(api_key) = self.api_key.clone() else {
            anyhow::bail!(
                "No API key configured. Set {} or add api_key to {}",
                API_KEY_ENV,
                CONFIG_FILE_NAME
            );
        };
        Ok(GeminiConfig::new(api_key)
            .with_model(self.model.clone())
            .with_base_url(self.api_base_url.clone())
            .with_timeout(self.request_timeout))
    }

    fn masked_api_key(&self) -> String {
        match self.api_key.as_deref() {
            None => "(not set)".to_string(),
            Some(key) => {
                let len = key.chars().count();
                if len <= 8 {
                    return "****".to_string();
                }
                let tail: String = key.chars().skip(len - 4).collect();
                format!("****{}", tail)
            }
        }
    }
}

// Keeps the credential out of dry-run output and debug logs
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &self.masked_api_key())
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout", &self.request_timeout)
            .field(
                "tolerate_missing_executable",
                &self.tolerate_missing_executable,
            )
            .field("command_env", &self.command_env.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "API key: {}", self.masked_api_key())?;
        writeln!(f, "Model: {}", self.model)?;
        writeln!(f, "API base URL: {}", self.api_base_url)?;
        writeln!(f, "Request timeout: {}s", self.request_timeout.as_secs())?;
        writeln!(
            f,
            "Tolerate missing executable: {}",
            self.tolerate_missing_executable
        )?;
        let names: Vec<&str> = self.command_env.keys().map(String::as_str).collect();
        write!(f, "Command environment: [{}]", names.join(", "))
    }
}
