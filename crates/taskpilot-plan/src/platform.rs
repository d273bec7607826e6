use serde::{Deserialize, Serialize};

/// Operating system family the plan targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformFamily {
    Windows,
    Linux,
    MacOs,
    /// Any other POSIX-like system; gets no dialect guidance
    Other,
}

impl PlatformFamily {
    /// Classify an OS identifier as reported by `std::env::consts::OS`
    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" => PlatformFamily::Windows,
            "linux" => PlatformFamily::Linux,
            "macos" => PlatformFamily::MacOs,
            _ => PlatformFamily::Other,
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, PlatformFamily::Windows)
    }
}

impl std::fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformFamily::Windows => write!(f, "windows"),
            PlatformFamily::Linux => write!(f, "linux"),
            PlatformFamily::MacOs => write!(f, "macos"),
            PlatformFamily::Other => write!(f, "other"),
        }
    }
}

/// Host platform description, resolved once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformProfile {
    pub family: PlatformFamily,
    /// Name used when addressing the model, e.g. "Windows" or "Linux"
    pub os_name: String,
}

impl PlatformProfile {
    pub fn new(family: PlatformFamily, os_name: impl Into<String>) -> Self {
        Self {
            family,
            os_name: os_name.into(),
        }
    }

    /// Profile of the machine this process runs on
    pub fn detect() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Self {
        let family = PlatformFamily::from_os(os);
        let os_name = match family {
            PlatformFamily::Windows => "Windows".to_string(),
            PlatformFamily::Linux => "Linux".to_string(),
            PlatformFamily::MacOs => "macOS".to_string(),
            PlatformFamily::Other => os.to_string(),
        };
        Self { family, os_name }
    }
}
