//! Agent configuration.
//!
//! All settings are explicit values passed to the components that need them;
//! there is no process-wide state.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AgentError, AgentResult};

/// Default central service location
pub const DEFAULT_BASE_URL: &str = "http://localhost";

/// Config directory name under the user's home
pub const CONFIG_DIR_NAME: &str = ".pull-journal-central-client";

/// Default source of the device identifier
pub const DEFAULT_MACHINE_ID_PATH: &str = "/etc/machine-id";

/// Default per-request HTTP timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Central service base URL, without trailing slash
    pub base_url: String,
    /// Holds the stored credential
    pub config_dir: PathBuf,
    /// Process supervisor program
    pub systemctl: String,
    /// Journal query program
    pub journalctl: String,
    pub machine_id_path: PathBuf,
    pub request_timeout: Duration,
    /// Echo the resolved invocation id and raw journal text while shipping
    pub debug: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            config_dir: default_config_dir(),
            systemctl: "systemctl".to_string(),
            journalctl: "journalctl".to_string(),
            machine_id_path: PathBuf::from(DEFAULT_MACHINE_ID_PATH),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            debug: false,
        }
    }
}

impl AgentConfig {
    /// Set the base URL, dropping any trailing slashes.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> AgentResult<Self> {
        let base_url = base_url.into();
        let trimmed = base_url.trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(AgentError::config(format!(
                "base URL must start with http:// or https://, got {:?}",
                base_url
            )));
        }
        self.base_url = trimmed.to_string();
        Ok(self)
    }

    /// Create the config directory if missing (mode 0700 on unix).
    pub fn ensure_config_dir(&self) -> AgentResult<&Path> {
        create_private_dir(&self.config_dir).map_err(|e| {
            AgentError::config(format!(
                "failed to create config directory {}: {}",
                self.config_dir.display(),
                e
            ))
        })?;
        Ok(&self.config_dir)
    }
}

/// `~/.pull-journal-central-client`, falling back to the working directory
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)
}
