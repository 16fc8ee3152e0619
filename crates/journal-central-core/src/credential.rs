//! Bearer credential persistence.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use reqwest::header::HeaderValue;
use tracing::debug;

use crate::error::{AgentError, AgentResult};

/// File name of the stored token inside the config directory
pub const CREDENTIAL_FILE: &str = "authorisation";

/// Opaque bearer token issued at registration.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token.
    ///
    /// Empty tokens and tokens that cannot be sent in an `Authorization`
    /// header (control bytes, for example) are rejected.
    pub fn new(token: impl Into<String>) -> AgentResult<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(AgentError::credential("authorization token is empty"));
        }
        if HeaderValue::from_str(&format!("Bearer {}", token)).is_err() {
            return Err(AgentError::credential(
                "authorization token contains characters not allowed in an HTTP header",
            ));
        }
        Ok(Self(token))
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

// Keeps the token out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Storage for the device's bearer credential.
pub trait CredentialStore {
    fn read(&self) -> AgentResult<Credential>;

    fn write(&self, credential: &Credential) -> AgentResult<()>;
}

/// Stores the token as a single file, `<dir>/authorisation`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store inside `config_dir`; the directory must already exist for writes.
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            path: config_dir.as_ref().join(CREDENTIAL_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn read(&self) -> AgentResult<Credential> {
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            AgentError::credential(format!(
                "failed to read authorization token from {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Credential::new(raw.trim())
    }

    fn write(&self, credential: &Credential) -> AgentResult<()> {
        write_private(&self.path, credential.token().as_bytes()).map_err(|e| {
            AgentError::credential(format!(
                "failed to write token to {}: {}",
                self.path.display(),
                e
            ))
        })?;
        debug!("stored credential at {}", self.path.display());
        Ok(())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    fs::write(path, contents)
}
