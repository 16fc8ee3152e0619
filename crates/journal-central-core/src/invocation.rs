//! Resolution of a service run to its systemd invocation id.

use std::fmt;

use tracing::debug;

use crate::command::CommandRunner;
use crate::error::{AgentError, AgentResult};

/// Opaque, whitespace-free token identifying one run of a service unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvocationId(pub(crate) String);

impl InvocationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the caller asked to ship logs for.
///
/// An explicit id always takes precedence over a service name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationTarget {
    /// Invocation id supplied directly by the caller
    Explicit(String),
    /// Unit whose current invocation id is looked up from the supervisor
    Service(String),
}

impl InvocationTarget {
    /// Build a target from two optional inputs.
    ///
    /// Empty strings count as absent. Returns `None` when neither is set.
    pub fn from_options(explicit_id: Option<&str>, service: Option<&str>) -> Option<Self> {
        let non_empty = |s: Option<&str>| s.filter(|s| !s.is_empty()).map(str::to_string);
        non_empty(explicit_id)
            .map(InvocationTarget::Explicit)
            .or_else(|| non_empty(service).map(InvocationTarget::Service))
    }
}

/// Looks up invocation ids through `systemctl show`.
pub struct InvocationResolver<R> {
    runner: R,
    systemctl: String,
}

impl<R: CommandRunner> InvocationResolver<R> {
    pub fn new(runner: R, systemctl: impl Into<String>) -> Self {
        Self {
            runner,
            systemctl: systemctl.into(),
        }
    }

    /// Resolve `target` to a canonical invocation id.
    ///
    /// # Errors
    /// [`AgentError::Resolution`] when no target is given, the explicit id or
    /// service name is empty, the supervisor query fails, or it reports an
    /// empty id.
    pub async fn resolve(&self, target: Option<&InvocationTarget>) -> AgentResult<InvocationId> {
        match target {
            Some(InvocationTarget::Explicit(id)) if !id.is_empty() => {
                Ok(InvocationId(id.clone()))
            }
            Some(InvocationTarget::Service(service)) if !service.is_empty() => {
                self.query_supervisor(service).await
            }
            _ => Err(AgentError::resolution("no service or invocation id provided")),
        }
    }

    async fn query_supervisor(&self, service: &str) -> AgentResult<InvocationId> {
        let args = [
            "show".to_string(),
            "-p".to_string(),
            "InvocationID".to_string(),
            "--value".to_string(),
            service.to_string(),
        ];

        let stdout = self
            .runner
            .run(&self.systemctl, &args)
            .await
            .and_then(|output| output.into_stdout(&self.systemctl))
            .map_err(|e| AgentError::resolution(format!("command execution failed: {}", e)))?;

        let id: String = stdout.chars().filter(|c| !c.is_whitespace()).collect();
        if id.is_empty() {
            return Err(AgentError::resolution("invocation id empty"));
        }

        debug!("resolved {} to invocation {}", service, id);
        Ok(InvocationId(id))
    }
}
