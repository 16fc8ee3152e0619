//! Journal text for a single invocation.

use tracing::debug;

use crate::command::CommandRunner;
use crate::error::{AgentError, AgentResult};
use crate::invocation::InvocationId;

/// Reads journal records through `journalctl`.
pub struct JournalReader<R> {
    runner: R,
    journalctl: String,
}

impl<R: CommandRunner> JournalReader<R> {
    pub fn new(runner: R, journalctl: impl Into<String>) -> Self {
        Self {
            runner,
            journalctl: journalctl.into(),
        }
    }

    /// All records tagged with `id`, in journal order, as one line-delimited blob.
    ///
    /// Executes `journalctl _SYSTEMD_INVOCATION_ID={id} --no-pager`.
    pub async fn read_invocation(&self, id: &InvocationId) -> AgentResult<String> {
        let args = [
            format!("_SYSTEMD_INVOCATION_ID={}", id),
            "--no-pager".to_string(),
        ];

        let text = self
            .runner
            .run(&self.journalctl, &args)
            .await
            .and_then(|output| output.into_stdout(&self.journalctl))
            .map_err(|e| AgentError::query(format!("command execution failed: {}", e)))?;

        debug!("read {} bytes of journal for invocation {}", text.len(), id);
        Ok(text)
    }
}
