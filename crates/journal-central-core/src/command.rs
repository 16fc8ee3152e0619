//! External program execution.
//!
//! The supervisor and journal queries are single blocking subprocess calls
//! with captured output. They go through [`CommandRunner`] so the resolver
//! and journal reader can be driven by a test double.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Failure to run an external program to a successful exit.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The program could not be started or its output could not be captured
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran but exited unsuccessfully
    #[error("{program} exited with {status}, stderr: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

/// Captured result of one program run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Output of a run that exited with status 0
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Output of a run that exited with `code`
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout of a successful run; a non-zero exit becomes [`ExecError::Failed`].
    pub fn into_stdout(self, program: &str) -> Result<String, ExecError> {
        if self.is_success() {
            return Ok(self.stdout);
        }
        let status = match self.code {
            Some(code) => format!("exit status {}", code),
            None => "signal".to_string(),
        };
        Err(ExecError::Failed {
            program: program.to_string(),
            status,
            stderr: self.stderr,
        })
    }
}

/// Runs external programs and captures their output.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion.
    ///
    /// Returns `Err` only when the program cannot be spawned; a non-zero exit
    /// is reported through [`CommandOutput::code`].
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, ExecError>;
}

#[async_trait]
impl<T: CommandRunner + ?Sized> CommandRunner for Arc<T> {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, ExecError> {
        (**self).run(program, args).await
    }
}

/// [`CommandRunner`] backed by real subprocesses.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, ExecError> {
        debug!("running {} {}", program, args.join(" "));

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|source| ExecError::Spawn {
                program: program.to_string(),
                source,
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
