//! Journal shipping pipeline.
//!
//! resolve invocation -> read journal -> escape -> build payload ->
//! authenticated POST -> classify response. Steps run strictly in order and
//! nothing is retried; the first failure ends the attempt.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::{endpoint, ApiError, LogPayload, LOG_ENTRIES_PATH};
use crate::command::CommandRunner;
use crate::config::AgentConfig;
use crate::credential::Credential;
use crate::encode::encode;
use crate::error::{AgentError, AgentResult};
use crate::invocation::{InvocationResolver, InvocationTarget};
use crate::journal::JournalReader;
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};

/// Settings the shipper needs from [`AgentConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipperConfig {
    pub base_url: String,
    pub systemctl: String,
    pub journalctl: String,
    pub debug: bool,
}

impl From<&AgentConfig> for ShipperConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            systemctl: config.systemctl.clone(),
            journalctl: config.journalctl.clone(),
            debug: config.debug,
        }
    }
}

/// What to ship and how to label it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipRequest {
    /// `None` fails resolution before anything else happens
    pub target: Option<InvocationTarget>,
    pub source: String,
    pub class: String,
}

/// Result of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Central service answered 2xx
    Success { status: u16 },
    /// Central service rejected the entry with a decodable error body
    ApplicationError {
        status: u16,
        message: String,
        errors: BTreeMap<String, Vec<String>>,
    },
    /// No response was received
    TransportError(String),
}

impl SubmissionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionOutcome::Success { .. })
    }

    /// Turn a failed outcome into the matching [`AgentError`].
    pub fn into_result(self) -> AgentResult<u16> {
        match self {
            SubmissionOutcome::Success { status } => Ok(status),
            SubmissionOutcome::ApplicationError {
                status,
                message,
                errors,
            } => Err(AgentError::Application {
                status,
                message,
                errors,
            }),
            SubmissionOutcome::TransportError(cause) => Err(AgentError::Transport(cause)),
        }
    }
}

/// Classify a response from the log submission endpoint.
///
/// A 2xx is a success whatever the body holds. Anything else must carry an
/// [`ApiError`] body, otherwise the response is a protocol error.
pub fn classify(response: &HttpResponse) -> AgentResult<SubmissionOutcome> {
    if response.is_success() {
        return Ok(SubmissionOutcome::Success {
            status: response.status,
        });
    }

    let api_error = ApiError::from_response(response)?;
    Ok(SubmissionOutcome::ApplicationError {
        status: response.status,
        message: api_error.message,
        errors: api_error.errors,
    })
}

/// Ships the journal of one service invocation to the central service.
pub struct LogShipper<R, T> {
    resolver: InvocationResolver<Arc<R>>,
    journal: JournalReader<Arc<R>>,
    transport: T,
    config: ShipperConfig,
}

impl<R: CommandRunner, T: HttpTransport> LogShipper<R, T> {
    pub fn new(runner: R, transport: T, config: ShipperConfig) -> Self {
        let runner = Arc::new(runner);
        Self {
            resolver: InvocationResolver::new(Arc::clone(&runner), config.systemctl.clone()),
            journal: JournalReader::new(runner, config.journalctl.clone()),
            transport,
            config,
        }
    }

    /// Run the full pipeline once.
    ///
    /// # Errors
    /// - [`AgentError::Resolution`] / [`AgentError::Query`] before any network
    ///   call is made
    /// - [`AgentError::Serialization`] if the payload cannot be encoded
    /// - [`AgentError::Protocol`] for a non-2xx response with an unexpected body
    ///
    /// Transport failures and application rejections are reported through
    /// [`SubmissionOutcome`].
    pub async fn ship(
        &self,
        request: &ShipRequest,
        credential: &Credential,
    ) -> AgentResult<SubmissionOutcome> {
        let id = self.resolver.resolve(request.target.as_ref()).await?;
        if self.config.debug {
            info!("invocid: {}", id);
        }

        let raw = self.journal.read_invocation(&id).await?;
        if self.config.debug {
            info!("output: {}", raw);
        }

        let payload = LogPayload {
            source: request.source.clone(),
            class: request.class.clone(),
            content: encode(&raw),
        };
        let body = serde_json::to_vec(&payload)?;

        let url = endpoint(&self.config.base_url, LOG_ENTRIES_PATH);
        debug!("submitting {} bytes for invocation {} to {}", body.len(), id, url);

        let response = match self
            .transport
            .send(HttpRequest {
                method: HttpMethod::Post,
                url,
                bearer: Some(credential.token().to_string()),
                body: Some(body),
            })
            .await
        {
            Ok(response) => response,
            Err(AgentError::Transport(cause)) => {
                warn!("log submission failed: {}", cause);
                return Ok(SubmissionOutcome::TransportError(cause));
            }
            Err(other) => return Err(other),
        };

        let outcome = classify(&response)?;
        match &outcome {
            SubmissionOutcome::Success { status } => info!("log entry accepted ({})", status),
            SubmissionOutcome::ApplicationError { status, message, .. } => {
                warn!("log entry rejected ({}): {}", status, message)
            }
            SubmissionOutcome::TransportError(_) => {}
        }
        Ok(outcome)
    }
}
