//! Wire types exchanged with the central log collection service.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AgentError;
use crate::transport::HttpResponse;

/// Path of the log submission endpoint, relative to the base URL
pub const LOG_ENTRIES_PATH: &str = "/api/logEntries/create";

/// Path prefix of the device registration endpoint
pub const REGISTER_PATH: &str = "/api/devices/register";

/// Join a base URL (no trailing slash) and an API path
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url, path)
}

/// Body of a log submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPayload {
    /// Origin label chosen by the caller
    pub source: String,
    /// Category label chosen by the caller
    pub class: String,
    /// Escaped journal text
    pub content: String,
}

/// Error body returned by the central service on non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
    /// Field name to validation messages, keyed by field name; each
    /// message list keeps the order the service sent
    #[serde(default, deserialize_with = "null_as_empty")]
    pub errors: BTreeMap<String, Vec<String>>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

/// Successful registration body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationResponse {
    #[serde(default)]
    pub success: bool,
    pub token: String,
    #[serde(default)]
    pub message: String,
}

impl ApiError {
    /// Decode the error body of a non-2xx response.
    ///
    /// # Errors
    /// [`AgentError::Protocol`] when the body is not an error object.
    pub fn from_response(response: &HttpResponse) -> Result<Self, AgentError> {
        serde_json::from_slice(&response.body).map_err(|e| AgentError::Protocol {
            status: response.status,
            body: response.body_text(),
            reason: format!("failed to decode JSON error response: {}", e),
        })
    }

    /// Convert into the matching [`AgentError::Application`]
    pub fn into_error(self, status: u16) -> AgentError {
        AgentError::Application {
            status,
            message: self.message,
            errors: self.errors,
        }
    }
}
