//! Device registration with the central service.

use std::fs;
use std::path::Path;

use reqwest::Url;
use tracing::{info, warn};

use crate::api::{ApiError, RegistrationResponse, REGISTER_PATH};
use crate::credential::{Credential, CredentialStore};
use crate::error::{AgentError, AgentResult};
use crate::transport::{HttpMethod, HttpRequest, HttpTransport};

/// Inputs of a registration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub organisation_id: String,
    pub name: String,
    pub organisation_password: String,
    pub device_identifier: String,
}

/// Read the machine identifier, trimmed of surrounding whitespace.
pub fn read_machine_id(path: impl AsRef<Path>) -> AgentResult<String> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|e| {
        AgentError::DeviceIdentity(format!(
            "failed to read device identifier from {}: {}",
            path.display(),
            e
        ))
    })?;
    let id = raw.trim();
    if id.is_empty() {
        return Err(AgentError::DeviceIdentity(format!(
            "device identifier in {} is empty",
            path.display()
        )));
    }
    Ok(id.to_string())
}

/// Registers this device and stores the issued credential.
pub struct DeviceRegistrar<T, C> {
    transport: T,
    store: C,
    base_url: String,
}

impl<T: HttpTransport, C: CredentialStore> DeviceRegistrar<T, C> {
    pub fn new(transport: T, store: C, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            store,
            base_url: base_url.into(),
        }
    }

    /// `GET {base}/api/devices/register/{organisation}` with `name`,
    /// `organisationpassword` and `deviceidentifier` as query parameters
    pub fn registration_url(&self, request: &RegistrationRequest) -> AgentResult<String> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            AgentError::config(format!("invalid base URL {:?}: {}", self.base_url, e))
        })?;

        url.path_segments_mut()
            .map_err(|_| {
                AgentError::config(format!("base URL {:?} cannot take a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(REGISTER_PATH.split('/').filter(|s| !s.is_empty()))
            .push(&request.organisation_id);
        url.query_pairs_mut()
            .append_pair("name", &request.name)
            .append_pair("organisationpassword", &request.organisation_password)
            .append_pair("deviceidentifier", &request.device_identifier);

        Ok(url.into())
    }

    /// Register and persist the returned token.
    ///
    /// # Errors
    /// - [`AgentError::Transport`] when the service is unreachable
    /// - [`AgentError::Application`] when the service rejects the registration
    /// - [`AgentError::Protocol`] when a body cannot be decoded
    /// - [`AgentError::Credential`] when the token is empty or cannot be stored
    pub async fn register(
        &self,
        request: &RegistrationRequest,
    ) -> AgentResult<RegistrationResponse> {
        let url = self.registration_url(request)?;
        let response = self
            .transport
            .send(HttpRequest {
                method: HttpMethod::Get,
                url,
                bearer: None,
                body: None,
            })
            .await?;

        if !response.is_success() {
            let api_error = ApiError::from_response(&response)?;
            warn!("registration rejected ({}): {}", response.status, api_error.message);
            return Err(api_error.into_error(response.status));
        }

        let registration: RegistrationResponse =
            serde_json::from_slice(&response.body).map_err(|e| AgentError::Protocol {
                status: response.status,
                body: response.body_text(),
                reason: format!("failed to decode JSON response: {}", e),
            })?;
        if !registration.success {
            warn!("registration reported success=false: {}", registration.message);
        }

        self.store.write(&Credential::new(registration.token.clone())?)?;
        info!(
            "registered device {} with organisation {}",
            request.name, request.organisation_id
        );
        Ok(registration)
    }
}
