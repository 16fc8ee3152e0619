//! Journal Central core library
//!
//! Device-side agent for a central log collection service.
//!
//! ## Overview
//!
//! A device registers once with the central service to obtain a bearer
//! token. Afterwards it can ship the systemd journal of a single service
//! invocation:
//!
//! 1. resolve the service's current invocation id (`systemctl show`)
//! 2. read every journal record tagged with it (`journalctl`)
//! 3. escape the text and POST it to `/api/logEntries/create`
//! 4. classify the answer as success, application error or transport error
//!
//! ## Quick Start
//!
//! ```ignore
//! use journal_central_core::{
//!     AgentConfig, CredentialStore, FileCredentialStore, InvocationTarget, LogShipper,
//!     ReqwestTransport, ShipRequest, SystemCommandRunner,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AgentConfig::default();
//!     let credential = FileCredentialStore::new(&config.config_dir).read()?;
//!     let transport = ReqwestTransport::new(config.request_timeout)?;
//!     let shipper = LogShipper::new(SystemCommandRunner, transport, (&config).into());
//!
//!     let request = ShipRequest {
//!         target: Some(InvocationTarget::Service("backup.service".into())),
//!         source: "edge-01".into(),
//!         class: "backup".into(),
//!     };
//!     shipper.ship(&request, &credential).await?.into_result()?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod command;
pub mod config;
pub mod credential;
pub mod encode;
pub mod error;
pub mod invocation;
pub mod journal;
pub mod registration;
pub mod shipper;
pub mod transport;

// Re-exports
pub use api::{ApiError, LogPayload, RegistrationResponse};
pub use command::{CommandOutput, CommandRunner, ExecError, SystemCommandRunner};
pub use config::AgentConfig;
pub use credential::{Credential, CredentialStore, FileCredentialStore};
pub use encode::encode;
pub use error::{AgentError, AgentResult};
pub use invocation::{InvocationId, InvocationResolver, InvocationTarget};
pub use journal::JournalReader;
pub use registration::{read_machine_id, DeviceRegistrar, RegistrationRequest};
pub use shipper::{classify, LogShipper, ShipRequest, ShipperConfig, SubmissionOutcome};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
