//! Journal Central CLI
//!
//! Thin wrapper around journal-central-core for command-line usage.
//!
//! ## Usage
//!
//! ```bash
//! # Register this device with an organisation (stores the bearer token)
//! pull-journal-central-client register --organisation-id 42 --name edge-01 --organisation-password secret
//!
//! # Ship the journal of the current run of a service
//! pull-journal-central-client log --service backup.service --source edge-01 --class backup
//!
//! # Ship the journal of a specific invocation
//! pull-journal-central-client log --invocation-id 6f1c0e... --source edge-01 --class backup
//!
//! # Talk to a different central service
//! pull-journal-central-client --base-url https://logs.example.com log --service backup.service --source edge-01 --class backup
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use journal_central_core::{
    read_machine_id, AgentConfig, AgentError, CredentialStore, DeviceRegistrar,
    FileCredentialStore, InvocationTarget, LogShipper, RegistrationRequest, ReqwestTransport,
    ShipRequest, SystemCommandRunner,
};
use tracing::debug;

/// Journal Central - ship systemd journals to a central log service
#[derive(Parser)]
#[command(name = "pull-journal-central-client")]
#[command(version)]
#[command(about = "Ship systemd journals to a central log service")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Echo the resolved invocation id and raw journal text
    #[arg(long, global = true)]
    debug: bool,

    /// Central service base URL
    #[arg(long, global = true, default_value = journal_central_core::config::DEFAULT_BASE_URL)]
    base_url: String,

    /// Config directory (default: ~/.pull-journal-central-client)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// HTTP request timeout in seconds
    #[arg(
        long,
        global = true,
        default_value = "30",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout: u64,

    /// Process supervisor program
    #[arg(long, global = true, default_value = "systemctl", hide = true)]
    systemctl: String,

    /// Journal query program
    #[arg(long, global = true, default_value = "journalctl", hide = true)]
    journalctl: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a device
    Register {
        /// Organisation ID
        #[arg(long, alias = "organisationID")]
        organisation_id: String,

        /// Device name
        #[arg(long)]
        name: String,

        /// Organisation password
        #[arg(long, alias = "organisationpassword")]
        organisation_password: String,

        /// File holding the device identifier
        #[arg(long, default_value = journal_central_core::config::DEFAULT_MACHINE_ID_PATH)]
        machine_id_path: PathBuf,
    },

    /// Create a log entry from a service invocation's journal
    #[command(group(
        ArgGroup::new("target")
            .required(true)
            .args(["service", "invocation_id"])
    ))]
    Log {
        /// Class of the log entry
        #[arg(long)]
        class: String,

        /// Source of the log entry
        #[arg(long)]
        source: String,

        /// Service name whose current invocation is shipped
        #[arg(long)]
        service: Option<String>,

        /// Invocation id to ship instead of looking one up
        #[arg(long)]
        invocation_id: Option<String>,
    },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

/// Build the agent configuration from global flags
fn build_config(cli: &Cli) -> Result<AgentConfig> {
    let mut config = AgentConfig::default().with_base_url(cli.base_url.as_str())?;
    if let Some(dir) = &cli.config_dir {
        config.config_dir = dir.clone();
    }
    config.systemctl = cli.systemctl.clone();
    config.journalctl = cli.journalctl.clone();
    config.request_timeout = Duration::from_secs(cli.timeout);
    config.debug = cli.debug;
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = build_config(&cli)?;
    debug!("using config {:?}", config);

    match cli.command {
        Commands::Register {
            organisation_id,
            name,
            organisation_password,
            machine_id_path,
        } => {
            config.machine_id_path = machine_id_path;
            let device_identifier = read_machine_id(&config.machine_id_path)?;
            let config_dir = config.ensure_config_dir()?;

            let transport = ReqwestTransport::new(config.request_timeout)?;
            let registrar = DeviceRegistrar::new(
                transport,
                FileCredentialStore::new(config_dir),
                config.base_url.clone(),
            );
            registrar
                .register(&RegistrationRequest {
                    organisation_id,
                    name,
                    organisation_password,
                    device_identifier,
                })
                .await
                .context("device registration failed")?;

            println!("Token written successfully");
        }

        Commands::Log {
            class,
            source,
            service,
            invocation_id,
        } => {
            let config_dir = config.ensure_config_dir()?;
            let credential = FileCredentialStore::new(config_dir).read()?;

            let transport = ReqwestTransport::new(config.request_timeout)?;
            let shipper = LogShipper::new(SystemCommandRunner, transport, (&config).into());
            let request = ShipRequest {
                target: InvocationTarget::from_options(
                    invocation_id.as_deref(),
                    service.as_deref(),
                ),
                source,
                class,
            };

            shipper
                .ship(&request, &credential)
                .await?
                .into_result()
                .context("log entry was not created")?;

            println!("Log entry created successfully");
        }
    }

    Ok(())
}

/// Print an error chain, including per-field validation messages
fn report(err: &anyhow::Error) {
    eprintln!("Error: {:#}", err);
    if let Some(AgentError::Application { errors, .. }) = err.downcast_ref::<AgentError>() {
        for (field, messages) in errors {
            for message in messages {
                eprintln!("  {}: {}", field, message);
            }
        }
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<AgentError>()
        .map(AgentError::exit_code)
        .unwrap_or(1)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // --debug output is emitted at info level
    setup_logging(cli.verbose.max(u8::from(cli.debug)));

    if let Err(err) = run(cli).await {
        report(&err);
        std::process::exit(exit_code(&err));
    }
}
