//! Pinguard CLI - manage a PIN credential from the terminal

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pinguard_core::{FileCredentialStore, PinAuthenticator, PinGuardConfig};
use pinguard_flow::RecoveryMethod;

mod commands;
mod prompt;

/// Pinguard - local PIN credential with attempt limiting
#[derive(Parser)]
#[command(name = "pinguard")]
#[command(about = "Set up, verify and recover a local PIN credential")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (overrides PINGUARD_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Credential store file (overrides the configured path)
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Credential context; also the account id sent to the reset service
    #[arg(long, global = true, default_value = "default")]
    context: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a PIN for the context
    Setup {
        /// New PIN (prompted if omitted)
        #[arg(long)]
        pin: Option<String>,

        /// Confirmation of the new PIN (prompted if omitted)
        #[arg(long)]
        confirm: Option<String>,
    },

    /// Check a PIN
    Verify {
        /// PIN to check (prompted if omitted)
        #[arg(long)]
        pin: Option<String>,
    },

    /// Replace the PIN after verifying the current one
    Change {
        /// Current PIN (prompted if omitted)
        #[arg(long)]
        old_pin: Option<String>,

        /// New PIN (prompted if omitted)
        #[arg(long)]
        new_pin: Option<String>,

        /// Confirmation of the new PIN (prompted if omitted)
        #[arg(long)]
        confirm: Option<String>,
    },

    /// Delete the PIN after verifying it
    Remove {
        /// Current PIN (prompted if omitted)
        #[arg(long)]
        pin: Option<String>,
    },

    /// Show setup, attempt and lockout state
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether a PIN would be accepted at setup, without storing anything
    Validate {
        /// Candidate PIN (prompted if omitted)
        #[arg(long)]
        pin: Option<String>,
    },

    /// Wipe the credential and attempt state without a PIN (DANGEROUS)
    EmergencyReset {
        /// Confirm the wipe
        #[arg(long)]
        yes_i_understand: bool,
    },

    /// Reset a forgotten PIN with a code from the reset service
    Recover {
        /// Delivery channel for the code
        #[arg(long, value_enum)]
        method: MethodArg,

        /// Phone number or email address on file
        #[arg(long)]
        contact: String,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum MethodArg {
    Phone,
    Email,
}

impl From<MethodArg> for RecoveryMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::Phone => RecoveryMethod::Phone,
            MethodArg::Email => RecoveryMethod::Email,
        }
    }
}

/// Config path from the flag, then `PINGUARD_CONFIG`, then the platform config dir
fn config_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var("PINGUARD_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(PinGuardConfig::default_path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pinguard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = PinGuardConfig::load_or_default(&config_path(cli.config));
    if let Some(storage) = cli.storage {
        config.storage_path = storage;
    }

    let store = FileCredentialStore::open(config.storage_path.clone())?;
    debug!("Using credential store {:?}", config.storage_path);
    let auth = Arc::new(PinAuthenticator::from_config(&config, Arc::new(store)));
    let context = cli.context.as_str();

    match cli.command {
        Commands::Setup { pin, confirm } => commands::setup(&auth, context, pin, confirm),
        Commands::Verify { pin } => commands::verify(&auth, context, pin),
        Commands::Change {
            old_pin,
            new_pin,
            confirm,
        } => commands::change(&auth, context, old_pin, new_pin, confirm),
        Commands::Remove { pin } => commands::remove(&auth, context, pin),
        Commands::Status { json } => commands::status(&auth, context, json),
        Commands::Validate { pin } => commands::validate(pin),
        Commands::EmergencyReset { yes_i_understand } => {
            commands::emergency_reset(&auth, context, yes_i_understand)
        }
        Commands::Recover { method, contact } => {
            commands::recover(auth, &config, context, method.into(), contact).await
        }
    }
}
