//! Warden CLI - operator tooling for the authorization core.
//!
//! Manages key files, bootstraps the role hierarchy, inspects the audit log
//! and prints the resolved configuration.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use warden_audit::AuditKind;
use warden_config::Config;

mod commands;
mod runtime;
mod theme;

use commands::{audit, bootstrap, config, keys};
use keys::KeySelection;

/// Warden - role, credential and audit administration
#[derive(Parser)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a configuration file layered over the system and user files
    #[arg(short, long, global = true, env = "WARDEN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the audit signing key and session MAC key
    Keys {
        #[command(subcommand)]
        command: KeyCommands,
    },

    /// Create the root and default roles in an empty store
    Bootstrap {
        /// Username of an owner identity to enroll in the root role
        #[arg(long, requires = "email")]
        owner: Option<String>,

        /// Email of the owner identity
        #[arg(long, requires = "owner")]
        email: Option<String>,
    },

    /// View and verify the audit log
    Audit {
        #[command(subcommand)]
        command: AuditCommands,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Show the configured keys (generates missing ones)
    Show {
        /// Which key to show
        #[arg(value_enum, default_value = "all")]
        key: KeySelection,
    },
    /// Generate new keys (prompts if they already exist)
    Generate {
        /// Which key to generate
        #[arg(value_enum, default_value = "all")]
        key: KeySelection,

        /// Force overwrite without confirmation
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum AuditCommands {
    /// List recent audit entries
    List {
        /// Maximum number of entries
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,

        /// Only entries of this kind (e.g. `ban`, `role_created`)
        #[arg(short, long)]
        kind: Option<AuditKind>,
    },
    /// Verify audit chain integrity
    Verify,
    /// Show audit statistics
    Stats,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show resolved configuration with source annotations
    Show {
        /// Output format (toml or json)
        #[arg(short, long, default_value = "toml")]
        format: String,
        /// Show only a specific section (e.g. session, notify)
        #[arg(short, long)]
        section: Option<String>,
    },
    /// Validate the current configuration
    Validate,
}

/// Set up logging from the configuration, with `--verbose` overriding the level.
fn init_logging(config: Option<&Config>, verbose: bool) {
    let mut log_config = config
        .and_then(|cfg| match warden_telemetry::LogConfig::from_section(&cfg.logging) {
            Ok(lc) => Some(lc),
            Err(e) => {
                eprintln!("Invalid logging configuration: {e}");
                None
            },
        })
        .unwrap_or_else(|| {
            warden_telemetry::LogConfig::new("info")
                .with_format(warden_telemetry::LogFormat::Compact)
        });

    if verbose {
        "debug".clone_into(&mut log_config.level);
    }

    if let Err(e) = warden_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let explicit = cli.config.as_deref();

    let command = match cli.command {
        // Config subcommands report load errors themselves.
        Commands::Config { command } => {
            init_logging(None, cli.verbose);
            return handle_config(command, explicit);
        },
        other => other,
    };

    let config = Config::load(explicit)?.config;
    init_logging(Some(&config), cli.verbose);

    match command {
        Commands::Keys { command } => handle_keys(&config, command),
        Commands::Bootstrap { owner, email } => {
            bootstrap::run_bootstrap(
                &config,
                bootstrap::OwnerArgs {
                    username: owner,
                    email,
                },
            )
            .await
        },
        Commands::Audit { command } => handle_audit(&config, command).await,
        Commands::Config { command } => handle_config(command, explicit),
    }
}

fn handle_keys(config: &Config, command: KeyCommands) -> Result<()> {
    match command {
        KeyCommands::Show { key } => keys::show_keys(config, key),
        KeyCommands::Generate { key, force } => keys::generate_keys(config, key, force),
    }
}

async fn handle_audit(config: &Config, command: AuditCommands) -> Result<()> {
    let log = runtime::open_audit_log(config)?;
    match command {
        AuditCommands::List { limit, kind } => audit::list_entries(&log, limit, kind).await,
        AuditCommands::Verify => audit::verify_chain(&log).await,
        AuditCommands::Stats => audit::show_stats(&log).await,
    }
}

fn handle_config(command: ConfigCommands, explicit: Option<&std::path::Path>) -> Result<()> {
    match command {
        ConfigCommands::Show { format, section } => {
            config::show_config(explicit, &format, section.as_deref())
        },
        ConfigCommands::Validate => config::validate_config(explicit),
    }
}
