//! Bootstrap command - create the root and default roles in an empty store.

use anyhow::Result;
use warden_authz::Registration;
use warden_config::Config;

use crate::runtime;
use crate::theme::Theme;

/// Environment variable read for the owner secret before prompting.
pub(crate) const OWNER_SECRET_ENV: &str = "WARDEN_OWNER_SECRET";

/// The owner identity to enroll, if any.
#[derive(Debug, Clone, Default)]
pub(crate) struct OwnerArgs {
    pub(crate) username: Option<String>,
    pub(crate) email: Option<String>,
}

fn owner_secret() -> Result<String> {
    if let Ok(secret) = std::env::var(OWNER_SECRET_ENV)
        && !secret.is_empty()
    {
        return Ok(secret);
    }
    let secret = dialoguer::Password::new()
        .with_prompt("Owner secret")
        .with_confirmation("Repeat secret", "Secrets do not match")
        .interact()?;
    Ok(secret)
}

fn registration(owner: OwnerArgs) -> Result<Option<Registration>> {
    match (owner.username, owner.email) {
        (Some(username), Some(email)) => {
            Ok(Some(Registration::new(username, email, owner_secret()?)))
        },
        (None, None) => Ok(None),
        _ => anyhow::bail!("--owner and --email must be given together"),
    }
}

/// Create the role hierarchy and optionally its first owner.
pub(crate) async fn run_bootstrap(config: &Config, owner: OwnerArgs) -> Result<()> {
    if config.storage.path.is_none() {
        println!(
            "{}",
            Theme::warning("storage.path is not set; the bootstrap is discarded on exit")
        );
    }

    let registration = registration(owner)?;
    let gatekeeper = runtime::gatekeeper(config)?;

    let Some(outcome) = gatekeeper.bootstrap(registration).await? else {
        println!("{}", Theme::info("Roles already exist; nothing to do."));
        return Ok(());
    };

    println!("{}", Theme::success("Role hierarchy created."));
    println!(
        "  Root role:    {} (rank {}, {} capabilities)",
        outcome.root.name,
        outcome.root.rank,
        outcome.root.permissions.len()
    );
    println!(
        "  Default role: {} (rank {})",
        outcome.default.name, outcome.default.rank
    );
    if let Some(owner) = &outcome.owner {
        println!("  Owner:        {} ({})", owner.username, owner.id);
    }
    println!("  Audit entry:  #{}", outcome.entry.sequence);
    println!();
    Ok(())
}
