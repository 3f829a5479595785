//! Keys command - inspect and rotate the audit signing key and session MAC key.

use anyhow::Result;
use std::path::Path;
use warden_config::Config;
use warden_crypto::{ContentHash, KeyPair, MacKey};

use crate::theme::Theme;

const SESSION_KEY_ID_DOMAIN: &str = "warden session key id";

/// Which key a command applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum KeySelection {
    /// The ed25519 key that signs audit entries.
    Audit,
    /// The MAC key that signs session tokens.
    Session,
    /// Both keys.
    All,
}

impl KeySelection {
    fn audit(self) -> bool {
        matches!(self, Self::Audit | Self::All)
    }

    fn session(self) -> bool {
        matches!(self, Self::Session | Self::All)
    }
}

/// Short identifier of a MAC key that reveals nothing about it.
fn session_key_id(key: &MacKey) -> String {
    let hash = ContentHash::hash_with_domain(SESSION_KEY_ID_DOMAIN, &key.to_bytes()[..]);
    hash.to_hex().chars().take(16).collect()
}

fn print_audit_key(key: &KeyPair, path: &str) {
    println!("  Key ID:     {}", key.key_id_hex());
    println!("  Public key: {}", hex::encode(key.public_key_bytes()));
    println!("  Key file:   {path}");
}

fn print_session_key(key: &MacKey, path: &str) {
    println!("  Key ID:     {}", session_key_id(key));
    println!("  Key file:   {path}");
}

/// Show the configured keys, generating any that are missing.
pub(crate) fn show_keys(config: &Config, selection: KeySelection) -> Result<()> {
    if selection.audit() {
        println!("\n{}", Theme::header("Audit Signing Key"));
        match config.audit.key_path.as_deref() {
            Some(path) => {
                if !Path::new(path).exists() {
                    println!("{}", Theme::info("No key found. Generating one..."));
                }
                print_audit_key(&KeyPair::load_or_generate(path)?, path);
            },
            None => println!(
                "{}",
                Theme::warning("audit.key_path is not set; an ephemeral key is used")
            ),
        }
    }

    if selection.session() {
        println!("\n{}", Theme::header("Session MAC Key"));
        match config.session.key_path.as_deref() {
            Some(path) => {
                if !Path::new(path).exists() {
                    println!("{}", Theme::info("No key found. Generating one..."));
                }
                print_session_key(&MacKey::load_or_generate(path)?, path);
            },
            None => println!(
                "{}",
                Theme::warning("session.key_path is not set; an ephemeral key is used")
            ),
        }
    }

    println!();
    Ok(())
}

/// Replace the configured keys, with confirmation if they already exist.
pub(crate) fn generate_keys(config: &Config, selection: KeySelection, force: bool) -> Result<()> {
    if selection.audit() {
        let Some(path) = config.audit.key_path.as_deref() else {
            anyhow::bail!("audit.key_path is not set");
        };
        if confirm_replace(
            path,
            "Existing audit entries will report a foreign signing key.",
            force,
        )? {
            let key = KeyPair::load_or_generate(path)?;
            println!("{}", Theme::success("New audit key generated."));
            print_audit_key(&key, path);
        }
    }

    if selection.session() {
        let Some(path) = config.session.key_path.as_deref() else {
            anyhow::bail!("session.key_path is not set");
        };
        if confirm_replace(path, "Every outstanding session will stop verifying.", force)? {
            let key = MacKey::load_or_generate(path)?;
            println!("{}", Theme::success("New session key generated."));
            print_session_key(&key, path);
        }
    }

    println!();
    Ok(())
}

/// Remove an existing key file once the operator agrees. Returns whether to
/// proceed with generation.
fn confirm_replace(path: &str, consequence: &str, force: bool) -> Result<bool> {
    let path = Path::new(path);
    if !path.exists() {
        return Ok(true);
    }

    if !force {
        println!(
            "{}",
            Theme::warning(&format!("{} already exists. This will replace it.", path.display()))
        );
        println!("{}", Theme::warning(consequence));
        println!();

        let confirm = dialoguer::Confirm::new()
            .with_prompt("Replace existing key?")
            .default(false)
            .interact()?;
        if !confirm {
            println!("{}", Theme::info("Aborted."));
            return Ok(false);
        }
    }

    std::fs::remove_file(path)?;
    Ok(true)
}
