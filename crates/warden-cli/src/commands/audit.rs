//! Audit command - list, verify and summarize the audit log.

use anyhow::Result;
use colored::Colorize;
use std::collections::BTreeMap;
use warden_audit::{AuditKind, AuditLog};

use crate::theme::Theme;

/// List the newest entries, optionally of one kind.
pub(crate) async fn list_entries(
    log: &AuditLog,
    limit: usize,
    kind: Option<AuditKind>,
) -> Result<()> {
    let entries = match kind {
        Some(kind) => {
            let mut entries = log.entries_by_kind(kind).await?;
            entries.reverse();
            entries.truncate(limit);
            entries
        },
        None => log.recent(limit).await?,
    };

    if entries.is_empty() {
        println!("{}", Theme::info("No audit entries"));
        return Ok(());
    }

    println!("\n{}", Theme::header("Audit Entries"));
    println!(
        "{:>6} {:>20}  {:<18} {}",
        "SEQ".dimmed(),
        "TIMESTAMP".dimmed(),
        "KIND".dimmed(),
        "SUMMARY".dimmed()
    );
    println!("{}", Theme::separator());

    for entry in entries {
        println!(
            "{:>6} {:>20}  {:<18} {}",
            entry.sequence,
            entry.timestamp.to_string(),
            Theme::kind(entry.kind),
            entry.summary()
        );
    }

    println!();
    Ok(())
}

/// Verify the chain and report every issue.
pub(crate) async fn verify_chain(log: &AuditLog) -> Result<()> {
    let result = log.verify_chain().await?;

    if result.valid {
        println!(
            "{}",
            Theme::success(&format!(
                "Audit chain verified: {} entries, no issues",
                result.entries_verified
            ))
        );
        return Ok(());
    }

    println!(
        "{}",
        Theme::error(&format!(
            "Audit chain has {} issues after {} entries:",
            result.issues.len(),
            result.entries_verified
        ))
    );
    for issue in &result.issues {
        println!("  - {issue}");
    }
    anyhow::bail!("audit chain verification failed")
}

/// Show entry counts per kind.
pub(crate) async fn show_stats(log: &AuditLog) -> Result<()> {
    let entries = log.entries().await?;
    let mut by_kind: BTreeMap<&'static str, usize> = BTreeMap::new();
    for entry in &entries {
        let count = by_kind.entry(entry.kind.as_str()).or_default();
        *count = count.saturating_add(1);
    }

    println!("\n{}", Theme::header("Audit Statistics"));
    println!("  Total entries: {}", entries.len());
    if let Some(last) = entries.last() {
        println!("  Latest entry:  #{} at {}", last.sequence, last.timestamp);
    }
    println!("  Runtime key:   {}", log.runtime_public_key().key_id_hex());

    if !by_kind.is_empty() {
        println!();
        for (kind, count) in by_kind {
            println!("  {kind:<18} {count:>6}");
        }
    }

    println!();
    Ok(())
}
