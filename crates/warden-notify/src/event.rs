//! Projection of audit entries into notification messages.

use serde_json::Value;
use warden_audit::{AuditEntry, AuditKind};

/// A notification derived from an audit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    /// The audit kind the message was derived from.
    pub kind: AuditKind,
    /// The message text, before redaction.
    pub message: String,
}

/// Whether entries of `kind` produce a notification.
#[must_use]
pub fn notifies(kind: AuditKind) -> bool {
    !matches!(
        kind,
        AuditKind::GamePing | AuditKind::ForumModeration | AuditKind::Bootstrap
    )
}

/// Strings render bare, other values as JSON, absent fields as `?`.
fn field(payload: &Value, name: &str) -> String {
    match payload.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "?".to_string(),
        Some(other) => other.to_string(),
    }
}

impl NotificationEvent {
    /// Build the notification for `entry`, or `None` if its kind is silent.
    #[must_use]
    pub fn project(entry: &AuditEntry) -> Option<Self> {
        if !notifies(entry.kind) {
            return None;
        }

        let actor = entry
            .actor_id
            .map_or_else(|| "system".to_string(), |id| format!("user {id}"));
        let target = entry.target_id.as_deref().unwrap_or("?");
        let p = &entry.payload;

        let message = match entry.kind {
            AuditKind::Ban => format!("User {target} banned by {actor}: {}", field(p, "reason")),
            AuditKind::Unban => format!("User {target} reinstated by {actor}"),
            AuditKind::ModNote => {
                format!("Mod note added for user {target} by {actor}: {}", field(p, "note"))
            },
            AuditKind::RoleCreated => format!(
                "Role {} (rank {}) created by {actor}",
                field(p, "name"),
                field(p, "rank")
            ),
            AuditKind::RoleUpdated => match p.get("change").and_then(Value::as_str) {
                Some("assignment") => format!(
                    "User {target} moved to role {} by {actor}",
                    field(p, "role_name")
                ),
                _ => format!("Role {} updated by {actor}", field(p, "name")),
            },
            AuditKind::RoleDeleted => format!("Role {} deleted by {actor}", field(p, "name")),
            AuditKind::ApiKeyCreated => {
                format!("API key generated for {} by {actor}", field(p, "scope"))
            },
            AuditKind::ApiKeyRevoked => {
                format!("API key for {} revoked by {actor}", field(p, "scope"))
            },
            AuditKind::SettingsUpdate => format!(
                "Setting {} updated to {} by {actor}",
                field(p, "key"),
                field(p, "value")
            ),
            AuditKind::GameApproved => format!(
                "Game {} approved with {} access by {actor}",
                field(p, "game_id"),
                field(p, "access_level")
            ),
            AuditKind::Announcement => {
                format!("Announcement posted by {actor}: {}", field(p, "content"))
            },
            AuditKind::TicketUpdated => format!(
                "Ticket {} updated to {} by {actor}",
                field(p, "ticket_id"),
                field(p, "status")
            ),
            AuditKind::ScriptExecution => format!(
                "Script {} executed by {actor} on {} in game {}",
                field(p, "script_id"),
                field(p, "target_user"),
                field(p, "game_id")
            ),
            AuditKind::GamePing | AuditKind::ForumModeration | AuditKind::Bootstrap => {
                return None;
            },
        };

        Some(Self {
            kind: entry.kind,
            message,
        })
    }
}
