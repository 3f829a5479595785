//! CLI theme and styling.

use colored::Colorize;

/// CLI theme configuration.
pub(crate) struct Theme;

impl Theme {
    /// Format a header.
    pub(crate) fn header(text: &str) -> String {
        format!("{}", text.bold().cyan())
    }

    /// Format a success message.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {}", "✓".green(), text)
    }

    /// Format an error message.
    pub(crate) fn error(text: &str) -> String {
        format!("{} {}", "✗".red(), text.red())
    }

    /// Format a warning message.
    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }

    /// Format an info message.
    pub(crate) fn info(text: &str) -> String {
        format!("{} {}", "i".blue(), text)
    }

    /// Format a separator line.
    pub(crate) fn separator() -> String {
        "━".repeat(60).dimmed().to_string()
    }

    /// Format an audit kind, colored by severity.
    pub(crate) fn kind(kind: warden_audit::AuditKind) -> String {
        use warden_audit::AuditKind;
        let text = kind.as_str();
        match kind {
            AuditKind::Ban | AuditKind::RoleDeleted | AuditKind::ApiKeyRevoked => {
                text.red().to_string()
            },
            AuditKind::RoleCreated | AuditKind::RoleUpdated | AuditKind::ApiKeyCreated => {
                text.yellow().to_string()
            },
            AuditKind::Bootstrap => text.magenta().to_string(),
            _ => text.to_string(),
        }
    }
}
