//! External effects and the moderation vocabulary.
//!
//! Moderation, script dispatch and game pings change state owned by other
//! services. Those services hand the gatekeeper an [`Effect`]; if the audit
//! entry for the operation cannot be written, the effect is compensated.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use warden_audit::AuditKind;
use warden_core::Capability;

use crate::error::{AuthzError, AuthzResult};

/// Error type returned by effects.
pub type EffectError = Box<dyn std::error::Error + Send + Sync>;

/// A reversible change applied by a collaborator.
#[async_trait]
pub trait Effect: Send + Sync {
    /// Apply the change.
    async fn apply(&self) -> Result<(), EffectError>;

    /// Undo a change that was applied. Must not fail; log instead.
    async fn compensate(&self);
}

/// An effect that does nothing, for callers that only need the audit entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEffect;

#[async_trait]
impl Effect for NoEffect {
    async fn apply(&self) -> Result<(), EffectError> {
        Ok(())
    }

    async fn compensate(&self) {}
}

fn required(field: &str, value: &str) -> AuthzResult<()> {
    if value.trim().is_empty() {
        Err(AuthzError::InvalidInput(format!("{field} is required")))
    } else {
        Ok(())
    }
}

/// Game visibility granted at approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessLevel {
    /// Everyone.
    Public,
    /// Whitelisted identities.
    Whitelisted,
    /// Premium identities.
    Premium,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Public => "Public",
            Self::Whitelisted => "Whitelisted",
            Self::Premium => "Premium",
        })
    }
}

/// Content moderation operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModerationAction {
    /// Approve a submitted game.
    ApproveGame {
        /// The game.
        game_id: String,
        /// Visibility after approval.
        access_level: AccessLevel,
    },
    /// Act on a forum post.
    ModerateForumPost {
        /// The post.
        post_id: String,
        /// What was done (e.g. `hide`, `lock`).
        action: String,
    },
    /// Publish an announcement.
    PostAnnouncement {
        /// Announcement body.
        content: String,
    },
    /// Change a support ticket's status.
    UpdateTicket {
        /// The ticket.
        ticket_id: String,
        /// New status.
        status: String,
    },
}

impl ModerationAction {
    /// The capability the action requires.
    #[must_use]
    pub const fn capability(&self) -> Capability {
        match self {
            Self::ModerateForumPost { .. } => Capability::WhitelistUsers,
            Self::ApproveGame { .. }
            | Self::PostAnnouncement { .. }
            | Self::UpdateTicket { .. } => Capability::ApproveGameAccess,
        }
    }

    /// The audit kind recorded for the action.
    #[must_use]
    pub const fn kind(&self) -> AuditKind {
        match self {
            Self::ApproveGame { .. } => AuditKind::GameApproved,
            Self::ModerateForumPost { .. } => AuditKind::ForumModeration,
            Self::PostAnnouncement { .. } => AuditKind::Announcement,
            Self::UpdateTicket { .. } => AuditKind::TicketUpdated,
        }
    }

    /// The audit target, if the action has one.
    #[must_use]
    pub fn target(&self) -> Option<String> {
        match self {
            Self::ApproveGame { game_id, .. } => Some(format!("game:{game_id}")),
            Self::ModerateForumPost { post_id, .. } => Some(format!("post:{post_id}")),
            Self::UpdateTicket { ticket_id, .. } => Some(format!("ticket:{ticket_id}")),
            Self::PostAnnouncement { .. } => None,
        }
    }

    /// The audit payload.
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::ApproveGame {
                game_id,
                access_level,
            } => json!({ "game_id": game_id, "access_level": access_level.to_string() }),
            Self::ModerateForumPost { post_id, action } => {
                json!({ "post_id": post_id, "action": action })
            },
            Self::PostAnnouncement { content } => json!({ "content": content }),
            Self::UpdateTicket { ticket_id, status } => {
                json!({ "ticket_id": ticket_id, "status": status })
            },
        }
    }

    /// Check required fields.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidInput`] for an empty field.
    pub fn validate(&self) -> AuthzResult<()> {
        match self {
            Self::ApproveGame { game_id, .. } => required("game_id", game_id),
            Self::ModerateForumPost { post_id, action } => {
                required("post_id", post_id)?;
                required("action", action)
            },
            Self::PostAnnouncement { content } => required("content", content),
            Self::UpdateTicket { ticket_id, status } => {
                required("ticket_id", ticket_id)?;
                required("status", status)
            },
        }
    }
}

/// A script run requested through the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRequest {
    /// The script.
    pub script_id: String,
    /// The in-game user the script targets.
    pub target_user: String,
    /// The game it runs in.
    pub game_id: String,
}

impl ScriptRequest {
    /// Check required fields.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidInput`] for an empty field.
    pub fn validate(&self) -> AuthzResult<()> {
        required("script_id", &self.script_id)?;
        required("target_user", &self.target_user)?;
        required("game_id", &self.game_id)
    }
}

/// A liveness report from a game server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamePing {
    /// The game.
    pub game_id: String,
    /// The reporting server.
    pub server_id: String,
    /// Current player count.
    pub player_count: u32,
}

impl GamePing {
    /// Check required fields.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidInput`] for an empty field.
    pub fn validate(&self) -> AuthzResult<()> {
        required("game_id", &self.game_id)?;
        required("server_id", &self.server_id)
    }
}
