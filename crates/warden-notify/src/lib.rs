//! Warden Notify - best-effort notifications for privileged actions.
//!
//! This crate provides:
//! - [`NotificationEvent`], the message projection of an audit entry
//! - [`WebhookUrl`] and [`UrlPolicy`], allow-listed destinations
//! - [`NotifyConfig`], the per-request settings snapshot
//! - [`Notifier`], which delivers on a detached task with a timeout
//!
//! Delivery is never part of the durability contract: failures are logged
//! locally and dropped, and the caller never waits for them.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod channel;
mod config;
mod error;
mod event;
mod notifier;
mod url;

pub use channel::{NotificationChannel, WebhookChannel};
pub use config::NotifyConfig;
pub use error::{NotifyError, NotifyResult};
pub use event::{NotificationEvent, notifies};
pub use notifier::{DEFAULT_TIMEOUT_SECS, Notifier};
pub use url::{DEFAULT_URL_PATTERN, UrlPolicy, WebhookUrl};
