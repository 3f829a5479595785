//! Commonly used telemetry types.
//!
//! ```rust
//! use warden_telemetry::prelude::*;
//!
//! let ctx = RequestContext::new("cli");
//! assert!(ctx.subject_id.is_none());
//! ```

pub use crate::{LogConfig, LogFormat, LogTarget, RequestContext, RequestGuard, SECURITY_TARGET};
pub use crate::{TelemetryError, TelemetryResult, setup_logging};
