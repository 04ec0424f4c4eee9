//! alertline - outbound alert notification dispatch.
//!
//! Given a logical alert event, this library builds a channel-specific
//! message (DingTalk robot webhook or email) and delivers it best-effort:
//! one attempt per call, a provider-imposed rate limit on the webhook side,
//! and an explicit connection lifecycle on the SMTP side. Failures come back
//! as typed results; nothing panics past the facade.

pub mod cli;
pub mod config;
pub mod facade;
pub mod mail;
pub mod message;
pub mod rate_limit;
pub mod webhook;

// Re-export the entry-point types for convenience.
pub use facade::{Notification, NotificationError, Notifier};
pub use message::{AlertMessage, MessageFields, MessageKind, ValidationError};
