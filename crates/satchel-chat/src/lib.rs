//! Conversational front end for the Satchel client.
//!
//! The query orchestrator validates input, drives the streaming/fallback
//! machinery, and records successful exchanges; the notification sink
//! carries fire-and-forget user feedback.

pub mod error;
pub mod notify;
pub mod orchestrator;

pub use error::ChatError;
pub use notify::{Notification, NotificationSink, Severity};
pub use orchestrator::QueryOrchestrator;
