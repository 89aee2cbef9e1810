//! Single-slot user notification sink.
//!
//! Fire-and-forget: a new notification replaces whatever is showing, and a
//! notification expires on its own after a fixed interval. Reads that find
//! an expired entry clear the slot.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{error, info};

/// Notification severity, for presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Info,
}

/// One user-facing notification.
#[derive(Clone, Debug)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    shown_at: Instant,
}

/// Single active notification with auto-expiry.
pub struct NotificationSink {
    ttl: Duration,
    slot: Mutex<Option<Notification>>,
}

impl NotificationSink {
    /// A sink whose notifications dismiss themselves after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Show a notification, replacing any current one.
    pub fn notify(&self, message: impl Into<String>, severity: Severity) {
        let message = message.into();
        info!(severity = ?severity, message = %message, "notification");
        *self.lock() = Some(Notification {
            message,
            severity,
            shown_at: Instant::now(),
        });
    }

    /// The active notification, if it has not expired.
    pub fn current(&self) -> Option<Notification> {
        let mut slot = self.lock();
        match &*slot {
            Some(notification) if notification.shown_at.elapsed() < self.ttl => {
                Some(notification.clone())
            }
            Some(_) => {
                *slot = None;
                None
            }
            None => None,
        }
    }

    /// Dismiss the active notification, if any.
    pub fn dismiss(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> MutexGuard<'_, Option<Notification>> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("notification lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
