//! Bounded-attempt retry with linear backoff for streaming answers.
//!
//! Attempts are strictly sequential: attempt i+1 starts only after attempt
//! i has failed and its backoff delay has elapsed. Exhaustion is a signal,
//! not an error — the caller is required to fall back to the single-shot
//! endpoint so a query is never left unanswered because streaming failed.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use satchel_core::types::Message;

use crate::error::ClientError;

/// Default delay unit between attempts; attempt i waits `base * i`.
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Outcome of a bounded retry run.
#[derive(Debug)]
pub enum RetryOutcome {
    /// An attempt succeeded; remaining attempts were skipped.
    Completed(Message),
    /// Every attempt failed. Carries the last observed error for
    /// diagnostics; the caller must invoke the single-shot fallback.
    Exhausted { last_error: ClientError },
}

/// Runs a streaming attempt up to a configured number of times.
#[derive(Clone, Debug)]
pub struct RetryOrchestrator {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryOrchestrator {
    /// A policy with `max_attempts` tries (clamped to at least 1) and the
    /// default one-second delay unit.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: DEFAULT_BASE_DELAY,
        }
    }

    /// Override the backoff delay unit.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Drive `attempt` until it succeeds or the budget is spent.
    ///
    /// `attempt` receives the 1-based attempt number. Between a failed
    /// attempt i and attempt i+1 the orchestrator sleeps `base * i`, so
    /// delays are strictly increasing.
    pub async fn run<F, Fut>(&self, mut attempt: F) -> RetryOutcome
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Message, ClientError>>,
    {
        let mut last_error: Option<ClientError> = None;

        for i in 1..=self.max_attempts {
            debug!(attempt = i, max = self.max_attempts, "streaming attempt");
            match attempt(i).await {
                Ok(message) => return RetryOutcome::Completed(message),
                Err(e) => {
                    warn!(attempt = i, error = %e, "streaming attempt failed");
                    last_error = Some(e);
                }
            }
            if i < self.max_attempts {
                tokio::time::sleep(self.base_delay * i).await;
            }
        }

        RetryOutcome::Exhausted {
            last_error: last_error
                .unwrap_or_else(|| ClientError::Connect("no attempts were made".to_string())),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
