//! Client for the remote answering service.
//!
//! Wraps the service's four endpoints behind [`ApiClient`], decodes the
//! streaming answer body with [`FrameDecoder`], folds it into an assistant
//! message via [`StreamingSession`], and bounds flaky streams with
//! [`RetryOrchestrator`] plus a mandatory single-shot fallback in the
//! caller.

pub mod api;
pub mod error;
pub mod retry;
pub mod sse;
pub mod stream;

pub use api::{AnswerResponse, AnswerService, ApiClient, ProcessResponse, SearchResponse, StreamObserver};
pub use error::ClientError;
pub use retry::{RetryOrchestrator, RetryOutcome};
pub use sse::{FrameDecoder, StreamEvent};
pub use stream::StreamingSession;
