//! One streaming answer lifecycle.
//!
//! A session opens the streaming endpoint, drives the frame decoder over
//! the response body, and folds events into a single in-progress assistant
//! message. After every mutating event the current snapshot goes to the
//! observer, which therefore sees a monotonically growing projection:
//! content never shrinks and sources never revert. Any failure discards
//! the partial message; nothing is committed by the session itself.

use chrono::{DateTime, Utc};
use futures_util::StreamExt;

use satchel_core::types::{Message, Metadata, Source};

use crate::api::{ApiClient, StreamObserver};
use crate::error::ClientError;
use crate::sse::{FrameDecoder, StreamEvent};

/// The in-progress assistant message a stream folds into.
#[derive(Debug)]
pub(crate) struct AssistantDraft {
    content: String,
    sources: Vec<Source>,
    metadata: Metadata,
    done: bool,
    query: String,
    started_at: DateTime<Utc>,
}

impl AssistantDraft {
    pub(crate) fn new(query: &str) -> Self {
        Self {
            content: String::new(),
            sources: Vec::new(),
            metadata: Metadata::new(),
            done: false,
            query: query.to_string(),
            started_at: Utc::now(),
        }
    }

    /// Fold one event into the draft. Returns true if the draft changed.
    pub(crate) fn apply(&mut self, event: StreamEvent) -> bool {
        match event {
            StreamEvent::Metadata(map) => {
                self.metadata = map;
                true
            }
            StreamEvent::Chunk(text) => {
                self.content.push_str(&text);
                true
            }
            StreamEvent::Sources(sources) => {
                self.sources = sources;
                true
            }
            StreamEvent::Done(map) => {
                self.metadata.extend(map);
                self.done = true;
                true
            }
            // Fatal errors are raised by the decoder before reaching here.
            StreamEvent::Error(_) => false,
        }
    }

    /// Current state as a message; in-progress until `done` is observed.
    pub(crate) fn snapshot(&self) -> Message {
        self.to_message(!self.done)
    }

    /// Final message at end-of-data; never in-progress.
    pub(crate) fn into_message(self) -> Message {
        self.to_message(false)
    }

    fn to_message(&self, streaming: bool) -> Message {
        Message::Assistant {
            content: self.content.clone(),
            sources: self.sources.clone(),
            metadata: self.metadata.clone(),
            streaming,
            query: Some(self.query.clone()),
            timestamp: self.started_at,
        }
    }
}

/// Owns one streaming request against the answering service.
pub struct StreamingSession<'a> {
    client: &'a ApiClient,
}

impl<'a> StreamingSession<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Run the stream to completion, publishing snapshots to `observer`.
    ///
    /// Fails immediately on a non-success status at connection open, on a
    /// broken body mid-read, or on a server-signaled error event.
    pub async fn run(
        &self,
        query: &str,
        observer: StreamObserver<'_>,
    ) -> Result<Message, ClientError> {
        let response = self.client.open_stream(query).await?;

        let mut decoder = FrameDecoder::new();
        let mut draft = AssistantDraft::new(query);
        let mut body = response.bytes_stream();

        while let Some(next) = body.next().await {
            let bytes = next.map_err(|e| ClientError::Connect(e.to_string()))?;
            let fragment = String::from_utf8_lossy(&bytes);
            for event in decoder.feed(&fragment)? {
                if draft.apply(event) {
                    observer(&draft.snapshot());
                }
            }
        }
        decoder.finish();

        tracing::debug!(
            query_len = query.len(),
            content_len = draft.content.len(),
            sources = draft.sources.len(),
            "answer stream complete"
        );
        Ok(draft.into_message())
    }
}

// =============================================================================
// Tests
// =============================================================================
