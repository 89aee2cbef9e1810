//! Frame decoder for the answer stream.
//!
//! The streaming endpoint emits newline-delimited frames of the form
//! `data: {"type": ..., "data": ...}`. Fragments arrive at arbitrary byte
//! boundaries, so the decoder keeps one pending partial line across calls:
//! each fragment is appended, complete lines are decoded, and the trailing
//! remainder becomes the new buffer.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use satchel_core::types::{Metadata, Source};

use crate::error::ClientError;

/// Prefix marking a protocol frame; anything else on a line is noise.
const EVENT_PREFIX: &str = "data: ";

/// A decoded protocol event from the answer stream.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Replaces the in-progress message's metadata mapping.
    Metadata(Metadata),
    /// Text appended to the in-progress answer.
    Chunk(String),
    /// Replaces the in-progress message's source list.
    Sources(Vec<Source>),
    /// Additional metadata merged in; the answer is complete.
    Done(Metadata),
    /// Server-signaled failure; terminates decoding.
    Error(String),
}

#[derive(Deserialize)]
struct Frame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Incremental decoder turning raw text fragments into [`StreamEvent`]s.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode all events completed by this fragment.
    ///
    /// Malformed lines are skipped; an `error` event terminates decoding
    /// with the server-supplied message.
    pub fn feed(&mut self, fragment: &str) -> Result<Vec<StreamEvent>, ClientError> {
        self.buffer.push_str(fragment);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            match decode_line(line.trim_end_matches('\n').trim_end_matches('\r')) {
                Some(StreamEvent::Error(message)) => {
                    return Err(ClientError::Protocol(message));
                }
                Some(event) => events.push(event),
                None => {}
            }
        }
        Ok(events)
    }

    /// Signal end-of-data. Any residual partial line is discarded, never
    /// forced into a spurious event.
    pub fn finish(self) {
        if !self.buffer.is_empty() {
            debug!(bytes = self.buffer.len(), "discarding incomplete trailing line");
        }
    }
}

/// Decode one complete line, or `None` for noise.
fn decode_line(line: &str) -> Option<StreamEvent> {
    let payload = line.strip_prefix(EVENT_PREFIX)?;

    let frame: Frame = match serde_json::from_str(payload) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(error = %e, "skipping malformed stream frame");
            return None;
        }
    };

    match frame.kind.as_str() {
        "metadata" => as_map(frame.data).map(StreamEvent::Metadata),
        "chunk" => match frame.data {
            Value::String(text) => Some(StreamEvent::Chunk(text)),
            _ => {
                debug!("skipping chunk frame with non-string payload");
                None
            }
        },
        "sources" => match serde_json::from_value::<Vec<Source>>(frame.data) {
            Ok(sources) => Some(StreamEvent::Sources(sources)),
            Err(e) => {
                debug!(error = %e, "skipping sources frame with bad payload");
                None
            }
        },
        "done" => as_map(frame.data).map(StreamEvent::Done),
        "error" => {
            let message = frame
                .data
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| "stream error".to_string());
            Some(StreamEvent::Error(message))
        }
        other => {
            debug!(kind = other, "skipping unknown stream event type");
            None
        }
    }
}

fn as_map(value: Value) -> Option<Metadata> {
    match value {
        Value::Object(map) => Some(map),
        Value::Null => Some(Metadata::new()),
        _ => {
            debug!("skipping frame with non-object payload");
            None
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
