use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form metadata attached to messages and retrieval results.
///
/// The answering service includes numeric and string fields (retrieval
/// counts, elapsed times) whose exact set varies per response; they are
/// carried verbatim for display.
pub type Metadata = serde_json::Map<String, Value>;

// =============================================================================
// Enums
// =============================================================================

/// Which remote operation a submitted query runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Retrieval only: return the matching chunks.
    Search,
    /// Retrieval-augmented answer generation.
    Answer,
}

/// User rating on a recorded conversation.
///
/// Absence of a rating is modeled as `Option<Rating>::None` and serialized
/// as `null`, matching the persisted history format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Up,
    Down,
}

// =============================================================================
// Retrieval results
// =============================================================================

/// A retrieval unit returned by the answering service.
///
/// All fields are pass-through: the client preserves them for rendering but
/// does not interpret them beyond the fallback accessors below. Fields the
/// server adds in future responses survive a round-trip via `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
    /// Legacy score field emitted by older service responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    /// Ordered section path from document root to the chunk's section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_hierarchy: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_images: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_tables: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Unrecognized server fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: Metadata,
}

impl Source {
    /// Relevance score for display, falling back to the legacy `score`
    /// field and then 0.0.
    pub fn relevance(&self) -> f64 {
        self.relevance_score.or(self.score).unwrap_or(0.0)
    }

    /// Content body for display: `content`, else `content_preview`, else
    /// `text`.
    pub fn body(&self) -> Option<&str> {
        self.content
            .as_deref()
            .or(self.content_preview.as_deref())
            .or(self.text.as_deref())
    }

    /// Page range for display ("12" or "12-15"), if any page info exists.
    pub fn page_range(&self) -> Option<String> {
        let start = self.start_page.or(self.page_number)?;
        match self.end_page {
            Some(end) if end != start => Some(format!("{}-{}", start, end)),
            _ => Some(start.to_string()),
        }
    }
}

/// Search-mode results share the retrieval unit shape with answer sources.
pub type SearchResult = Source;

// =============================================================================
// Messages
// =============================================================================

/// A single entry in the conversation transcript.
///
/// Serialized with an external `type` tag so the persisted form matches the
/// service's message convention.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    User {
        content: String,
        timestamp: DateTime<Utc>,
    },
    Assistant {
        content: String,
        #[serde(default)]
        sources: Vec<Source>,
        #[serde(default)]
        metadata: Metadata,
        /// True only while the owning streaming session is still running.
        #[serde(default)]
        streaming: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Search {
        content: String,
        #[serde(default)]
        results: Vec<SearchResult>,
        #[serde(default)]
        metadata: Metadata,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
        timestamp: DateTime<Utc>,
    },
    System {
        content: String,
        #[serde(default)]
        details: Metadata,
        timestamp: DateTime<Utc>,
    },
    Error {
        content: String,
        timestamp: DateTime<Utc>,
    },
}

impl Message {
    /// A user message stamped with the current time.
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// An error message stamped with the current time.
    pub fn error(content: impl Into<String>) -> Self {
        Message::Error {
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// A system message with a details mapping.
    pub fn system(content: impl Into<String>, details: Metadata) -> Self {
        Message::System {
            content: content.into(),
            details,
            timestamp: Utc::now(),
        }
    }

    /// The text content common to every variant.
    pub fn content(&self) -> &str {
        match self {
            Message::User { content, .. }
            | Message::Assistant { content, .. }
            | Message::Search { content, .. }
            | Message::System { content, .. }
            | Message::Error { content, .. } => content,
        }
    }

    /// Creation timestamp common to every variant.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Message::User { timestamp, .. }
            | Message::Assistant { timestamp, .. }
            | Message::Search { timestamp, .. }
            | Message::System { timestamp, .. }
            | Message::Error { timestamp, .. } => *timestamp,
        }
    }

    /// True for an assistant message whose stream has not finished.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Message::Assistant { streaming: true, .. })
    }
}

// =============================================================================
// Conversations
// =============================================================================

/// One recorded user/assistant exchange.
///
/// Owned exclusively by the history store; immutable after creation except
/// for `bookmarked` and `rating`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Time-derived (milliseconds), strictly increasing, unique per store.
    pub id: u64,
    pub user: Message,
    pub assistant: Message,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub bookmarked: bool,
    #[serde(default)]
    pub rating: Option<Rating>,
}

// =============================================================================
// Tests
// =============================================================================
