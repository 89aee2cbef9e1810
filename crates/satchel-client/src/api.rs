//! HTTP client for the answering service.
//!
//! Thin wrappers over the four endpoints (`/process`, `/search`, `/rag`,
//! `/rag/stream`) plus the [`AnswerService`] trait the orchestrator
//! consumes, so tests can substitute a scripted backend.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};

use satchel_core::types::{Message, Source};

use crate::error::ClientError;
use crate::stream::StreamingSession;

/// Observer receiving partial-message snapshots during streaming.
pub type StreamObserver<'a> = &'a (dyn Fn(&Message) + Send + Sync);

/// Response from the document-ingestion endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct ProcessResponse {
    pub chunks_processed: u64,
    pub document_id: String,
    pub processing_time_seconds: f64,
    #[serde(default)]
    pub summaries_generated: Option<u64>,
}

/// Response from the retrieval-only endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct SearchResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<Source>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub search_time_seconds: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SearchResponse {
    /// Map a server-signaled error status onto [`ClientError::Protocol`].
    fn check(self) -> Result<Self, ClientError> {
        if self.status == "error" {
            let message = self
                .message
                .unwrap_or_else(|| "Search failed".to_string());
            return Err(ClientError::Protocol(message));
        }
        Ok(self)
    }
}

/// Response from the single-shot answer endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct AnswerResponse {
    pub status: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub retrieved_chunks: Option<u64>,
    #[serde(default)]
    pub total_time_seconds: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AnswerResponse {
    /// Map `error` and `no_results` statuses onto [`ClientError::Protocol`].
    ///
    /// The server puts its explanation in `message`, or for `no_results`
    /// sometimes in `answer`.
    fn check(self) -> Result<Self, ClientError> {
        if self.status == "error" || self.status == "no_results" {
            let message = self
                .message
                .or(self.answer)
                .unwrap_or_else(|| "No results found".to_string());
            return Err(ClientError::Protocol(message));
        }
        Ok(self)
    }
}

/// The remote operations the query orchestrator depends on.
#[async_trait]
pub trait AnswerService: Send + Sync {
    /// Ingest a document into the remote index.
    async fn process(
        &self,
        document_name: &str,
        bytes: &[u8],
    ) -> Result<ProcessResponse, ClientError>;

    /// Retrieval-only search.
    async fn search(&self, query: &str) -> Result<SearchResponse, ClientError>;

    /// Single-shot retrieval-augmented answer.
    async fn answer(&self, query: &str) -> Result<AnswerResponse, ClientError>;

    /// One streaming answer attempt, publishing partial snapshots to
    /// `observer`. Returns the completed assistant message.
    async fn stream_answer(
        &self,
        query: &str,
        observer: StreamObserver<'_>,
    ) -> Result<Message, ClientError>;
}

/// reqwest-backed client for the answering service.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    top_k: u32,
}

impl ApiClient {
    /// Build a client for the service at `base_url`.
    pub fn new(base_url: impl Into<String>, top_k: u32, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Connect(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            top_k,
        })
    }

    /// Open the streaming answer endpoint for `query`.
    ///
    /// A non-success status fails here, before any decoding is attempted.
    pub(crate) async fn open_stream(&self, query: &str) -> Result<reqwest::Response, ClientError> {
        self.post("/rag/stream", &json!({ "query": query, "top_k": self.top_k }))
            .await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Transport {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn post_decoded<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, ClientError> {
        let response = self.post(path, body).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl AnswerService for ApiClient {
    async fn process(
        &self,
        document_name: &str,
        bytes: &[u8],
    ) -> Result<ProcessResponse, ClientError> {
        let body = json!({
            "pdf_base64": BASE64.encode(bytes),
            "document_name": document_name,
        });
        self.post_decoded("/process", &body).await
    }

    async fn search(&self, query: &str) -> Result<SearchResponse, ClientError> {
        let body = json!({ "query": query, "top_k": self.top_k });
        self.post_decoded::<SearchResponse>("/search", &body)
            .await?
            .check()
    }

    async fn answer(&self, query: &str) -> Result<AnswerResponse, ClientError> {
        let body = json!({ "query": query, "top_k": self.top_k });
        self.post_decoded::<AnswerResponse>("/rag", &body)
            .await?
            .check()
    }

    async fn stream_answer(
        &self,
        query: &str,
        observer: StreamObserver<'_>,
    ) -> Result<Message, ClientError> {
        StreamingSession::new(self).run(query, observer).await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ---- DTO decoding ----

    #[test]
    fn test_process_response_decoding() {
        let raw = r#"{
            "chunks_processed": 42,
            "document_id": "doc-7",
            "processing_time_seconds": 3.2,
            "summaries_generated": 5
        }"#;
        let resp: ProcessResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.chunks_processed, 42);
        assert_eq!(resp.document_id, "doc-7");
        assert_eq!(resp.summaries_generated, Some(5));
    }

    #[test]
    fn test_process_response_without_summaries() {
        let raw = r#"{
            "chunks_processed": 10,
            "document_id": "doc-1",
            "processing_time_seconds": 1.0
        }"#;
        let resp: ProcessResponse = serde_json::from_str(raw).unwrap();
        assert!(resp.summaries_generated.is_none());
    }

    #[test]
    fn test_search_response_decoding() {
        let raw = r#"{
            "status": "success",
            "results": [{"document_name": "a.pdf", "relevance_score": 0.9}],
            "total": 12,
            "search_time_seconds": 0.08
        }"#;
        let resp: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.results.len(), 1);
        assert_eq!(resp.total, Some(12));
        assert_eq!(resp.results[0].relevance(), 0.9);
    }

    #[test]
    fn test_answer_response_decoding() {
        let raw = r#"{
            "status": "success",
            "answer": "The answer is 42.",
            "sources": [],
            "retrieved_chunks": 5,
            "total_time_seconds": 2.5
        }"#;
        let resp: AnswerResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.answer.as_deref(), Some("The answer is 42."));
        assert_eq!(resp.retrieved_chunks, Some(5));
    }

    // ---- Status checking ----

    #[test]
    fn test_search_error_status_maps_to_protocol() {
        let resp = SearchResponse {
            status: "error".to_string(),
            results: vec![],
            total: None,
            search_time_seconds: None,
            message: Some("index not built".to_string()),
        };
        match resp.check() {
            Err(ClientError::Protocol(message)) => assert_eq!(message, "index not built"),
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[test]
    fn test_search_error_without_message_uses_default() {
        let resp = SearchResponse {
            status: "error".to_string(),
            results: vec![],
            total: None,
            search_time_seconds: None,
            message: None,
        };
        match resp.check() {
            Err(ClientError::Protocol(message)) => assert_eq!(message, "Search failed"),
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[test]
    fn test_answer_no_results_maps_to_protocol() {
        let resp = AnswerResponse {
            status: "no_results".to_string(),
            answer: Some("Nothing matched your query.".to_string()),
            sources: vec![],
            retrieved_chunks: None,
            total_time_seconds: None,
            message: None,
        };
        match resp.check() {
            Err(ClientError::Protocol(message)) => {
                assert_eq!(message, "Nothing matched your query.")
            }
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[test]
    fn test_answer_error_prefers_message_over_answer() {
        let resp = AnswerResponse {
            status: "error".to_string(),
            answer: Some("partial answer".to_string()),
            sources: vec![],
            retrieved_chunks: None,
            total_time_seconds: None,
            message: Some("backend exploded".to_string()),
        };
        match resp.check() {
            Err(ClientError::Protocol(message)) => assert_eq!(message, "backend exploded"),
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[test]
    fn test_success_status_passes_through() {
        let resp = AnswerResponse {
            status: "success".to_string(),
            answer: Some("ok".to_string()),
            sources: vec![],
            retrieved_chunks: None,
            total_time_seconds: None,
            message: None,
        };
        assert!(resp.check().is_ok());
    }

    // ---- Client construction ----

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client =
            ApiClient::new("http://localhost:8000/", 5, Duration::from_secs(30)).unwrap();
        assert_eq!(client.base_url, "http://localhost:8000");
    }
}
