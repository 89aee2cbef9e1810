//! Query orchestrator: top-level entry point for user queries.
//!
//! Validates input, routes by mode (search vs. answer), composes the retry
//! policy with the mandatory single-shot fallback, and writes successful
//! exchanges into the conversation history. Also keeps the UI-facing
//! transcript of messages for the current session.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{error, warn};

use satchel_client::api::{AnswerResponse, AnswerService, StreamObserver};
use satchel_client::{ClientError, RetryOrchestrator, RetryOutcome};
use satchel_core::types::{Message, Metadata, QueryMode};
use satchel_store::{ConversationHistoryStore, SettingsStore};

use crate::error::ChatError;
use crate::notify::{NotificationSink, Severity};

/// Coordinates the remote service, the stores, and the notification sink.
pub struct QueryOrchestrator {
    api: Arc<dyn AnswerService>,
    history: Arc<ConversationHistoryStore>,
    settings: Arc<SettingsStore>,
    notifications: Arc<NotificationSink>,
    transcript: Mutex<Vec<Message>>,
    retry_base_delay: Duration,
}

impl QueryOrchestrator {
    pub fn new(
        api: Arc<dyn AnswerService>,
        history: Arc<ConversationHistoryStore>,
        settings: Arc<SettingsStore>,
        notifications: Arc<NotificationSink>,
    ) -> Self {
        Self {
            api,
            history,
            settings,
            notifications,
            transcript: Mutex::new(Vec::new()),
            retry_base_delay: Duration::from_secs(1),
        }
    }

    /// Override the backoff delay unit between streaming attempts.
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Submit a user query.
    ///
    /// Empty or whitespace-only input is rejected before any network
    /// activity. On success exactly one conversation is recorded; on
    /// failure one error notification fires and one error message joins
    /// the transcript, and nothing is persisted.
    pub async fn submit(
        &self,
        input: &str,
        mode: QueryMode,
        observer: StreamObserver<'_>,
    ) -> Result<Message, ChatError> {
        let query = input.trim();
        if query.is_empty() {
            self.notifications
                .notify("Please enter a query", Severity::Error);
            return Err(ChatError::EmptyQuery);
        }

        let user = Message::user(query);
        self.push(user.clone());

        let result = match mode {
            QueryMode::Search => self.run_search(query).await,
            QueryMode::Answer => self.run_answer(query, observer).await,
        };

        match result {
            Ok(message) => {
                self.push(message.clone());
                self.record(user, message.clone());
                Ok(message)
            }
            Err(e) => {
                self.notifications
                    .notify(format!("Error: {}", e), Severity::Error);
                self.push(Message::error(format!("Query failed: {}", e)));
                Err(e.into())
            }
        }
    }

    /// Upload a document to the remote index.
    ///
    /// Produces a system message with the processing details on success;
    /// never recorded in the conversation history.
    pub async fn ingest_document(
        &self,
        document_name: &str,
        bytes: &[u8],
    ) -> Result<Message, ChatError> {
        match self.api.process(document_name, bytes).await {
            Ok(response) => {
                let mut details = Metadata::new();
                details.insert("chunks_processed".to_string(), json!(response.chunks_processed));
                details.insert("document_id".to_string(), json!(response.document_id));
                details.insert(
                    "processing_time".to_string(),
                    json!(response.processing_time_seconds),
                );
                details.insert(
                    "summaries_generated".to_string(),
                    json!(response.summaries_generated.unwrap_or(0)),
                );

                let message =
                    Message::system(format!("Successfully processed {}", document_name), details);
                self.push(message.clone());
                self.notifications.notify(
                    format!(
                        "Processed {} chunks in {}s",
                        response.chunks_processed, response.processing_time_seconds
                    ),
                    Severity::Success,
                );
                Ok(message)
            }
            Err(e) => {
                self.notifications
                    .notify(format!("Error: {}", e), Severity::Error);
                self.push(Message::error(format!(
                    "Failed to process document: {}",
                    e
                )));
                Err(e.into())
            }
        }
    }

    /// Generate content from a template prefix and a topic.
    ///
    /// One single-shot answer call; the result is returned to the caller
    /// and deliberately kept out of both transcript and history.
    pub async fn generate(&self, prompt_prefix: &str, topic: &str) -> Result<String, ChatError> {
        if prompt_prefix.trim().is_empty() || topic.trim().is_empty() {
            self.notifications
                .notify("Select a template and enter a topic", Severity::Error);
            return Err(if prompt_prefix.trim().is_empty() {
                ChatError::MissingField("template")
            } else {
                ChatError::MissingField("topic")
            });
        }

        let query = format!("{}{}", prompt_prefix, topic);
        match self.api.answer(&query).await {
            Ok(response) => match response.answer {
                Some(answer) if !answer.is_empty() => {
                    self.notifications
                        .notify("Content generated successfully!", Severity::Success);
                    Ok(answer)
                }
                _ => {
                    self.notifications
                        .notify("Error: no content generated", Severity::Error);
                    Err(ChatError::Api("no content generated".to_string()))
                }
            },
            Err(e) => {
                self.notifications
                    .notify(format!("Error: {}", e), Severity::Error);
                Err(e.into())
            }
        }
    }

    /// Snapshot of the session transcript, oldest-first.
    pub fn transcript(&self) -> Vec<Message> {
        self.lock().clone()
    }

    // -- Private helpers --

    async fn run_search(&self, query: &str) -> Result<Message, ClientError> {
        let response = self.api.search(query).await?;
        let found = response.results.len();

        let mut metadata = Metadata::new();
        metadata.insert(
            "total".to_string(),
            json!(response.total.unwrap_or(found as u64)),
        );
        if let Some(secs) = response.search_time_seconds {
            metadata.insert("search_time".to_string(), json!(secs));
        }

        Ok(Message::Search {
            content: format!("Found {} relevant chunks", found),
            results: response.results,
            metadata,
            query: Some(query.to_string()),
            timestamp: Utc::now(),
        })
    }

    async fn run_answer(
        &self,
        query: &str,
        observer: StreamObserver<'_>,
    ) -> Result<Message, ClientError> {
        let settings = self.settings.current();
        if !settings.streaming_enabled {
            return self.answer_once(query).await;
        }

        let retry = RetryOrchestrator::new(settings.stream_retries)
            .with_base_delay(self.retry_base_delay);
        match retry.run(|_| self.api.stream_answer(query, observer)).await {
            RetryOutcome::Completed(message) => Ok(message),
            RetryOutcome::Exhausted { last_error } => {
                warn!(error = %last_error, "all streaming attempts failed, using single-shot fallback");
                // Partial streamed content, if any, is discarded wholesale;
                // the fallback answer replaces it.
                let message = self.answer_once(query).await?;
                self.notifications
                    .notify("Streaming failed, using standard mode", Severity::Info);
                Ok(message)
            }
        }
    }

    async fn answer_once(&self, query: &str) -> Result<Message, ClientError> {
        let response = self.api.answer(query).await?;
        Ok(answer_message(query, response))
    }

    fn record(&self, user: Message, assistant: Message) {
        let id = self.history.append(user, assistant);
        if self.settings.current().auto_bookmark {
            self.history.toggle_bookmark(id);
        }
    }

    fn push(&self, message: Message) {
        self.lock().push(message);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        match self.transcript.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("transcript lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// Build the assistant message for a single-shot answer response.
fn answer_message(query: &str, response: AnswerResponse) -> Message {
    let mut metadata = Metadata::new();
    if let Some(n) = response.retrieved_chunks {
        metadata.insert("retrieved_chunks".to_string(), json!(n));
    }
    if let Some(secs) = response.total_time_seconds {
        metadata.insert("total_time".to_string(), json!(secs));
    }

    Message::Assistant {
        content: response
            .answer
            .unwrap_or_else(|| "No answer generated".to_string()),
        sources: response.sources,
        metadata,
        streaming: false,
        query: Some(query.to_string()),
        timestamp: Utc::now(),
    }
}

// =============================================================================
// Tests
// =============================================================================
