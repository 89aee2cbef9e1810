//! Error types for the query orchestrator.

use satchel_client::ClientError;

/// Errors surfaced to callers of the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Empty or whitespace-only query; rejected before any network call.
    #[error("query cannot be empty")]
    EmptyQuery,
    /// A required input for the generator was missing.
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    /// The remote service failed after retries and fallback.
    #[error("request failed: {0}")]
    Api(String),
}

impl From<ClientError> for ChatError {
    fn from(err: ClientError) -> Self {
        ChatError::Api(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyQuery.to_string(), "query cannot be empty");
        assert_eq!(
            ChatError::MissingField("topic").to_string(),
            "topic must not be empty"
        );
        assert_eq!(
            ChatError::Api("HTTP 500: boom".to_string()).to_string(),
            "request failed: HTTP 500: boom"
        );
    }

    #[test]
    fn test_from_client_error() {
        let client_err = ClientError::Protocol("index unavailable".to_string());
        let chat_err: ChatError = client_err.into();
        assert!(matches!(chat_err, ChatError::Api(_)));
        assert!(chat_err.to_string().contains("index unavailable"));
    }
}
