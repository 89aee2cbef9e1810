//! Error types for the answering-service client.

/// Errors from the HTTP client and the streaming pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Non-success HTTP status, with whatever body the server returned.
    #[error("HTTP {status}: {body}")]
    Transport { status: u16, body: String },
    /// The request never produced a response (DNS, refused, timeout, or a
    /// broken stream mid-read).
    #[error("connection failed: {0}")]
    Connect(String),
    /// The server signaled an error in its response payload or stream.
    #[error("server error: {0}")]
    Protocol(String),
    /// A 2xx response whose body did not match the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Connect(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::Transport {
            status: 503,
            body: "service unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: service unavailable");

        let err = ClientError::Connect("dns failure".to_string());
        assert_eq!(err.to_string(), "connection failed: dns failure");

        let err = ClientError::Protocol("index not ready".to_string());
        assert_eq!(err.to_string(), "server error: index not ready");

        let err = ClientError::InvalidResponse("missing field `status`".to_string());
        assert_eq!(err.to_string(), "invalid response: missing field `status`");
    }

    #[test]
    fn test_transport_empty_body() {
        let err = ClientError::Transport {
            status: 500,
            body: String::new(),
        };
        assert_eq!(err.to_string(), "HTTP 500: ");
    }

    #[test]
    fn test_errors_implement_debug() {
        let err = ClientError::Protocol("boom".to_string());
        let dbg = format!("{:?}", err);
        assert!(dbg.contains("Protocol"));
        assert!(dbg.contains("boom"));
    }
}
