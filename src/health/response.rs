// src/health/response.rs
use serde::{Deserialize, Serialize};

/// Fallback shown when a failure carries no usable description.
pub const FALLBACK_ERROR_MESSAGE: &str = "Failed to fetch health status";

/// Payload returned by `GET {base}/health`.
///
/// Both fields are optional on the wire; a body that omits one still parses
/// and the field is simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthResponse {
    pub fn new(status: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error! status: {status}")]
    Http { status: u16 },

    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    Parse(String),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Http { .. } => "http_error",
            FetchError::Transport(_) => "transport_error",
            FetchError::Parse(_) => "parse_error",
        }
    }
}

/// The single error shape handed to consumers of the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    pub message: String,
}

impl ErrorDetail {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            return Self::fallback();
        }
        Self { message }
    }

    pub fn fallback() -> Self {
        Self {
            message: FALLBACK_ERROR_MESSAGE.to_string(),
        }
    }
}

impl From<&FetchError> for ErrorDetail {
    fn from(err: &FetchError) -> Self {
        ErrorDetail::new(err.to_string())
    }
}

impl From<FetchError> for ErrorDetail {
    fn from(err: FetchError) -> Self {
        ErrorDetail::from(&err)
    }
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_parse_as_absent() {
        let parsed: HealthResponse = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert_eq!(parsed.status.as_deref(), Some("ok"));
        assert_eq!(parsed.message, None);

        let empty: HealthResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, HealthResponse::default());
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let parsed: HealthResponse =
            serde_json::from_str(r#"{"status":"ok","message":"up","uptime":12}"#).unwrap();
        assert_eq!(parsed, HealthResponse::new("ok", "up"));
    }

    #[test]
    fn test_error_detail_messages() {
        let http = ErrorDetail::from(FetchError::Http { status: 503 });
        assert_eq!(http.message, "HTTP error! status: 503");

        let transport = ErrorDetail::from(FetchError::Transport("connection refused".into()));
        assert_eq!(transport.message, "connection refused");
    }

    #[test]
    fn test_blank_failure_text_uses_fallback() {
        let detail = ErrorDetail::from(FetchError::Transport("  ".into()));
        assert_eq!(detail.message, FALLBACK_ERROR_MESSAGE);
    }
}
