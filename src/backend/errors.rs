use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Categories of backend transport errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    /// The channel never opened (connect failure, bad URL, timeout)
    Connection,
    /// The server answered with a non-success status
    HttpStatus,
    /// The channel failed after delivery began
    Stream,
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendErrorKind::Connection => write!(f, "connection"),
            BackendErrorKind::HttpStatus => write!(f, "http_status"),
            BackendErrorKind::Stream => write!(f, "stream"),
        }
    }
}

/// Structured transport error with kind and optional raw details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendError {
    /// Error category
    pub kind: BackendErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl BackendError {
    /// Creates a new backend error.
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates a connection error (the channel never opened).
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Connection, message)
    }

    /// Creates a mid-stream error.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Stream, message)
    }

    /// Creates an HTTP status error.
    pub fn http_status(status: u16, body: &str) -> Self {
        let details = (!body.is_empty()).then(|| body.to_string());
        let message = match extract_message(body) {
            Some(msg) => format!("HTTP {status}: {msg}"),
            None => format!("HTTP {status}"),
        };
        Self {
            kind: BackendErrorKind::HttpStatus,
            message,
            details,
        }
    }
}

/// Pulls a human-readable message out of a JSON error body.
///
/// The backend answers with either `{"error": "..."}` (chat routes) or
/// `{"msg": "..."}` (auth routes); nested `{"error": {"message": "..."}}`
/// covers proxies in between.
fn extract_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    if let Some(msg) = json.get("error").and_then(Value::as_str) {
        return Some(msg.to_string());
    }
    if let Some(msg) = json.get("msg").and_then(Value::as_str) {
        return Some(msg.to_string());
    }
    json.get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BackendError {}
