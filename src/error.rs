//! Error types for chatweave
//!
//! This module defines the error taxonomy used throughout the crate,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for chatweave operations
///
/// Covers configuration problems, remote chat-history failures, model
/// generation failures, store invariant violations and state migration.
#[derive(Error, Debug)]
pub enum ChatweaveError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote endpoint answered with a non-success status
    #[error("Network error: status={status}, {message}")]
    Network {
        /// HTTP status code returned by the remote
        status: u16,
        /// Response body or context describing the failure
        message: String,
    },

    /// Remote chat provider failure that is not tied to an HTTP status
    #[error("Remote error: {0}")]
    Remote(String),

    /// The model client reported a genuine generation error
    #[error("Generation error: {0}")]
    Generation(String),

    /// The generation was cancelled by the caller
    #[error("Generation aborted")]
    Aborted,

    /// No session with the given id exists in the store
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Index outside of the session list
    #[error("Invalid session index: index={index}, len={len}")]
    InvalidIndex {
        /// Requested index
        index: usize,
        /// Current number of sessions
        len: usize,
    },

    /// Undo was requested after the undo window elapsed
    #[error("Undo window has expired")]
    UndoExpired,

    /// Persisted state could not be upgraded
    #[error("Migration error: {0}")]
    Migration(String),

    /// State file errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for chatweave operations
///
/// Uses `anyhow::Error` so call sites can attach context while typed
/// `ChatweaveError` values stay recoverable through `downcast_ref`.
pub type Result<T> = anyhow::Result<T>;

/// How a failed generation should be treated by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationFailure {
    /// The user cancelled the request; messages are not marked as errored
    Aborted,
    /// The backend or transport failed; messages are marked as errored
    Genuine,
}

/// Classifies a generation error as aborted or genuine
///
/// An error is considered aborted when it is (or wraps) [`ChatweaveError::Aborted`]
/// or when its message mentions "aborted", which is how HTTP clients report
/// a cancelled request body.
///
/// # Examples
///
/// ```
/// use chatweave::error::{classify_generation_error, ChatweaveError, GenerationFailure};
///
/// let err: anyhow::Error = ChatweaveError::Aborted.into();
/// assert_eq!(classify_generation_error(&err), GenerationFailure::Aborted);
///
/// let err = anyhow::anyhow!("connection reset");
/// assert_eq!(classify_generation_error(&err), GenerationFailure::Genuine);
/// ```
pub fn classify_generation_error(error: &anyhow::Error) -> GenerationFailure {
    let aborted = error
        .chain()
        .any(|cause| matches!(cause.downcast_ref::<ChatweaveError>(), Some(ChatweaveError::Aborted)))
        || error.to_string().to_lowercase().contains("aborted");

    if aborted {
        GenerationFailure::Aborted
    } else {
        GenerationFailure::Genuine
    }
}

/// Renders an error as the pretty-printed JSON block appended to assistant messages
///
/// # Examples
///
/// ```
/// use chatweave::error::pretty_error;
///
/// let rendered = pretty_error("boom");
/// assert!(rendered.contains("\"error\": true"));
/// assert!(rendered.contains("boom"));
/// ```
pub fn pretty_error(message: &str) -> String {
    let value = serde_json::json!({
        "error": true,
        "message": message,
    });
    let body = serde_json::to_string_pretty(&value).unwrap_or_else(|_| message.to_string());
    format!("```json\n{}\n```", body)
}
