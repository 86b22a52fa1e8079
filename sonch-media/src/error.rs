//! Error types for the media pipeline
//!
//! Every failure the pipeline can surface is a [`MediaError`]. Callers rarely
//! need to match on individual variants; the classification helpers
//! ([`MediaError::kind`], [`MediaError::is_transient`]) drive retry decisions
//! and what the UI shows.

use std::time::Duration;

use reqwest::StatusCode;
use sonch_model::ModelError;
use thiserror::Error;

/// Coarse classification of a [`MediaError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Failed request that may succeed when repeated.
    Transient,
    /// The backend rejected our credential (401/403).
    Auth,
    /// An image load used up its whole attempt budget.
    PermanentLoadFailure,
    /// Rejected locally before or instead of touching the network.
    Validation,
    /// Anything else: non-retryable statuses, local storage, configuration.
    Other,
}

/// Main error type for the media pipeline
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Unauthorized ({status}) - please login again")]
    Auth { status: StatusCode },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Image load failed after {attempts} attempts: {last_error}")]
    PermanentLoadFailure { attempts: u32, last_error: String },

    #[error("Image processing error: {0}")]
    Processing(String),

    #[error("Unexpected response body: {0}")]
    Body(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image queue dropped the task before it settled")]
    QueueClosed,
}

/// Local rejections. These are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no credential present, login required")]
    MissingCredential,

    #[error("image decode failed: {0}")]
    Decode(String),

    #[error("image decode did not finish within {0:?}")]
    DecodeTimeout(Duration),

    #[error("invalid compression settings: {0}")]
    InvalidSettings(String),

    #[error("{0}")]
    Model(#[from] ModelError),
}

impl MediaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::Transport(_) | MediaError::Timeout => {
                ErrorKind::Transient
            }
            MediaError::Status { status, .. } => {
                if is_transient_status(*status) {
                    ErrorKind::Transient
                } else {
                    ErrorKind::Other
                }
            }
            MediaError::Auth { .. } => ErrorKind::Auth,
            MediaError::Validation(_) => ErrorKind::Validation,
            MediaError::PermanentLoadFailure { .. } => {
                ErrorKind::PermanentLoadFailure
            }
            MediaError::Processing(_)
            | MediaError::Body(_)
            | MediaError::Serialization(_)
            | MediaError::Storage(_)
            | MediaError::Config(_)
            | MediaError::QueueClosed => ErrorKind::Other,
        }
    }

    /// Whether repeating the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub fn is_auth(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            MediaError::Status { status, .. } | MediaError::Auth { status } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

impl From<reqwest::Error> for MediaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MediaError::Timeout
        } else if err.is_decode() {
            MediaError::Body(err.to_string())
        } else {
            MediaError::Transport(err.to_string())
        }
    }
}

impl From<ModelError> for MediaError {
    fn from(err: ModelError) -> Self {
        MediaError::Validation(ValidationError::Model(err))
    }
}

impl From<url::ParseError> for MediaError {
    fn from(err: url::ParseError) -> Self {
        MediaError::Config(format!("invalid URL: {err}"))
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, MediaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_throttling_are_transient() {
        for status in [
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::REQUEST_TIMEOUT,
            StatusCode::TOO_MANY_REQUESTS,
        ] {
            let err = MediaError::Status {
                status,
                body: String::new(),
            };
            assert!(err.is_transient(), "{status} should be transient");
        }
    }

    #[test]
    fn client_errors_are_not_retried() {
        let err = MediaError::Status {
            status: StatusCode::NOT_FOUND,
            body: "missing".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Other);
        assert!(!err.is_transient());
    }

    #[test]
    fn auth_and_validation_have_their_own_kinds() {
        let auth = MediaError::Auth {
            status: StatusCode::FORBIDDEN,
        };
        assert!(auth.is_auth());
        assert_eq!(auth.status(), Some(StatusCode::FORBIDDEN));

        let missing = MediaError::from(ValidationError::MissingCredential);
        assert!(missing.is_validation());
        assert!(!missing.is_transient());

        let model = MediaError::from(ModelError::EmptyIdentifier("post"));
        assert!(model.is_validation());
    }

    #[test]
    fn transport_failures_are_transient() {
        assert!(MediaError::Timeout.is_transient());
        assert!(MediaError::Transport("connection reset".into()).is_transient());
    }
}
