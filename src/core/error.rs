//! Error handling for the publish pipeline
//!
//! This module provides the error taxonomy shared by the document validator,
//! the session manager, the API client and the orchestrator, using the
//! thiserror crate for ergonomic error handling.

use crate::validation::ValidationErrors;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for publish operations
pub type Result<T> = std::result::Result<T, PublishError>;

/// Transport failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// The request exceeded its timeout
    Timeout,
    /// DNS resolution or TCP/TLS connection failed
    Connect,
    /// Any other I/O level failure while sending or receiving
    Other,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::Connect => f.write_str("connection"),
            Self::Other => f.write_str("transport"),
        }
    }
}

/// Main error type for publishing operations
#[derive(Error, Debug)]
pub enum PublishError {
    // Pre-flight
    #[error("{0}")]
    Validation(ValidationErrors),

    // Session
    #[error("authentication failed: {message}")]
    Auth { message: String },

    #[error("not logged in")]
    NotAuthenticated,

    #[error("session expired at {expired_at}")]
    AuthExpired { expired_at: DateTime<Utc> },

    // Remote
    #[error("{kind} error: {message}")]
    Transport { kind: TransportKind, message: String },

    #[error("unexpected server response: {message}")]
    Protocol { message: String },

    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    // Local
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("{path}: {message}")]
    Io { path: String, message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl PublishError {
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }

    /// Only transport failures are worth another attempt, and only for
    /// idempotent reads.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Errors that invalidate every later authenticated call of a run
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::Auth { .. } | Self::NotAuthenticated | Self::AuthExpired { .. }
        )
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::Validation(_) => vec![
                "Fix the listed fields in the publish file",
                "Run `tao-publisher check <file>` until no violations remain",
            ],
            Self::Auth { .. } => vec![
                "Verify your username and password",
                "Check that the configured URL points to the platform",
            ],
            Self::NotAuthenticated | Self::AuthExpired { .. } => {
                vec!["Run `tao-publisher login` to open a new session"]
            }
            Self::Transport { .. } => vec![
                "Check your network connection",
                "Increase `timeoutSecs` in the configuration if the platform is slow",
            ],
            Self::Protocol { .. } => vec![
                "Check that the configured URL points to the platform API",
                "The server may run an incompatible version",
            ],
            Self::Api { .. } => vec!["Read the server message above and fix the request"],
            Self::Config { .. } => vec!["Run `tao-publisher config --url <URL>`"],
            Self::Io { .. } => vec!["Check that the file exists and is readable"],
            Self::Internal { .. } => vec!["Re-run with -v and report the log output"],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::Auth { .. } => "AUTHENTICATION_FAILED",
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::AuthExpired { .. } => "AUTH_EXPIRED",
            Self::Transport {
                kind: TransportKind::Timeout,
                ..
            } => "TIMEOUT_ERROR",
            Self::Transport { .. } => "NETWORK_ERROR",
            Self::Protocol { .. } => "PROTOCOL_ERROR",
            Self::Api { .. } => "API_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Io { .. } => "IO_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<ValidationErrors> for PublishError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<reqwest::Error> for PublishError {
    fn from(err: reqwest::Error) -> Self {
        // Request construction failures never reached the network
        if err.is_builder() {
            return Self::Internal {
                message: format!("could not build request: {}", err),
            };
        }

        let kind = if err.is_timeout() {
            TransportKind::Timeout
        } else if err.is_connect() {
            TransportKind::Connect
        } else {
            TransportKind::Other
        };

        Self::Transport {
            kind,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{FieldPath, Violation, ViolationKind};

    #[test]
    fn test_api_error_keeps_server_message() {
        let error = PublishError::Api {
            status: 409,
            message: "Component 'ndvi' already exists".to_string(),
        };

        assert_eq!(error.code(), "API_ERROR");
        assert!(!error.is_retryable());
        assert_eq!(error.to_string(), "HTTP 409: Component 'ndvi' already exists");
    }

    #[test]
    fn test_transport_errors_are_retryable() {
        let error = PublishError::Transport {
            kind: TransportKind::Timeout,
            message: "operation timed out".to_string(),
        };

        assert!(error.is_retryable());
        assert_eq!(error.code(), "TIMEOUT_ERROR");
        assert!(error.to_string().starts_with("timeout error"));

        let error = PublishError::Transport {
            kind: TransportKind::Connect,
            message: "connection refused".to_string(),
        };
        assert_eq!(error.code(), "NETWORK_ERROR");
    }

    #[test]
    fn test_request_builder_error_is_internal() {
        let err = reqwest::Client::new().get("not a url").build().unwrap_err();
        assert!(err.is_builder());

        let error = PublishError::from(err);
        assert!(matches!(error, PublishError::Internal { .. }));
        assert!(!error.is_retryable());
        assert_eq!(error.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_protocol_error_is_terminal() {
        let error = PublishError::protocol("expected JSON");
        assert!(!error.is_retryable());
        assert_eq!(error.code(), "PROTOCOL_ERROR");
    }

    #[test]
    fn test_auth_failures() {
        assert!(PublishError::NotAuthenticated.is_auth_failure());
        assert!(
            PublishError::AuthExpired {
                expired_at: Utc::now()
            }
            .is_auth_failure()
        );
        assert!(!PublishError::protocol("x").is_auth_failure());

        let actions = PublishError::NotAuthenticated.suggested_actions();
        assert!(actions.iter().any(|a| a.contains("login")));
    }

    #[test]
    fn test_validation_error_display_lists_paths() {
        let errors = ValidationErrors::new(vec![Violation::new(
            FieldPath::root().key("container").key("name"),
            ViolationKind::Missing,
        )]);
        let error = PublishError::from(errors);

        assert_eq!(error.code(), "VALIDATION_FAILED");
        assert!(error.to_string().contains("container.name"));
    }
}
