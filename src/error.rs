//! Error types for teamslink
//!
//! Every error carries two renderings: `Display` is the technical detail that
//! goes to the log, [`Error::user_message`] is the short text shown to the user.

use std::fmt;
use thiserror::Error;

/// Result type alias for teamslink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fallback message for errors that have no specific user-facing text
pub const GENERIC_USER_MESSAGE: &str = "An unexpected error occurred. Please try again.";

/// Errors that can occur in teamslink
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("{0}")]
    Orchestration(#[from] OrchestrationError),

    #[error("Clipboard error: {0}")]
    Clipboard(String),
}

impl Error {
    /// Short message suitable for a notification or terminal line
    pub fn user_message(&self) -> String {
        match self {
            Error::Auth(e) => e.user_message(),
            Error::Api(e) => e.user_message(),
            Error::Orchestration(e) => e.user_message(),
            Error::Config(detail) => format!("Configuration problem: {}", detail),
            Error::Clipboard(_) => "Could not copy the link to the clipboard.".to_string(),
            _ => GENERIC_USER_MESSAGE.to_string(),
        }
    }
}

/// Failures of the token lifecycle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("no valid credential and interactive login not allowed")]
    NotAuthenticated,

    #[error("login cancelled: {0}")]
    LoginCancelled(String),

    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("refresh token rejected: {0}")]
    RefreshRejected(String),
}

impl AuthError {
    pub fn user_message(&self) -> String {
        match self {
            AuthError::NotAuthenticated => {
                "You are not signed in. Run `teamslink login` to sign in to your Microsoft account."
                    .to_string()
            }
            AuthError::LoginCancelled(_) => "Login failed or was cancelled.".to_string(),
            AuthError::TokenExchangeFailed(_) => {
                "Could not authenticate with Microsoft. Please try again.".to_string()
            }
            AuthError::RefreshRejected(_) => {
                "Your session has expired. Please try again to log back in to your Microsoft account."
                    .to_string()
            }
        }
    }
}

/// Classification of a failed API call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// No HTTP response at all (DNS, refused connection, timeout)
    Network,
    /// 401 or 403
    PermissionDenied,
    /// Any other non-success status
    Service,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApiErrorKind::Network => "network error",
            ApiErrorKind::PermissionDenied => "permission denied",
            ApiErrorKind::Service => "service error",
        };
        f.write_str(name)
    }
}

/// A failed call to a remote HTTP API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// HTTP status, absent for network-level failures
    pub status: Option<u16>,
    pub message: String,
}

impl ApiError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            status: None,
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => ApiErrorKind::PermissionDenied,
            _ => ApiErrorKind::Service,
        };
        Self {
            kind,
            status: Some(status),
            message: message.into(),
        }
    }

    /// Whether the failure was a server-side (5xx) status
    pub fn is_retryable(&self) -> bool {
        matches!(self.status, Some(s) if s >= 500)
    }

    pub fn user_message(&self) -> String {
        match self.kind {
            ApiErrorKind::Network => format!(
                "A network error occurred while contacting Microsoft services: {}",
                self.message
            ),
            ApiErrorKind::PermissionDenied => format!(
                "Permission denied. Please ensure the application has the required permissions in Azure. (Details: {})",
                self.message
            ),
            ApiErrorKind::Service => {
                format!("A service error occurred. (Details: {})", self.message)
            }
        }
    }
}

/// Failures raised by the meeting orchestrator itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestrationError {
    #[error("network connectivity unavailable")]
    Offline,

    #[error("a meeting is already being generated")]
    Busy,

    #[error("profile lookup failed: {0}")]
    Profile(#[source] ApiError),

    #[error("meeting creation failed: {0}")]
    CreateMeeting(#[source] ApiError),

    #[error("response missing field `{0}`")]
    MissingField(&'static str),
}

impl OrchestrationError {
    pub fn user_message(&self) -> String {
        match self {
            OrchestrationError::Offline => {
                "Network connection unavailable. Please check your connection and try again."
                    .to_string()
            }
            OrchestrationError::Busy => {
                "A meeting link is already being generated. Please wait for it to finish."
                    .to_string()
            }
            OrchestrationError::Profile(e) => {
                format!("Failed to get user profile. (Details: {})", e.message)
            }
            OrchestrationError::CreateMeeting(e) => {
                format!("Failed to create meeting. (Details: {})", e.message)
            }
            OrchestrationError::MissingField(_) => GENERIC_USER_MESSAGE.to_string(),
        }
    }
}
