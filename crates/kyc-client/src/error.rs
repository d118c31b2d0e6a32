//! Client error types.
//!
//! `Display` of every variant is the message shown to the user, so callers
//! can surface `err.to_string()` directly.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to the KYC Shield API.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Session expired. Please log in again.")]
    SessionExpired,

    #[error("Not signed in. Please log in to continue.")]
    NotAuthenticated,

    #[error("Network error: {0}. Please check your connection and try again.")]
    Network(String),

    #[error("Request failed (HTTP {status}): {detail}")]
    Server { status: u16, detail: String },

    #[error("Status check failed (HTTP {status}): {detail}")]
    StatusCheckFailed { status: u16, detail: String },

    #[error("Analysis failed: {0}")]
    JobFailed(String),

    #[error(
        "Analysis is taking longer than expected ({elapsed_secs}s). \
         Reference job ID {job_id} if you contact support."
    )]
    JobTimeout { job_id: String, elapsed_secs: u64 },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn server(status: u16, detail: impl Into<String>) -> Self {
        Self::Server {
            status,
            detail: detail.into(),
        }
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True if the server rejected the credentials (refresh cookie or login).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized(_))
    }

    /// True for any failure that means the user must sign in again.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            ClientError::Unauthorized(_) | ClientError::SessionExpired | ClientError::NotAuthenticated
        )
    }

    /// HTTP status associated with this error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ClientError::Unauthorized(_) | ClientError::SessionExpired => Some(401),
            ClientError::Server { status, .. } | ClientError::StatusCheckFailed { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::InvalidResponse(err.to_string())
        } else if err.is_timeout() {
            ClientError::Network("request timed out".to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_classification() {
        assert!(ClientError::unauthorized("nope").is_unauthorized());
        assert!(ClientError::unauthorized("nope").is_auth());
        assert!(ClientError::SessionExpired.is_auth());
        assert!(ClientError::NotAuthenticated.is_auth());
        assert!(!ClientError::SessionExpired.is_unauthorized());
        assert!(!ClientError::network("reset").is_auth());
    }

    #[test]
    fn test_http_status_getter() {
        assert_eq!(ClientError::SessionExpired.http_status(), Some(401));
        assert_eq!(ClientError::server(502, "bad gateway").http_status(), Some(502));
        assert_eq!(
            ClientError::StatusCheckFailed { status: 404, detail: "gone".into() }.http_status(),
            Some(404)
        );
        assert_eq!(ClientError::network("reset").http_status(), None);
    }

    #[test]
    fn test_user_facing_messages() {
        let timeout = ClientError::JobTimeout {
            job_id: "abc123".into(),
            elapsed_secs: 121,
        };
        assert!(timeout.to_string().contains("abc123"));

        assert!(ClientError::network("connection reset").to_string().contains("try again"));
        assert_eq!(
            ClientError::SessionExpired.to_string(),
            "Session expired. Please log in again."
        );
        assert_eq!(
            ClientError::validation("Please select a video").to_string(),
            "Please select a video"
        );
    }

    #[test]
    fn test_json_error_is_invalid_response() {
        let err: ClientError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }
}
