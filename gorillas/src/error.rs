use thiserror::Error;

/// Errors surfaced by the Some Gorillas client.
///
/// Low-level HTTP and wallet failures are classified into these variants once,
/// at the boundary where they occur. The type is `Clone` so a single failed
/// request can be reported to every subscriber of a shared query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GorillasError {
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("request rejected by the wallet")]
    UserRejected,

    #[error("timed out waiting for the wallet signature")]
    SignatureTimeout,

    #[error("login exchange failed (status {status:?}): {message}")]
    ExchangeFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("unauthorized")]
    AuthFailed,

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("popup blocked by the browser")]
    PopupBlocked,

    #[error("cancelled")]
    Cancelled,

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("cached value for {0} has an unexpected type")]
    CacheMismatch(String),
}

impl GorillasError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => Self::AuthFailed,
            500..=599 => Self::Server { status, message },
            _ => Self::Http { status, message },
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthFailed => Some(401),
            Self::Server { status, .. } | Self::Http { status, .. } => Some(*status),
            Self::ExchangeFailed { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether a caller may reasonably retry the operation as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::Timeout
                | Self::Server { .. }
                | Self::Cancelled
                | Self::SignatureTimeout
        )
    }
}

impl From<reqwest::Error> for GorillasError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }
        if let Some(status) = e.status() {
            return Self::from_status(status.as_u16(), e.to_string());
        }
        if e.is_decode() {
            return Self::Json(e.to_string());
        }
        Self::Network(e.to_string())
    }
}

impl From<serde_json::Error> for GorillasError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

impl From<std::io::Error> for GorillasError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GorillasError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classification() {
        assert_eq!(
            GorillasError::from_status(401, "nope".into()),
            GorillasError::AuthFailed
        );
        assert!(matches!(
            GorillasError::from_status(503, "down".into()),
            GorillasError::Server { status: 503, .. }
        ));
        assert!(matches!(
            GorillasError::from_status(403, "forbidden".into()),
            GorillasError::Http { status: 403, .. }
        ));
    }

    #[test]
    fn test_retryable() {
        assert!(GorillasError::Timeout.is_retryable());
        assert!(GorillasError::Network("reset".into()).is_retryable());
        assert!(GorillasError::from_status(500, String::new()).is_retryable());
        assert!(!GorillasError::UserRejected.is_retryable());
        assert!(!GorillasError::AuthFailed.is_retryable());
        assert!(!GorillasError::PopupBlocked.is_retryable());
    }

    #[test]
    fn test_status_accessor() {
        let err = GorillasError::ExchangeFailed {
            status: Some(403),
            message: "forbidden".into(),
        };
        assert_eq!(err.status(), Some(403));
        assert_eq!(GorillasError::Timeout.status(), None);
    }
}
