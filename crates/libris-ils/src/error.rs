//! ILS error types
//!
//! Error definitions with retryable/permanent classification. Transport
//! never retries on its own; callers decide using [`IlsError::is_retryable`].

use thiserror::Error;

/// Error that can occur while talking to the ILS.
#[derive(Debug, Error)]
pub enum IlsError {
    /// Network failure, timeout or HTTP 5xx. Potentially retryable.
    #[error("ILS transport error: {message}")]
    Transport {
        message: String,
        /// HTTP status when the ILS answered with a server error.
        status: Option<u16>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The ILS answered with a body that could not be parsed.
    #[error("malformed ILS response: {0}")]
    MalformedResponse(String),

    /// A date value matched none of the supported formats.
    #[error("unrecognized date format: '{0}'")]
    DateFormat(String),

    /// The ILS understood the request and refused it.
    #[error("ILS rejected the request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The driver's dialect has no such operation.
    #[error("operation '{operation}' is not supported by the {dialect} driver")]
    Unsupported {
        dialect: &'static str,
        operation: &'static str,
    },

    /// Driver configuration is unusable.
    #[error("invalid ILS configuration: {0}")]
    Configuration(String),
}

impl IlsError {
    /// Create a transport error with a source error.
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        IlsError::Transport {
            message: message.into(),
            status: None,
            source: Some(Box::new(source)),
        }
    }

    /// Create a transport error for an HTTP server error status.
    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        IlsError::Transport {
            message: message.into(),
            status: Some(status),
            source: None,
        }
    }

    /// Check if the caller may retry this operation.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, IlsError::Transport { .. })
    }

    /// HTTP status the ILS answered with, if the error carries one.
    #[must_use]
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            IlsError::Transport { status, .. } => *status,
            IlsError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for ILS operations.
pub type IlsResult<T> = Result<T, IlsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_is_retryable() {
        assert!(IlsError::server_error(503, "unavailable").is_retryable());
        assert!(!IlsError::MalformedResponse("eof".into()).is_retryable());
        assert!(!IlsError::DateFormat("x".into()).is_retryable());
        assert!(!IlsError::Rejected {
            status: 400,
            message: "bad".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_upstream_status() {
        assert_eq!(IlsError::server_error(502, "x").upstream_status(), Some(502));
        assert_eq!(
            IlsError::Rejected {
                status: 409,
                message: "dup".into()
            }
            .upstream_status(),
            Some(409)
        );
        assert_eq!(IlsError::DateFormat("x".into()).upstream_status(), None);
    }

    #[test]
    fn test_display() {
        let err = IlsError::Unsupported {
            dialect: "xserver",
            operation: "create_patron",
        };
        assert_eq!(
            err.to_string(),
            "operation 'create_patron' is not supported by the xserver driver"
        );
        assert_eq!(
            IlsError::DateFormat("not-a-date".into()).to_string(),
            "unrecognized date format: 'not-a-date'"
        );
    }
}
