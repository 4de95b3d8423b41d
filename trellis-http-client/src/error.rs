//! HTTP client error types.

use crate::response::Response;
use http::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Result type for HTTP client operations.
pub type Result<T> = std::result::Result<T, HttpClientError>;

/// Uniform error type for every failure the client surfaces.
///
/// Callers branch on error kind through the predicate methods
/// ([`is_timeout`](Self::is_timeout), [`code`](Self::code),
/// [`status_code`](Self::status_code)) rather than matching on a concrete
/// exception class.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// The raw URL could not be parsed or joined against the base URL.
    /// Reported synchronously, never dispatched.
    #[error("Invalid URL {input:?}: {reason}")]
    InvalidUrl {
        /// The offending input.
        input: String,
        /// Parse failure detail.
        reason: String,
    },

    /// `proxy_agent` is set but no factory is registered for its scheme.
    #[error("Cannot resolve proxy agent {agent:?}: {reason}")]
    UnresolvedProxy {
        /// The configured proxy agent URL.
        agent: String,
        /// Resolution failure detail.
        reason: String,
    },

    /// The underlying transport failed (network, DNS, TLS).
    #[error("Request to {url} failed: {cause}")]
    Transport {
        /// Target URL of the failed request.
        url: String,
        /// The original transport failure.
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The request exceeded the configured timeout.
    #[error("Request timed out after {after:?}")]
    Timeout {
        /// The timeout that elapsed.
        after: Duration,
    },

    /// The request was aborted by an external signal or scope disposal.
    #[error("Request cancelled: {reason}")]
    Cancelled {
        /// Why the request was aborted.
        reason: String,
    },

    /// A response arrived but was rejected by the status validator.
    #[error("{}", .response.status_text)]
    Status {
        /// The rejected response, with best-effort decoded data.
        response: Box<Response>,
    },

    /// The caller asked for a response type with no registered decoder.
    #[error("Unknown responseType: {0}")]
    UnknownResponseType(String),

    /// A decoder failed on the response body.
    #[error("Failed to decode {tag} response: {reason}")]
    Decode {
        /// The decoder tag that ran.
        tag: String,
        /// Decode failure detail.
        reason: String,
    },

    /// The request body could not be encoded.
    #[error("Failed to encode request body: {0}")]
    Body(String),
}

impl HttpClientError {
    /// Machine-readable error code, for branching without string matching.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Timeout { .. } => Some("ETIMEDOUT"),
            Self::Cancelled { .. } => Some("ECANCELED"),
            _ => None,
        }
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this error came from an abort (external signal or scope
    /// disposal).
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Get the HTTP status code if a response was received and rejected.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Status { response } => Some(response.status),
            _ => None,
        }
    }

    /// Get the rejected response, if any.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Status { response } => Some(response),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_carries_code() {
        let err = HttpClientError::Timeout {
            after: Duration::from_millis(50),
        };
        assert_eq!(err.code(), Some("ETIMEDOUT"));
        assert!(err.is_timeout());
        assert!(err.status_code().is_none());
    }

    #[test]
    fn test_cancelled_carries_code() {
        let err = HttpClientError::Cancelled {
            reason: "scope disposed".to_string(),
        };
        assert_eq!(err.code(), Some("ECANCELED"));
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_proxy_error_message() {
        let err = HttpClientError::UnresolvedProxy {
            agent: "socks5://h:1".to_string(),
            reason: "no factory registered for scheme \"socks5\"".to_string(),
        };
        assert!(err.to_string().starts_with("Cannot resolve proxy agent"));
        assert!(err.to_string().contains("socks5://h:1"));
    }

    #[test]
    fn test_unknown_response_type_message() {
        let err = HttpClientError::UnknownResponseType("xml".to_string());
        assert_eq!(err.to_string(), "Unknown responseType: xml");
    }
}
