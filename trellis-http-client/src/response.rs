//! HTTP response wrapper.

use crate::decode::Payload;
use crate::error::Result;
use crate::transport::RawResponse;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

/// Uniform response returned by every request.
#[derive(Debug)]
pub struct Response {
    /// Final request URL (after redirects).
    pub url: String,
    /// Status code.
    pub status: StatusCode,
    /// Canonical status text, e.g. `Not Found`.
    pub status_text: String,
    /// Response headers.
    pub headers: HeaderMap,
    /// Decoded body; [`Payload::Null`] until a decode step has run.
    pub data: Payload,
}

impl Response {
    pub(crate) fn from_raw(raw: &RawResponse) -> Self {
        Self {
            url: raw.url.to_string(),
            status: raw.status,
            status_text: raw
                .status
                .canonical_reason()
                .unwrap_or("Unknown Status")
                .to_string(),
            headers: raw.headers.clone(),
            data: Payload::Null,
        }
    }

    /// Check if the response was successful (2xx).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Check if the response was a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    /// Check if the response was a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// Get a specific header value.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Get the content type if available.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Deserialize the decoded data into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        self.data.deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::canned;

    #[test]
    fn test_from_raw_has_null_data() {
        let response = Response::from_raw(&canned(200, "application/json", b"{}"));
        assert!(response.data.is_null());
        assert!(response.is_success());
        assert_eq!(response.status_text, "OK");
    }

    #[test]
    fn test_status_text_for_error() {
        let response = Response::from_raw(&canned(500, "", b""));
        assert_eq!(response.status_text, "Internal Server Error");
        assert!(response.is_server_error());
    }
}
