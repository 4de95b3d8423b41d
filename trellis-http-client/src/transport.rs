//! Transport seam: the dispatcher trait and its reqwest-backed default.

use crate::error::{HttpClientError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use url::Url;

/// Redirect handling for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectPolicy {
    /// Follow redirects (up to the transport's hop limit).
    #[default]
    Follow,
    /// Return redirect responses to the caller unfollowed.
    Manual,
}

/// Fully-resolved description of one outgoing request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Resolved target URL.
    pub url: Url,
    /// Resolved headers.
    pub headers: HeaderMap,
    /// Encoded body, if any.
    pub body: Option<Bytes>,
    /// Whether to reuse the connection.
    pub keep_alive: bool,
    /// Redirect policy for this request.
    pub redirect: RedirectPolicy,
}

/// Raw response from the transport, body collected.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Final URL (after any redirects).
    pub url: Url,
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Collected body bytes.
    pub body: Bytes,
}

impl RawResponse {
    /// Get a header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get the Content-Type header, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// The pluggable network call.
///
/// One dispatcher performs one attempt; cancellation is composed by the
/// executor around the returned future, so implementations only need to be
/// drop-safe mid-flight.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Perform the request and collect the response.
    async fn dispatch(&self, request: TransportRequest) -> Result<RawResponse>;
}

/// Default dispatcher backed by `reqwest`.
///
/// Holds two inner clients because reqwest fixes the redirect policy at
/// client construction; per-request [`RedirectPolicy`] picks between them.
pub struct ReqwestDispatcher {
    follow: reqwest::Client,
    manual: reqwest::Client,
}

impl ReqwestDispatcher {
    /// Create a dispatcher with the default client options.
    pub fn new() -> Self {
        Self {
            follow: Self::builder()
                .redirect(reqwest::redirect::Policy::limited(10))
                .build()
                .expect("Failed to build HTTP client"),
            manual: Self::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Create a dispatcher that routes every request through `proxy_url`.
    pub fn with_proxy(proxy_url: &Url) -> Result<Self> {
        let proxy = reqwest::Proxy::all(proxy_url.as_str()).map_err(|e| {
            HttpClientError::UnresolvedProxy {
                agent: proxy_url.to_string(),
                reason: e.to_string(),
            }
        })?;
        let build = |policy: reqwest::redirect::Policy| {
            Self::builder()
                .redirect(policy)
                .proxy(proxy.clone())
                .build()
                .map_err(|e| HttpClientError::UnresolvedProxy {
                    agent: proxy_url.to_string(),
                    reason: e.to_string(),
                })
        };
        Ok(Self {
            follow: build(reqwest::redirect::Policy::limited(10))?,
            manual: build(reqwest::redirect::Policy::none())?,
        })
    }

    fn builder() -> reqwest::ClientBuilder {
        // No client-level timeout: the executor owns timeout composition.
        reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .user_agent(concat!("trellis-http-client/", env!("CARGO_PKG_VERSION")))
    }
}

impl Default for ReqwestDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dispatcher for ReqwestDispatcher {
    async fn dispatch(&self, request: TransportRequest) -> Result<RawResponse> {
        let client = match request.redirect {
            RedirectPolicy::Follow => &self.follow,
            RedirectPolicy::Manual => &self.manual,
        };
        let target = request.url.to_string();

        let mut builder = client
            .request(request.method, request.url)
            .headers(request.headers);
        if !request.keep_alive {
            builder = builder.header(http::header::CONNECTION, "close");
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| HttpClientError::Transport {
                url: target.clone(),
                cause: Box::new(e),
            })?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| HttpClientError::Transport {
                url: target,
                cause: Box::new(e),
            })?;

        Ok(RawResponse {
            url,
            status,
            headers,
            body,
        })
    }
}
