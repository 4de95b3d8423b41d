//! Per-call request options and the fluent request builder.

use crate::client::HttpClient;
use crate::config::HttpConfig;
use crate::decode::ResponseAs;
use crate::error::{HttpClientError, Result};
use crate::response::Response;
use crate::transport::RedirectPolicy;
use bytes::Bytes;
use http::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Caller-supplied status validation predicate.
pub type StatusPredicate = Arc<dyn Fn(StatusCode) -> bool + Send + Sync>;

/// Which default status validation applies when the caller supplies none.
///
/// Verb helpers are strict (`status < 400` throws); the bare call form is
/// lenient and resolves for every status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPolicy {
    /// Reject statuses `>= 400` unless a predicate overrides.
    Strict,
    /// Resolve for every status unless a predicate is supplied.
    Lenient,
}

/// Request body.
#[derive(Debug, Clone)]
pub enum Body {
    /// JSON document, serialized with a `Content-Type: application/json`
    /// header injected only when the caller has not set one.
    Json(Value),
    /// Plain text.
    Text(String),
    /// URL-encoded form pairs.
    Form(Vec<(String, String)>),
    /// Raw bytes, passed through with no header injection.
    Bytes(Bytes),
}

impl Body {
    /// JSON body from any serializable value.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| HttpClientError::Body(e.to_string()))
    }
}

/// Per-call request configuration, layered over the instance and scope-chain
/// configs.
#[derive(Clone)]
pub struct RequestOptions {
    /// Config override layer for this call (highest precedence).
    pub http: HttpConfig,
    /// HTTP method, when not given positionally. Defaults to GET.
    pub method: Option<Method>,
    /// Query parameters, appended in insertion order; `null` values are
    /// skipped.
    pub params: Vec<(String, Value)>,
    /// Request body.
    pub body: Option<Body>,
    /// Whether the connection may be reused.
    pub keep_alive: bool,
    /// Redirect policy.
    pub redirect: RedirectPolicy,
    /// Declared response type; `None` selects content-type sniffing.
    pub response_as: Option<ResponseAs>,
    /// Status validation predicate, overriding the entry point's default.
    pub validate_status: Option<StatusPredicate>,
    /// External cancellation signal.
    pub signal: Option<CancellationToken>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            method: None,
            params: Vec::new(),
            body: None,
            keep_alive: true,
            redirect: RedirectPolicy::Follow,
            response_as: None,
            validate_status: None,
            signal: None,
        }
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("http", &self.http)
            .field("method", &self.method)
            .field("params", &self.params)
            .field("body", &self.body)
            .field("keep_alive", &self.keep_alive)
            .field("redirect", &self.redirect)
            .field("response_as", &self.response_as)
            .field("validate_status", &self.validate_status.is_some())
            .field("signal", &self.signal.is_some())
            .finish()
    }
}

/// Fluent request builder.
///
/// Builder-sent requests validate status strictly, like the verb helpers.
pub struct RequestBuilder<'a> {
    client: &'a HttpClient,
    method: Method,
    url: String,
    options: RequestOptions,
}

impl<'a> RequestBuilder<'a> {
    pub(crate) fn new(client: &'a HttpClient, method: Method, url: String) -> Self {
        Self {
            client,
            method,
            url,
            options: RequestOptions::default(),
        }
    }

    /// Add a header to this request's override layer.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options
            .http
            .headers
            .push((name.into(), value.into()));
        self
    }

    /// Add a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.params.push((key.into(), value.into()));
        self
    }

    /// Set the request body as JSON.
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self> {
        self.options.body = Some(Body::json(value)?);
        Ok(self)
    }

    /// Set the request body as text.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.options.body = Some(Body::Text(text.into()));
        self
    }

    /// Set the request body as URL-encoded form pairs.
    pub fn form<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.options.body = Some(Body::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ));
        self
    }

    /// Set the request body as raw bytes.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.options.body = Some(Body::Bytes(body.into()));
        self
    }

    /// Set a timeout for this request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.http.timeout = Some(timeout);
        self
    }

    /// Route this request through a proxy agent.
    pub fn proxy_agent(mut self, agent: impl Into<String>) -> Self {
        self.options.http.proxy_agent = Some(agent.into());
        self
    }

    /// Set bearer authentication.
    pub fn bearer_auth(self, token: impl Into<String>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.into()))
    }

    /// Set basic authentication.
    pub fn basic_auth(
        self,
        username: impl Into<String>,
        password: Option<impl Into<String>>,
    ) -> Self {
        use base64::Engine;
        let credentials = match password {
            Some(p) => format!("{}:{}", username.into(), p.into()),
            None => format!("{}:", username.into()),
        };
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        self.header("Authorization", format!("Basic {}", encoded))
    }

    /// Declare the response type.
    pub fn response_as(mut self, response_as: ResponseAs) -> Self {
        self.options.response_as = Some(response_as);
        self
    }

    /// Supply a status validation predicate.
    pub fn validate_status(
        mut self,
        predicate: impl Fn(StatusCode) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.options.validate_status = Some(Arc::new(predicate));
        self
    }

    /// Attach an external cancellation signal.
    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.options.signal = Some(signal);
        self
    }

    /// Disable connection reuse for this request.
    pub fn no_keep_alive(mut self) -> Self {
        self.options.keep_alive = false;
        self
    }

    /// Set the redirect policy.
    pub fn redirect(mut self, redirect: RedirectPolicy) -> Self {
        self.options.redirect = redirect;
        self
    }

    /// Send the request.
    pub async fn send(self) -> Result<Response> {
        self.client
            .execute(Some(self.method), &self.url, self.options, StatusPolicy::Strict)
            .await
    }
}
