//! The scoped HTTP client and its request execution pipeline.

use crate::config::{merge_config, resolve_config, HttpConfig};
use crate::decode::{self, DecodeFn, DecoderGuard, DecoderRegistry, Payload, ResponseAs};
use crate::error::{HttpClientError, Result};
use crate::interceptor::{InterceptorChain, InterceptorGuard, RequestInterceptor};
use crate::proxy::{ProxyFactory, ProxyGuard, ProxyRegistry};
use crate::request::{RequestBuilder, RequestOptions, StatusPolicy};
use crate::response::Response;
use crate::transport::{Dispatcher, RawResponse, ReqwestDispatcher, TransportRequest};
use crate::url::resolve_url;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use trellis_scope::{Scope, ScopeEvent};

/// Scoped HTTP client.
///
/// Each call resolves an independent effective config snapshot from three
/// layers (scope chain, instance config, per-call override), resolves the
/// target URL, and runs one dispatch attempt with composed cancellation.
/// Sockets, timers, and registrations tied to the owning [`Scope`] are torn
/// down when it disposes.
#[derive(Clone)]
pub struct HttpClient {
    scope: Scope,
    config: Arc<HttpConfig>,
    dispatcher: Arc<dyn Dispatcher>,
    decoders: DecoderRegistry,
    proxies: ProxyRegistry,
    interceptors: InterceptorChain,
}

impl HttpClient {
    /// Create a client with the given instance config under a fresh root
    /// scope.
    pub fn new(config: HttpConfig) -> Self {
        Self::with_scope(config, Scope::root())
    }

    /// Create a client owned by `scope`.
    pub fn with_scope(config: HttpConfig, scope: Scope) -> Self {
        Self {
            scope,
            config: Arc::new(config),
            dispatcher: Arc::new(ReqwestDispatcher::new()),
            decoders: DecoderRegistry::with_defaults(),
            proxies: ProxyRegistry::with_defaults(),
            interceptors: InterceptorChain::new(),
        }
    }

    /// Replace the default dispatcher (used when no proxy agent resolves).
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// The scope this client is tied to.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The instance-level default config.
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Derive a new client with `overrides` merged over this client's
    /// instance config, owned by a child scope. The parent is not mutated;
    /// registries are shared.
    pub fn extend(&self, overrides: HttpConfig) -> Self {
        Self {
            scope: self.scope.child(),
            config: Arc::new(merge_config((*self.config).clone(), &overrides)),
            dispatcher: self.dispatcher.clone(),
            decoders: self.decoders.clone(),
            proxies: self.proxies.clone(),
            interceptors: self.interceptors.clone(),
        }
    }

    /// Register a response decoder under `tag`, retracted when the guard
    /// drops or this client's scope disposes.
    pub fn decoder(
        &self,
        tag: impl Into<String>,
        decode: impl Fn(&RawResponse) -> Result<Payload> + Send + Sync + 'static,
    ) -> DecoderGuard {
        self.decoders.register(tag, Arc::new(decode), &self.scope)
    }

    /// Register a proxy dispatcher factory for the given URL schemes,
    /// retracted like decoder registrations.
    pub fn proxy(&self, schemes: &[&str], factory: Arc<ProxyFactory>) -> ProxyGuard {
        self.proxies.register(schemes, factory, &self.scope)
    }

    /// Append a request interceptor, run in registration order before
    /// dispatch.
    pub fn interceptor(&self, interceptor: Arc<dyn RequestInterceptor>) -> InterceptorGuard {
        self.interceptors.register(interceptor, &self.scope)
    }

    /// Resolve the effective config for one call from the scope chain, the
    /// instance config, and a per-call override layer.
    pub fn effective_config(&self, per_call: &HttpConfig) -> HttpConfig {
        // observers see the in-progress config: the instance seed, before
        // the chain walk and the per-call merge
        self.scope
            .emit(ScopeEvent::new("http:config", config_detail(&self.config)));
        let chain = self.scope.chain::<HttpConfig>();
        resolve_config(&self.config, &chain, per_call)
    }

    /// Bare call form: resolves for every status unless the caller supplies
    /// a `validate_status` predicate.
    pub async fn request(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.execute(None, url, options, StatusPolicy::Lenient).await
    }

    /// Bare call form with an explicit method.
    pub async fn call(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        self.execute(Some(method), url, options, StatusPolicy::Lenient)
            .await
    }

    /// GET, strict status validation, returns the decoded data.
    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<Payload> {
        Ok(self
            .execute(Some(Method::GET), url, options, StatusPolicy::Strict)
            .await?
            .data)
    }

    /// DELETE, strict status validation, returns the decoded data.
    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<Payload> {
        Ok(self
            .execute(Some(Method::DELETE), url, options, StatusPolicy::Strict)
            .await?
            .data)
    }

    /// POST, strict status validation, returns the decoded data.
    pub async fn post(
        &self,
        url: &str,
        body: Option<crate::request::Body>,
        mut options: RequestOptions,
    ) -> Result<Payload> {
        if body.is_some() {
            options.body = body;
        }
        Ok(self
            .execute(Some(Method::POST), url, options, StatusPolicy::Strict)
            .await?
            .data)
    }

    /// PUT, strict status validation, returns the decoded data.
    pub async fn put(
        &self,
        url: &str,
        body: Option<crate::request::Body>,
        mut options: RequestOptions,
    ) -> Result<Payload> {
        if body.is_some() {
            options.body = body;
        }
        Ok(self
            .execute(Some(Method::PUT), url, options, StatusPolicy::Strict)
            .await?
            .data)
    }

    /// PATCH, strict status validation, returns the decoded data.
    pub async fn patch(
        &self,
        url: &str,
        body: Option<crate::request::Body>,
        mut options: RequestOptions,
    ) -> Result<Payload> {
        if body.is_some() {
            options.body = body;
        }
        Ok(self
            .execute(Some(Method::PATCH), url, options, StatusPolicy::Strict)
            .await?
            .data)
    }

    /// HEAD, strict status validation, returns the response headers.
    pub async fn head(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<Vec<(String, String)>> {
        let response = self
            .execute(Some(Method::HEAD), url, options, StatusPolicy::Strict)
            .await?;
        Ok(response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect())
    }

    /// Start a fluent request (strict status validation on send).
    pub fn prepare(&self, method: Method, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, method, url.into())
    }

    /// The execution pipeline for a single call.
    pub(crate) async fn execute(
        &self,
        method: Option<Method>,
        url: &str,
        mut options: RequestOptions,
        policy: StatusPolicy,
    ) -> Result<Response> {
        // 1. argument normalization
        let method = method
            .or_else(|| options.method.take())
            .unwrap_or(Method::GET);

        // 2. config + URL resolution
        let config = self.effective_config(&options.http);
        let url = resolve_url(url, &config, &options.params, false)?;

        // pre-resolve the decoder so an unknown tag fails before dispatch
        let decode_step: Option<Arc<DecodeFn>> = match &options.response_as {
            Some(ResponseAs::Custom(f)) => Some(f.clone()),
            Some(ResponseAs::Tag(tag)) => Some(
                self.decoders
                    .lookup(tag)
                    .ok_or_else(|| HttpClientError::UnknownResponseType(tag.to_string()))?,
            ),
            None => None,
        };

        // 3. cancellation composition
        if let Some(signal) = &options.signal
            && signal.is_cancelled()
        {
            return Err(HttpClientError::Cancelled {
                reason: "request aborted by caller".to_string(),
            });
        }
        let external = options.signal.clone();
        let timeout = config.timeout;
        let deadline = timeout.map(|d| tokio::time::Instant::now() + d);
        let internal = CancellationToken::new();
        let dispose_guard = self.scope.on_dispose({
            let token = internal.clone();
            move || token.cancel()
        });

        // 4. body encoding
        let mut headers = header_map(&config.headers);
        let body = encode_body(options.body.take(), &mut headers)?;

        // 5. proxy dispatch resolution (eager, before any network call)
        let dispatcher: Arc<dyn Dispatcher> = match &config.proxy_agent {
            Some(agent) => self.proxies.resolve(agent)?,
            None => self.dispatcher.clone(),
        };

        let mut transport_request = TransportRequest {
            method: method.clone(),
            url: url.clone(),
            headers,
            body,
            keep_alive: options.keep_alive,
            redirect: options.redirect,
        };
        self.interceptors.run(&mut transport_request).await?;
        self.scope.emit(ScopeEvent::new(
            "http:fetch",
            json!({ "method": method.as_str(), "url": url.as_str() }),
        ));
        debug!(method = %method, url = %url, "dispatching HTTP request");

        // 6. dispatch, racing the abort sources; first abort wins
        let mut dispatch = dispatcher.dispatch(transport_request);
        let result = tokio::select! {
            biased;
            _ = wait_cancelled(external.as_ref()) => Err(HttpClientError::Cancelled {
                reason: "request aborted by caller".to_string(),
            }),
            _ = internal.cancelled() => Err(HttpClientError::Cancelled {
                reason: "scope disposed".to_string(),
            }),
            _ = wait_deadline(deadline) => Err(HttpClientError::Timeout {
                after: timeout.unwrap_or_default(),
            }),
            result = &mut dispatch => result,
        };
        // 9. teardown: retract the scope hook; the timer and abort listeners
        // drop with the select. Idempotent against prior scope disposal.
        drop(dispose_guard);
        let raw = result?;

        let run_decode = |raw: &RawResponse| -> Result<Payload> {
            match &decode_step {
                Some(f) => f(raw),
                None => decode::default_decode(raw),
            }
        };

        // 7. status validation
        let mut response = Response::from_raw(&raw);
        let valid = match (&options.validate_status, policy) {
            (Some(predicate), _) => predicate(raw.status),
            (None, StatusPolicy::Strict) => raw.status.as_u16() < 400,
            (None, StatusPolicy::Lenient) => true,
        };
        if !valid {
            // best-effort decode; a failure here never masks the HTTP error
            response.data = run_decode(&raw).unwrap_or(Payload::Null);
            warn!(status = %raw.status, url = %response.url, "request rejected by status validation");
            return Err(HttpClientError::Status {
                response: Box::new(response),
            });
        }

        // 8. decode
        response.data = run_decode(&raw)?;
        Ok(response)
    }
}

async fn wait_cancelled(signal: Option<&CancellationToken>) {
    match signal {
        Some(signal) => signal.cancelled().await,
        None => std::future::pending().await,
    }
}

async fn wait_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn config_detail(config: &HttpConfig) -> serde_json::Value {
    json!({
        "base_url": config.base_url,
        "endpoint": config.endpoint,
        "headers": config.headers,
        "timeout_ms": config.timeout.map(|d| d.as_millis() as u64),
        "proxy_agent": config.proxy_agent,
    })
}

fn header_map(pairs: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        match (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => warn!(header = %name, "skipping malformed header"),
        }
    }
    map
}

fn encode_body(
    body: Option<crate::request::Body>,
    headers: &mut HeaderMap,
) -> Result<Option<Bytes>> {
    use crate::request::Body;
    let Some(body) = body else {
        return Ok(None);
    };
    let (bytes, content_type) = match body {
        Body::Json(value) => (
            Bytes::from(
                serde_json::to_vec(&value).map_err(|e| HttpClientError::Body(e.to_string()))?,
            ),
            Some("application/json"),
        ),
        Body::Text(text) => (
            Bytes::from(text.into_bytes()),
            Some("text/plain; charset=utf-8"),
        ),
        Body::Form(pairs) => (
            Bytes::from(
                serde_urlencoded::to_string(&pairs)
                    .map_err(|e| HttpClientError::Body(e.to_string()))?
                    .into_bytes(),
            ),
            Some("application/x-www-form-urlencoded"),
        ),
        Body::Bytes(bytes) => (bytes, None),
    };
    if let Some(content_type) = content_type
        && !headers.contains_key(CONTENT_TYPE)
    {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    Ok(Some(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Body;
    use crate::transport::testing::{canned, MockDispatcher, PendingDispatcher};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::time::Duration;

    fn with_header(name: &str, value: &str) -> HttpConfig {
        HttpConfig::builder().header(name, value).build()
    }

    fn options_with_header(name: &str, value: &str) -> RequestOptions {
        RequestOptions {
            http: with_header(name, value),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_get_decodes_json_with_layered_headers() {
        let mock = Arc::new(
            MockDispatcher::new().respond_with(canned(200, "application/json", br#"{"ok":true}"#)),
        );
        let scope = Scope::root();
        scope.set::<HttpConfig>(with_header("B", "2"));
        let mut instance = with_header("A", "1");
        instance.timeout = Some(Duration::from_millis(1000));
        let client = HttpClient::with_scope(instance, scope).with_dispatcher(mock.clone());

        let data = client
            .get("https://api.test/x", options_with_header("A", "9"))
            .await
            .unwrap();
        assert_eq!(data, Payload::Json(json!({"ok": true})));

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].headers.get("A").unwrap(), "9");
        assert_eq!(calls[0].headers.get("B").unwrap(), "2");
    }

    #[tokio::test]
    async fn test_unknown_response_type_fails_before_dispatch() {
        let mock = Arc::new(MockDispatcher::new());
        let client = HttpClient::new(HttpConfig::default()).with_dispatcher(mock.clone());
        let options = RequestOptions {
            response_as: Some(ResponseAs::tag("xml")),
            ..Default::default()
        };
        let err = client.request("https://api.test/x", options).await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown responseType: xml");
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_proxy_miss_fails_before_dispatch() {
        let mock = Arc::new(MockDispatcher::new());
        let config = HttpConfig::builder().proxy_agent("socks5://h:1").build();
        let client = HttpClient::new(config).with_dispatcher(mock.clone());
        let err = client
            .request("https://api.test/x", RequestOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Cannot resolve proxy agent"));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_registered_proxy_factory_is_used() {
        let proxied = Arc::new(
            MockDispatcher::new().respond_with(canned(200, "text/plain", b"via proxy")),
        );
        let config = HttpConfig::builder().proxy_agent("socks5://h:1").build();
        let client = HttpClient::new(config);
        let _guard = client.proxy(&["socks5"], {
            let proxied = proxied.clone();
            Arc::new(move |_| Ok(proxied.clone() as Arc<dyn Dispatcher>))
        });
        let data = client
            .get("https://api.test/x", RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(data, Payload::Text("via proxy".to_string()));
        assert_eq!(proxied.call_count(), 1);
    }

    #[tokio::test]
    async fn test_status_error_keeps_null_data_on_undecodable_body() {
        let mock = Arc::new(
            MockDispatcher::new().respond_with(canned(500, "application/json", b"not json")),
        );
        let client = HttpClient::new(HttpConfig::default()).with_dispatcher(mock);
        let err = client
            .get("https://api.test/x", RequestOptions::default())
            .await
            .unwrap_err();
        let response = err.response().expect("status error carries response");
        assert_eq!(response.status.as_u16(), 500);
        assert!(response.data.is_null());
        assert_eq!(err.to_string(), "Internal Server Error");
    }

    #[tokio::test]
    async fn test_status_error_carries_decodable_body() {
        let mock =
            Arc::new(MockDispatcher::new().respond_with(canned(404, "text/plain", b"nope")));
        let client = HttpClient::new(HttpConfig::default()).with_dispatcher(mock);
        let err = client
            .get("https://api.test/x", RequestOptions::default())
            .await
            .unwrap_err();
        let response = err.response().unwrap();
        assert_eq!(response.data, Payload::Text("nope".to_string()));
    }

    #[tokio::test]
    async fn test_bare_request_resolves_error_status() {
        let mock = Arc::new(MockDispatcher::new().respond_with(canned(500, "text/plain", b"boom")));
        let client = HttpClient::new(HttpConfig::default()).with_dispatcher(mock);
        let response = client
            .request("https://api.test/x", RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(response.status.as_u16(), 500);
        assert_eq!(response.data, Payload::Text("boom".to_string()));
    }

    #[tokio::test]
    async fn test_bare_request_honors_caller_predicate() {
        let mock = Arc::new(MockDispatcher::new().respond_with(canned(500, "", b"")));
        let client = HttpClient::new(HttpConfig::default()).with_dispatcher(mock);
        let options = RequestOptions {
            validate_status: Some(Arc::new(|status| status.as_u16() < 500)),
            ..Default::default()
        };
        let err = client.request("https://api.test/x", options).await.unwrap_err();
        assert_eq!(err.status_code().map(|s| s.as_u16()), Some(500));
    }

    #[tokio::test]
    async fn test_json_body_injects_content_type_only_when_absent() {
        let mock = Arc::new(MockDispatcher::new());
        let client = HttpClient::new(HttpConfig::default()).with_dispatcher(mock.clone());
        client
            .post(
                "https://api.test/x",
                Some(Body::Json(json!({"a": 1}))),
                RequestOptions::default(),
            )
            .await
            .unwrap();
        let calls = mock.calls();
        assert_eq!(
            calls[0].headers.get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(calls[0].body.as_deref(), Some(br#"{"a":1}"# as &[u8]));

        // caller-set content type is preserved
        client
            .post(
                "https://api.test/x",
                Some(Body::Json(json!({}))),
                options_with_header("Content-Type", "application/vnd.custom+json"),
            )
            .await
            .unwrap();
        let calls = mock.calls();
        assert_eq!(
            calls[1].headers.get(CONTENT_TYPE).unwrap(),
            "application/vnd.custom+json"
        );
    }

    #[tokio::test]
    async fn test_raw_bytes_body_passes_through_without_header() {
        let mock = Arc::new(MockDispatcher::new());
        let client = HttpClient::new(HttpConfig::default()).with_dispatcher(mock.clone());
        client
            .post(
                "https://api.test/x",
                Some(Body::Bytes(Bytes::from_static(&[1, 2, 3]))),
                RequestOptions::default(),
            )
            .await
            .unwrap();
        let calls = mock.calls();
        assert!(calls[0].headers.get(CONTENT_TYPE).is_none());
        assert_eq!(calls[0].body.as_deref(), Some(&[1u8, 2, 3] as &[u8]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_with_code() {
        let pending = Arc::new(PendingDispatcher::new());
        let config = HttpConfig::builder()
            .timeout(Duration::from_millis(50))
            .build();
        let client = HttpClient::new(config).with_dispatcher(pending.clone());
        let err = client
            .request("https://api.test/slow", RequestOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.code(), Some("ETIMEDOUT"));
        assert_eq!(pending.call_count(), 1);
    }

    #[tokio::test]
    async fn test_pre_cancelled_signal_skips_dispatch() {
        let mock = Arc::new(MockDispatcher::new());
        let client = HttpClient::new(HttpConfig::default()).with_dispatcher(mock.clone());
        let signal = CancellationToken::new();
        signal.cancel();
        let options = RequestOptions {
            signal: Some(signal),
            ..Default::default()
        };
        let err = client.request("https://api.test/x", options).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_cancel_aborts_in_flight_request() {
        let pending = Arc::new(PendingDispatcher::new());
        let client = HttpClient::new(HttpConfig::default()).with_dispatcher(pending.clone());
        let signal = CancellationToken::new();
        let options = RequestOptions {
            signal: Some(signal.clone()),
            ..Default::default()
        };
        let (result, _) = tokio::join!(client.request("https://api.test/x", options), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            signal.cancel();
        });
        let err = result.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(pending.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scope_disposal_aborts_in_flight_request() {
        let pending = Arc::new(PendingDispatcher::new());
        let scope = Scope::root();
        let client =
            HttpClient::with_scope(HttpConfig::default(), scope.clone()).with_dispatcher(pending);
        let (result, _) = tokio::join!(
            client.request("https://api.test/x", RequestOptions::default()),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                scope.dispose();
            }
        );
        let err = result.unwrap_err();
        assert!(err.is_cancelled());
        assert!(err.to_string().contains("scope disposed"));
    }

    #[tokio::test]
    async fn test_interceptors_run_in_registration_order() {
        struct Tag(&'static str, Arc<Mutex<Vec<&'static str>>>);
        #[async_trait]
        impl RequestInterceptor for Tag {
            async fn intercept(&self, request: &mut TransportRequest) -> Result<()> {
                self.1.lock().push(self.0);
                request
                    .headers
                    .append("X-Seen", HeaderValue::from_str(self.0).unwrap());
                Ok(())
            }
        }
        let order = Arc::new(Mutex::new(Vec::new()));
        let mock = Arc::new(MockDispatcher::new());
        let client = HttpClient::new(HttpConfig::default()).with_dispatcher(mock.clone());
        let _first = client.interceptor(Arc::new(Tag("first", order.clone())));
        let _second = client.interceptor(Arc::new(Tag("second", order.clone())));
        client
            .request("https://api.test/x", RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(*order.lock(), vec!["first", "second"]);
        let seen: Vec<_> = mock.calls()[0].headers.get_all("X-Seen").iter().cloned().collect();
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn test_extend_inherits_without_mutating_parent() {
        let mock = Arc::new(MockDispatcher::new());
        let parent =
            HttpClient::new(with_header("A", "1")).with_dispatcher(mock.clone());
        let child = parent.extend(with_header("B", "2"));

        child
            .request("https://api.test/child", RequestOptions::default())
            .await
            .unwrap();
        parent
            .request("https://api.test/parent", RequestOptions::default())
            .await
            .unwrap();

        let calls = mock.calls();
        assert_eq!(calls[0].headers.get("A").unwrap(), "1");
        assert_eq!(calls[0].headers.get("B").unwrap(), "2");
        assert_eq!(calls[1].headers.get("A").unwrap(), "1");
        assert!(calls[1].headers.get("B").is_none());
    }

    #[tokio::test]
    async fn test_child_scope_disposal_retracts_child_decoder() {
        let mock = Arc::new(
            MockDispatcher::new()
                .respond_with(canned(200, "application/xml", b"<ok/>"))
                .respond_with(canned(200, "application/xml", b"<ok/>")),
        );
        let parent = HttpClient::new(HttpConfig::default()).with_dispatcher(mock.clone());
        let child = parent.extend(HttpConfig::default());
        let guard = child.decoder("xml", |raw| {
            Ok(Payload::Text(String::from_utf8_lossy(&raw.body).into_owned()))
        });
        let options = RequestOptions {
            response_as: Some(ResponseAs::tag("xml")),
            ..Default::default()
        };

        // registered: decodes through the shared registry
        let data = parent.get("https://api.test/x", options.clone()).await.unwrap();
        assert_eq!(data, Payload::Text("<ok/>".to_string()));

        child.scope().dispose();
        drop(guard);
        let err = parent.get("https://api.test/x", options).await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown responseType: xml");
    }

    #[tokio::test]
    async fn test_head_returns_headers() {
        let mut raw = canned(200, "text/plain", b"");
        raw.headers
            .insert("X-Total", HeaderValue::from_static("42"));
        let mock = Arc::new(MockDispatcher::new().respond_with(raw));
        let client = HttpClient::new(HttpConfig::default()).with_dispatcher(mock.clone());
        let headers = client
            .head("https://api.test/x", RequestOptions::default())
            .await
            .unwrap();
        assert!(headers
            .iter()
            .any(|(name, value)| name == "x-total" && value == "42"));
        assert_eq!(mock.calls()[0].method, Method::HEAD);
    }

    #[tokio::test]
    async fn test_custom_decoder_function_runs_directly() {
        let mock = Arc::new(MockDispatcher::new().respond_with(canned(200, "", b"abc")));
        let client = HttpClient::new(HttpConfig::default()).with_dispatcher(mock);
        let options = RequestOptions {
            response_as: Some(ResponseAs::custom(|raw| {
                Ok(Payload::Text(format!("len={}", raw.body.len())))
            })),
            ..Default::default()
        };
        let response = client.request("https://api.test/x", options).await.unwrap();
        assert_eq!(response.data, Payload::Text("len=3".to_string()));
    }

    #[tokio::test]
    async fn test_config_and_fetch_events_are_emitted() {
        let mock = Arc::new(MockDispatcher::new());
        let scope = Scope::root();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let _listener = scope.subscribe(move |event| s.lock().push(event.name.clone()));
        let client = HttpClient::with_scope(HttpConfig::default(), scope).with_dispatcher(mock);
        client
            .request("https://api.test/x", RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(*seen.lock(), vec!["http:config", "http:fetch"]);
    }

    #[tokio::test]
    async fn test_config_event_carries_config_snapshot() {
        let mock = Arc::new(MockDispatcher::new());
        let scope = Scope::root();
        let details = Arc::new(Mutex::new(Vec::new()));
        let d = details.clone();
        let _listener = scope.subscribe(move |event| {
            if event.name == "http:config" {
                d.lock().push(event.detail.clone());
            }
        });
        let config = HttpConfig::builder()
            .base_url("https://api.test")
            .header("A", "1")
            .timeout(Duration::from_millis(250))
            .build();
        let client = HttpClient::with_scope(config, scope).with_dispatcher(mock);
        client
            .request("/x", RequestOptions::default())
            .await
            .unwrap();
        let details = details.lock();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0]["base_url"], "https://api.test");
        assert_eq!(details[0]["headers"][0][0], "A");
        assert_eq!(details[0]["headers"][0][1], "1");
        assert_eq!(details[0]["timeout_ms"], 250);
    }

    #[tokio::test]
    async fn test_builder_sends_with_query_and_auth() {
        let mock = Arc::new(MockDispatcher::new());
        let client = HttpClient::new(HttpConfig::default()).with_dispatcher(mock.clone());
        client
            .prepare(Method::GET, "https://api.test/items")
            .query("page", 2)
            .bearer_auth("secret")
            .send()
            .await
            .unwrap();
        let calls = mock.calls();
        assert_eq!(calls[0].url.query(), Some("page=2"));
        assert_eq!(
            calls[0].headers.get("authorization").unwrap(),
            "Bearer secret"
        );
    }
}
