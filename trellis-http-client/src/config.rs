//! Layered client configuration.
//!
//! Three layers resolve into one effective config per call, lowest to
//! highest precedence: scope-chain intercept layers (innermost to outermost),
//! the instance config, and the per-call override. The instance config is
//! re-asserted at every chain hop, so a scope layer can add fields but never
//! permanently suppress an instance default.

use std::time::Duration;

/// Client configuration snapshot.
///
/// Merge-associative plain data; every resolution produces a fresh value,
/// never mutating a layer in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpConfig {
    /// Base URL that relative request URLs are joined against.
    pub base_url: Option<String>,
    /// Deprecated alias for `base_url`, prepended as a raw string when the
    /// request URL is not absolute. Prefer `base_url`.
    pub endpoint: Option<String>,
    /// Default headers, key-unioned across layers (later layer wins per key,
    /// first-appearance order preserved).
    pub headers: Vec<(String, String)>,
    /// Request timeout, measured from call start.
    pub timeout: Option<Duration>,
    /// Proxy agent URL; resolved through the scheme-keyed proxy registry.
    pub proxy_agent: Option<String>,
}

impl HttpConfig {
    /// Create a new configuration builder.
    pub fn builder() -> HttpConfigBuilder {
        HttpConfigBuilder::default()
    }

    /// Look up a default header, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Builder for [`HttpConfig`].
#[derive(Debug, Default)]
pub struct HttpConfigBuilder {
    config: HttpConfig,
}

impl HttpConfigBuilder {
    /// Set the base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Add a default header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        set_header(&mut self.config.headers, &name.into(), &value.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Set the proxy agent URL.
    pub fn proxy_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.proxy_agent = Some(agent.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> HttpConfig {
        self.config
    }
}

/// Merge `source` over `target`: shallow replacement for every field except
/// `headers`, which key-unions with `source` winning per key. An empty
/// layer is a no-op.
pub fn merge_config(mut target: HttpConfig, source: &HttpConfig) -> HttpConfig {
    if source.base_url.is_some() {
        target.base_url = source.base_url.clone();
    }
    if source.endpoint.is_some() {
        target.endpoint = source.endpoint.clone();
    }
    if source.timeout.is_some() {
        target.timeout = source.timeout;
    }
    if source.proxy_agent.is_some() {
        target.proxy_agent = source.proxy_agent.clone();
    }
    for (name, value) in &source.headers {
        set_header(&mut target.headers, name, value);
    }
    target
}

/// Resolve the effective config for one call.
///
/// `chain` holds the scope intercept layers, innermost first. Each hop
/// merges the layer and then re-asserts the instance config, so the header
/// precedence is `per_call > instance > outermost > ... > innermost` and
/// non-header fields follow the same order with replace semantics.
pub fn resolve_config(
    instance: &HttpConfig,
    chain: &[HttpConfig],
    per_call: &HttpConfig,
) -> HttpConfig {
    let mut resolved = instance.clone();
    for layer in chain {
        resolved = merge_config(resolved, layer);
        resolved = merge_config(resolved, instance);
    }
    merge_config(resolved, per_call)
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    if let Some(slot) = headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
        slot.1 = value.to_string();
    } else {
        headers.push((name.to_string(), value.to_string()));
    }
}
