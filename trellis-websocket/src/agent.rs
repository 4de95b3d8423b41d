//! Socket connectors and the scheme-keyed agent registry.

use crate::error::{WebSocketError, WebSocketResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::warn;
use trellis_scope::{DisposeGuard, Scope};
use tungstenite::http::{HeaderName, HeaderValue};
use url::Url;

/// The connected stream type handed to the socket handle.
pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Performs the WebSocket handshake for a resolved URL.
///
/// The opener composes the handshake timeout around the returned future, so
/// implementations only perform one connection attempt.
#[async_trait]
pub trait SocketConnector: Send + Sync {
    /// Connect and complete the handshake, sending the resolved headers.
    async fn connect(&self, url: &Url, headers: &[(String, String)]) -> WebSocketResult<WsStream>;
}

/// Direct (non-proxied) connector backed by `tokio-tungstenite`.
#[derive(Debug, Default)]
pub struct DirectConnector;

#[async_trait]
impl SocketConnector for DirectConnector {
    async fn connect(&self, url: &Url, headers: &[(String, String)]) -> WebSocketResult<WsStream> {
        let mut request = url.as_str().into_client_request()?;
        for (name, value) in headers {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => {
                    request.headers_mut().append(name, value);
                }
                _ => warn!(header = %name, "skipping malformed header"),
            }
        }
        let (stream, _response) = connect_async(request).await?;
        Ok(stream)
    }
}

/// Builds a connector for a parsed socket agent URL.
pub type ConnectorFactory = dyn Fn(&Url) -> WebSocketResult<Arc<dyn SocketConnector>> + Send + Sync;

struct FactoryEntry {
    id: u64,
    factory: Arc<ConnectorFactory>,
}

type FactoryMap = HashMap<String, FactoryEntry>;

/// Registry mapping socket agent URL schemes to connector factories.
///
/// Consulted only when the effective config sets `proxy_agent`; a missing
/// factory is a resolution failure reported before any handshake. Starts
/// empty: tunneled connectors are environment-specific and always
/// caller-registered.
#[derive(Clone, Default)]
pub struct SocketAgentRegistry {
    inner: Arc<RwLock<FactoryMap>>,
    next_id: Arc<AtomicU64>,
}

impl SocketAgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for each scheme, retracted when the returned guard
    /// drops or `scope` disposes.
    pub fn register(
        &self,
        schemes: &[&str],
        factory: Arc<ConnectorFactory>,
        scope: &Scope,
    ) -> SocketAgentGuard {
        let mut entries = Vec::with_capacity(schemes.len());
        {
            let mut map = self.inner.write();
            for scheme in schemes {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                map.insert(
                    scheme.to_string(),
                    FactoryEntry {
                        id,
                        factory: factory.clone(),
                    },
                );
                entries.push((scheme.to_string(), id));
            }
        }
        let weak = Arc::downgrade(&self.inner);
        let hook = scope.on_dispose({
            let weak = weak.clone();
            let entries = entries.clone();
            move || remove_entries(&weak, &entries)
        });
        SocketAgentGuard {
            registry: weak,
            entries,
            _hook: hook,
        }
    }

    /// Resolve a socket agent URL into a connector.
    pub fn resolve(&self, agent: &str) -> WebSocketResult<Arc<dyn SocketConnector>> {
        let url = Url::parse(agent).map_err(|e| WebSocketError::UnresolvedAgent {
            agent: agent.to_string(),
            reason: e.to_string(),
        })?;
        let factory = self
            .inner
            .read()
            .get(url.scheme())
            .map(|entry| entry.factory.clone())
            .ok_or_else(|| WebSocketError::UnresolvedAgent {
                agent: agent.to_string(),
                reason: format!("no connector registered for scheme {:?}", url.scheme()),
            })?;
        factory(&url)
    }
}

fn remove_entries(weak: &Weak<RwLock<FactoryMap>>, entries: &[(String, u64)]) {
    if let Some(inner) = weak.upgrade() {
        let mut map = inner.write();
        for (scheme, id) in entries {
            if map.get(scheme).is_some_and(|entry| entry.id == *id) {
                map.remove(scheme);
            }
        }
    }
}

/// Guard for a scoped connector factory registration.
pub struct SocketAgentGuard {
    registry: Weak<RwLock<FactoryMap>>,
    entries: Vec<(String, u64)>,
    _hook: DisposeGuard,
}

impl SocketAgentGuard {
    /// Retract the registration now.
    pub fn retract(self) {}
}

impl Drop for SocketAgentGuard {
    fn drop(&mut self) {
        remove_entries(&self.registry, &self.entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct_factory() -> Arc<ConnectorFactory> {
        Arc::new(|_| Ok(Arc::new(DirectConnector) as Arc<dyn SocketConnector>))
    }

    #[test]
    fn test_empty_registry_rejects_any_agent() {
        let registry = SocketAgentRegistry::new();
        let err = registry.resolve("socks5://h:1").err().unwrap();
        assert!(matches!(err, WebSocketError::UnresolvedAgent { .. }));
    }

    #[test]
    fn test_registered_factory_resolves_and_retracts() {
        let registry = SocketAgentRegistry::new();
        let scope = Scope::root();
        let guard = registry.register(&["socks5"], direct_factory(), &scope);
        assert!(registry.resolve("socks5://h:1").is_ok());
        drop(guard);
        assert!(registry.resolve("socks5://h:1").is_err());
    }

    #[test]
    fn test_scope_disposal_retracts_registration() {
        let registry = SocketAgentRegistry::new();
        let scope = Scope::root();
        let _guard = registry.register(&["socks5"], direct_factory(), &scope);
        scope.dispose();
        assert!(registry.resolve("socks5://h:1").is_err());
    }
}
