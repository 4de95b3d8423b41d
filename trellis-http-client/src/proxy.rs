//! Scheme-keyed proxy dispatch resolution.

use crate::error::{HttpClientError, Result};
use crate::transport::{Dispatcher, ReqwestDispatcher};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use trellis_scope::{DisposeGuard, Scope};
use url::Url;

/// Builds a dispatcher for a parsed proxy agent URL.
pub type ProxyFactory = dyn Fn(&Url) -> Result<Arc<dyn Dispatcher>> + Send + Sync;

struct FactoryEntry {
    id: u64,
    factory: Arc<ProxyFactory>,
}

type FactoryMap = HashMap<String, FactoryEntry>;

/// Registry mapping proxy URL schemes to dispatcher factories.
///
/// Consulted only when `proxy_agent` is set; a missing factory is a
/// resolution failure reported before any network call, never a silent
/// fallback.
#[derive(Clone)]
pub struct ProxyRegistry {
    inner: Arc<RwLock<FactoryMap>>,
    next_id: Arc<AtomicU64>,
}

impl ProxyRegistry {
    /// Create a registry with `http` and `https` factories backed by
    /// [`ReqwestDispatcher::with_proxy`].
    pub fn with_defaults() -> Self {
        let registry = Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        };
        let factory: Arc<ProxyFactory> =
            Arc::new(|url| Ok(Arc::new(ReqwestDispatcher::with_proxy(url)?) as Arc<dyn Dispatcher>));
        for scheme in ["http", "https"] {
            let id = registry.next_id.fetch_add(1, Ordering::Relaxed);
            registry.inner.write().insert(
                scheme.to_string(),
                FactoryEntry {
                    id,
                    factory: factory.clone(),
                },
            );
        }
        registry
    }

    /// Register a factory for each scheme, tied to `scope` like decoder
    /// registrations.
    pub fn register(&self, schemes: &[&str], factory: Arc<ProxyFactory>, scope: &Scope) -> ProxyGuard {
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
        ProxyGuard {
            registry: weak,
            entries,
            _hook: hook,
        }
    }

    /// Resolve a proxy agent URL into a dispatcher.
    pub fn resolve(&self, agent: &str) -> Result<Arc<dyn Dispatcher>> {
        let url = Url::parse(agent).map_err(|e| HttpClientError::UnresolvedProxy {
            agent: agent.to_string(),
            reason: e.to_string(),
        })?;
        let factory = self
            .inner
            .read()
            .get(url.scheme())
            .map(|entry| entry.factory.clone())
            .ok_or_else(|| HttpClientError::UnresolvedProxy {
                agent: agent.to_string(),
                reason: format!("no proxy factory registered for scheme {:?}", url.scheme()),
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

/// Guard for a scoped proxy factory registration.
pub struct ProxyGuard {
    registry: Weak<RwLock<FactoryMap>>,
    entries: Vec<(String, u64)>,
    _hook: DisposeGuard,
}

impl ProxyGuard {
    /// Retract the registration now.
    pub fn retract(self) {}
}

impl Drop for ProxyGuard {
    fn drop(&mut self) {
        remove_entries(&self.registry, &self.entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::MockDispatcher;

    fn mock_factory() -> Arc<ProxyFactory> {
        Arc::new(|_| Ok(Arc::new(MockDispatcher::new()) as Arc<dyn Dispatcher>))
    }

    #[test]
    fn test_resolve_known_scheme() {
        let registry = ProxyRegistry::with_defaults();
        assert!(registry.resolve("http://proxy.local:3128").is_ok());
        assert!(registry.resolve("https://proxy.local:3128").is_ok());
    }

    #[test]
    fn test_resolve_unknown_scheme_fails() {
        let registry = ProxyRegistry::with_defaults();
        let err = registry.resolve("socks5://h:1").err().unwrap();
        assert!(matches!(err, HttpClientError::UnresolvedProxy { .. }));
        assert!(err.to_string().contains("socks5"));
    }

    #[test]
    fn test_resolve_unparseable_agent_fails() {
        let registry = ProxyRegistry::with_defaults();
        assert!(matches!(
            registry.resolve("not a url"),
            Err(HttpClientError::UnresolvedProxy { .. })
        ));
    }

    #[test]
    fn test_registered_factory_retracts_with_scope() {
        let registry = ProxyRegistry::with_defaults();
        let scope = Scope::root();
        let _guard = registry.register(&["socks5", "socks5h"], mock_factory(), &scope);
        assert!(registry.resolve("socks5://h:1").is_ok());
        assert!(registry.resolve("socks5h://h:1").is_ok());
        scope.dispose();
        assert!(registry.resolve("socks5://h:1").is_err());
    }
}
