//! Request interceptors.
//!
//! Interceptors form an explicit ordered chain run over the outgoing
//! [`TransportRequest`] just before dispatch, each able to inspect or mutate
//! it.

use crate::error::Result;
use crate::transport::TransportRequest;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use trellis_scope::{DisposeGuard, Scope};

/// Interceptor for outgoing requests, invoked in registration order.
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    /// Inspect or mutate the request before it is dispatched.
    async fn intercept(&self, request: &mut TransportRequest) -> Result<()>;
}

struct InterceptorEntry {
    id: u64,
    interceptor: Arc<dyn RequestInterceptor>,
}

/// Ordered interceptor chain shared by a client and its descendants.
#[derive(Clone, Default)]
pub(crate) struct InterceptorChain {
    inner: Arc<RwLock<Vec<InterceptorEntry>>>,
    next_id: Arc<std::sync::atomic::AtomicU64>,
}

impl InterceptorChain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(
        &self,
        interceptor: Arc<dyn RequestInterceptor>,
        scope: &Scope,
    ) -> InterceptorGuard {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.inner.write().push(InterceptorEntry { id, interceptor });
        let weak = Arc::downgrade(&self.inner);
        let hook = scope.on_dispose({
            let weak = weak.clone();
            move || remove_entry(&weak, id)
        });
        InterceptorGuard {
            chain: weak,
            id,
            _hook: hook,
        }
    }

    /// Run the chain over the request, in registration order.
    pub(crate) async fn run(&self, request: &mut TransportRequest) -> Result<()> {
        let snapshot: Vec<Arc<dyn RequestInterceptor>> = self
            .inner
            .read()
            .iter()
            .map(|entry| entry.interceptor.clone())
            .collect();
        for interceptor in snapshot {
            interceptor.intercept(request).await?;
        }
        Ok(())
    }
}

fn remove_entry(weak: &Weak<RwLock<Vec<InterceptorEntry>>>, id: u64) {
    if let Some(inner) = weak.upgrade() {
        inner.write().retain(|entry| entry.id != id);
    }
}

/// Guard for a scoped interceptor registration.
pub struct InterceptorGuard {
    chain: Weak<RwLock<Vec<InterceptorEntry>>>,
    id: u64,
    _hook: DisposeGuard,
}

impl InterceptorGuard {
    /// Retract the registration now.
    pub fn retract(self) {}
}

impl Drop for InterceptorGuard {
    fn drop(&mut self) {
        remove_entry(&self.chain, self.id);
    }
}

/// Interceptor that logs outgoing requests.
pub struct LoggingInterceptor {
    log_headers: bool,
}

impl LoggingInterceptor {
    /// Create a new logging interceptor.
    pub fn new() -> Self {
        Self { log_headers: false }
    }

    /// Enable logging of headers.
    pub fn with_headers(mut self) -> Self {
        self.log_headers = true;
        self
    }
}

impl Default for LoggingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestInterceptor for LoggingInterceptor {
    async fn intercept(&self, request: &mut TransportRequest) -> Result<()> {
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            "Sending HTTP request"
        );
        if self.log_headers {
            for (name, value) in &request.headers {
                tracing::trace!(header = %name, value = ?value, "Request header");
            }
        }
        Ok(())
    }
}
