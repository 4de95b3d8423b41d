//! Scope event types.

use serde_json::Value;

/// A fire-and-forget notification emitted through a scope.
///
/// Events bubble from the emitting scope up to the root, so a listener
/// subscribed on an ancestor observes events from every descendant.
#[derive(Debug, Clone)]
pub struct ScopeEvent {
    /// Event name, e.g. `http:config` or `http:fetch`.
    pub name: String,
    /// Structured event detail.
    pub detail: Value,
}

impl ScopeEvent {
    /// Create a new event.
    pub fn new(name: impl Into<String>, detail: Value) -> Self {
        Self {
            name: name.into(),
            detail,
        }
    }
}

/// Guard returned by [`crate::Scope::subscribe`].
///
/// Dropping the guard removes the listener.
pub struct ListenerGuard {
    pub(crate) retract: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerGuard {
    /// Remove the listener now.
    pub fn retract(mut self) {
        if let Some(f) = self.retract.take() {
            f();
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(f) = self.retract.take() {
            f();
        }
    }
}
