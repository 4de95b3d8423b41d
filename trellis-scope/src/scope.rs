//! Scope tree implementation.

use crate::event::{ListenerGuard, ScopeEvent};
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::trace;

type Hook = Box<dyn FnOnce() + Send>;
type Listener = Arc<dyn Fn(&ScopeEvent) + Send + Sync>;

/// A disposable ownership scope.
///
/// Cloning a `Scope` yields another handle to the same node; the node is
/// disposed explicitly via [`Scope::dispose`] (or transitively, when an
/// ancestor disposes), never by `Drop`.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    parent: Option<Arc<ScopeInner>>,
    state: Mutex<ScopeState>,
}

// hooks and listeners are id-keyed so retraction removes the entry instead
// of leaving a tombstone; registration order is the vec order
#[derive(Default)]
struct ScopeState {
    layers: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    hooks: Vec<(u64, Hook)>,
    listeners: Vec<(u64, Listener)>,
    children: Vec<Weak<ScopeInner>>,
    next_id: u64,
    disposed: bool,
}

impl Scope {
    /// Create a root scope.
    pub fn root() -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                parent: None,
                state: Mutex::new(ScopeState::default()),
            }),
        }
    }

    /// Create a child scope.
    ///
    /// The child is disposed when this scope disposes. A child of an
    /// already-disposed scope starts out disposed.
    pub fn child(&self) -> Self {
        let child = Self {
            inner: Arc::new(ScopeInner {
                parent: Some(self.inner.clone()),
                state: Mutex::new(ScopeState::default()),
            }),
        };
        let mut state = self.inner.state.lock();
        if state.disposed {
            drop(state);
            child.dispose();
        } else {
            state.children.retain(|c| c.strong_count() > 0);
            state.children.push(Arc::downgrade(&child.inner));
        }
        child
    }

    /// Attach a typed state layer to this scope, replacing any existing layer
    /// of the same type.
    pub fn set<T: Send + Sync + 'static>(&self, value: T) {
        self.inner
            .state
            .lock()
            .layers
            .insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Get this scope's own layer of type `T`, if set.
    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.inner
            .state
            .lock()
            .layers
            .get(&TypeId::of::<T>())
            .and_then(|any| any.downcast_ref::<T>())
            .cloned()
    }

    /// Collect the `T` layers from this scope up to the root, innermost
    /// first. Scopes without a `T` layer are skipped.
    pub fn chain<T: Clone + Send + Sync + 'static>(&self) -> Vec<T> {
        let mut out = Vec::new();
        let mut node = Some(self.inner.clone());
        while let Some(inner) = node {
            if let Some(value) = inner
                .state
                .lock()
                .layers
                .get(&TypeId::of::<T>())
                .and_then(|any| any.downcast_ref::<T>())
                .cloned()
            {
                out.push(value);
            }
            node = inner.parent.clone();
        }
        out
    }

    /// Register a teardown callback, returning a guard that retracts it.
    ///
    /// Registering on an already-disposed scope runs the callback
    /// immediately and returns a disarmed guard.
    pub fn on_dispose(&self, f: impl FnOnce() + Send + 'static) -> DisposeGuard {
        let mut state = self.inner.state.lock();
        if state.disposed {
            drop(state);
            f();
            return DisposeGuard { retract: None };
        }
        let id = state.next_id;
        state.next_id += 1;
        state.hooks.push((id, Box::new(f)));
        let weak = Arc::downgrade(&self.inner);
        DisposeGuard {
            retract: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner
                        .state
                        .lock()
                        .hooks
                        .retain(|(hook_id, _)| *hook_id != id);
                }
            })),
        }
    }

    /// Dispose this scope: children first, then this scope's teardown
    /// callbacks in reverse registration order. Idempotent.
    pub fn dispose(&self) {
        dispose_inner(&self.inner);
    }

    /// Whether this scope has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// Subscribe to events emitted on this scope or any descendant.
    pub fn subscribe(&self, f: impl Fn(&ScopeEvent) + Send + Sync + 'static) -> ListenerGuard {
        let mut state = self.inner.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.listeners.push((id, Arc::new(f)));
        let weak = Arc::downgrade(&self.inner);
        ListenerGuard {
            retract: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner
                        .state
                        .lock()
                        .listeners
                        .retain(|(listener_id, _)| *listener_id != id);
                }
            })),
        }
    }

    /// Emit a fire-and-forget event, notifying listeners on this scope and
    /// every ancestor.
    pub fn emit(&self, event: ScopeEvent) {
        trace!(name = %event.name, "scope event");
        let mut targets: Vec<Listener> = Vec::new();
        let mut node = Some(self.inner.clone());
        while let Some(inner) = node {
            targets.extend(
                inner
                    .state
                    .lock()
                    .listeners
                    .iter()
                    .map(|(_, listener)| listener.clone()),
            );
            node = inner.parent.clone();
        }
        for listener in targets {
            listener(&event);
        }
    }
}

fn dispose_inner(inner: &Arc<ScopeInner>) {
    let (children, hooks) = {
        let mut state = inner.state.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        (
            std::mem::take(&mut state.children),
            std::mem::take(&mut state.hooks),
        )
    };
    for child in children {
        if let Some(child) = child.upgrade() {
            dispose_inner(&child);
        }
    }
    for (_, hook) in hooks.into_iter().rev() {
        hook();
    }
}

/// Guard returned by [`Scope::on_dispose`].
///
/// Dropping the guard retracts the callback; after the scope has disposed,
/// dropping it is a no-op.
pub struct DisposeGuard {
    retract: Option<Box<dyn FnOnce() + Send>>,
}

impl DisposeGuard {
    /// Retract the callback now.
    pub fn retract(mut self) {
        if let Some(f) = self.retract.take() {
            f();
        }
    }
}

impl Drop for DisposeGuard {
    fn drop(&mut self) {
        if let Some(f) = self.retract.take() {
            f();
        }
    }
}
