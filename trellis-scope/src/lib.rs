//! # Trellis Scope
//!
//! Disposable ownership scopes for the Trellis client toolkit.
//!
//! A [`Scope`] is a node in a tree of lifetimes. Resources registered against
//! a scope (teardown callbacks, decoder registrations, open sockets) are
//! retracted when the scope is disposed; disposing a scope disposes its
//! children first. Scopes also carry typed state layers that descendants can
//! collect with [`Scope::chain`], and a fire-and-forget event channel.
//!
//! ## Example
//!
//! ```rust
//! use trellis_scope::Scope;
//!
//! let root = Scope::root();
//! let child = root.child();
//!
//! let retracted = child.on_dispose(|| println!("never runs"));
//! drop(retracted);
//!
//! let _teardown = child.on_dispose(|| println!("runs exactly once"));
//! root.dispose(); // cascades into child
//! ```

#![warn(missing_docs)]

mod event;
mod scope;

pub use event::{ListenerGuard, ScopeEvent};
pub use scope::{DisposeGuard, Scope};
