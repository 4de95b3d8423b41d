// Trellis - a scoped HTTP/WebSocket client with layered configuration.
//
// This facade re-exports the member crates: the scope primitive, the HTTP
// client, and the optional WebSocket opener.

// Re-export the scope primitive
pub use trellis_scope::{DisposeGuard, ListenerGuard, Scope, ScopeEvent};

// Re-export the HTTP client
pub use trellis_http_client::*;

// Re-export the WebSocket opener
#[cfg(feature = "websocket")]
pub use trellis_websocket::{
    CloseFrame, Message, SocketHandle, SocketOpener, SocketOptions, WebSocketError,
    WebSocketExt, WebSocketResult,
};
