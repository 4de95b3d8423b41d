//! # Trellis WebSocket
//!
//! Scope-bound socket opening for the Trellis HTTP client using
//! tokio-tungstenite.
//!
//! Sockets open through the same pipeline as HTTP calls: the layered config
//! resolver and the URL resolver, with `http`/`https` rewritten to
//! `ws`/`wss`. The connected handle is tied to the client's scope; disposal
//! closes the socket with a normal closure frame.
//!
//! ## Example
//!
//! ```rust,no_run
//! use trellis_http_client::{HttpClient, HttpConfig};
//! use trellis_websocket::{SocketOptions, WebSocketExt};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new(
//!     HttpConfig::builder()
//!         .base_url("https://api.example.com")
//!         .build(),
//! );
//!
//! let mut socket = client.ws("/live", SocketOptions::default()).await?;
//! socket.send_text("subscribe")?;
//! while let Some(message) = socket.recv().await {
//!     println!("{:?}", message);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod agent;
mod error;
mod message;
mod opener;

pub use agent::{ConnectorFactory, DirectConnector, SocketAgentGuard, SocketAgentRegistry, SocketConnector, WsStream};
pub use error::{WebSocketError, WebSocketResult};
pub use message::{CloseFrame, Message};
pub use opener::{open, SocketHandle, SocketOpener, SocketOptions, WebSocketExt, DEFAULT_HANDSHAKE_TIMEOUT};

// Re-export the raw message type from tungstenite
pub use tungstenite::Message as RawMessage;
