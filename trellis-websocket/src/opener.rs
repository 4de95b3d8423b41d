//! The socket opener and the connected socket handle.

use crate::agent::{DirectConnector, SocketAgentRegistry, SocketConnector, WsStream};
use crate::error::{WebSocketError, WebSocketResult};
use crate::message::Message;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;
use trellis_http_client::{resolve_url, HttpClient, HttpConfig};
use trellis_scope::DisposeGuard;
use tungstenite::protocol::Message as TungsteniteMessage;

/// Handshake timeout applied when the effective config sets none.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-call options for opening a socket.
#[derive(Debug, Clone, Default)]
pub struct SocketOptions {
    /// Config override layer for this call (highest precedence).
    pub http: HttpConfig,
    /// Query parameters, appended in insertion order; `null` values are
    /// skipped.
    pub params: Vec<(String, Value)>,
}

/// Opens sockets through the client's config and URL pipeline.
///
/// `http`/`https` URLs are rewritten to `ws`/`wss` before the handshake. A
/// configured `proxy_agent` resolves through the opener's
/// [`SocketAgentRegistry`]; otherwise the direct connector is used.
pub struct SocketOpener {
    agents: SocketAgentRegistry,
    direct: Arc<dyn SocketConnector>,
}

impl SocketOpener {
    /// Create an opener with the direct connector and an empty agent
    /// registry.
    pub fn new() -> Self {
        Self {
            agents: SocketAgentRegistry::new(),
            direct: Arc::new(DirectConnector),
        }
    }

    /// Replace the direct connector.
    pub fn with_connector(mut self, connector: Arc<dyn SocketConnector>) -> Self {
        self.direct = connector;
        self
    }

    /// The agent registry consulted for configured socket agents.
    pub fn agents(&self) -> &SocketAgentRegistry {
        &self.agents
    }

    /// Open a socket for `client`, resolving config and URL through the
    /// client's layered pipeline.
    pub async fn open(
        &self,
        client: &HttpClient,
        url: &str,
        options: SocketOptions,
    ) -> WebSocketResult<SocketHandle> {
        let config = client.effective_config(&options.http);
        let url = resolve_url(url, &config, &options.params, true)?;

        // agent resolution fails before any connection attempt
        let connector = match &config.proxy_agent {
            Some(agent) => self.agents.resolve(agent)?,
            None => self.direct.clone(),
        };

        let timeout = config.timeout.unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT);
        let stream = tokio::time::timeout(timeout, connector.connect(&url, &config.headers))
            .await
            .map_err(|_| WebSocketError::Timeout)??;
        debug!(url = %url, "WebSocket connected");

        Ok(SocketHandle::spawn(stream, client.scope()))
    }
}

impl Default for SocketOpener {
    fn default() -> Self {
        Self::new()
    }
}

/// Socket opening, as an extension of [`HttpClient`].
#[async_trait]
pub trait WebSocketExt {
    /// Open a socket with a default opener (direct connector, no agents).
    async fn ws(&self, url: &str, options: SocketOptions) -> WebSocketResult<SocketHandle>;
}

#[async_trait]
impl WebSocketExt for HttpClient {
    async fn ws(&self, url: &str, options: SocketOptions) -> WebSocketResult<SocketHandle> {
        open(self, url, options).await
    }
}

/// Open a socket for `client` with a default opener.
pub async fn open(
    client: &HttpClient,
    url: &str,
    options: SocketOptions,
) -> WebSocketResult<SocketHandle> {
    SocketOpener::new().open(client, url, options).await
}

/// Handle to a connected socket.
///
/// Messages flow through a reader/writer task pair; dropping the handle or
/// disposing the owning scope sends a close frame (normal closure for
/// disposal) and lets the tasks wind down.
pub struct SocketHandle {
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
    closed: bool,
}

impl SocketHandle {
    fn spawn(stream: WsStream, scope: &trellis_scope::Scope) -> Self {
        let (write, read) = stream.split();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel::<Message>();

        // scope disposal closes the socket; the reader task owns the guard
        // so a socket that closes first retracts the hook
        let dispose_guard = scope.on_dispose({
            let tx = outgoing_tx.clone();
            move || {
                let _ = tx.send(Message::close_with(1000, "scope disposed"));
            }
        });

        tokio::spawn(Self::writer_task(write, outgoing_rx));
        tokio::spawn(Self::reader_task(read, incoming_tx, dispose_guard));

        Self {
            tx: outgoing_tx,
            rx: incoming_rx,
            closed: false,
        }
    }

    async fn writer_task(
        mut write: SplitSink<WsStream, TungsteniteMessage>,
        mut rx: mpsc::UnboundedReceiver<Message>,
    ) {
        while let Some(message) = rx.recv().await {
            let is_close = message.is_close();
            let raw: TungsteniteMessage = message.into();

            if write.send(raw).await.is_err() {
                break;
            }
            if is_close {
                break;
            }
        }
        let _ = write.close().await;
    }

    async fn reader_task(
        mut read: SplitStream<WsStream>,
        tx: mpsc::UnboundedSender<Message>,
        dispose_guard: DisposeGuard,
    ) {
        while let Some(result) = read.next().await {
            match result {
                Ok(raw) => {
                    let message: Message = raw.into();
                    let is_close = message.is_close();
                    let _ = tx.send(message);
                    if is_close {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
        dispose_guard.retract();
    }

    /// Send a message to the server.
    pub fn send(&self, message: Message) -> WebSocketResult<()> {
        if self.closed {
            return Err(WebSocketError::ConnectionClosed);
        }
        self.tx
            .send(message)
            .map_err(|e| WebSocketError::Send(e.to_string()))
    }

    /// Send a text message.
    pub fn send_text<S: Into<String>>(&self, text: S) -> WebSocketResult<()> {
        self.send(Message::text(text))
    }

    /// Send a binary message.
    pub fn send_binary<B: Into<bytes::Bytes>>(&self, data: B) -> WebSocketResult<()> {
        self.send(Message::binary(data))
    }

    /// Send a JSON message.
    pub fn send_json<T: serde::Serialize>(&self, value: &T) -> WebSocketResult<()> {
        self.send(Message::json(value)?)
    }

    /// Receive the next message from the server.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    /// Close the connection with a code and reason.
    pub fn close(&mut self, code: u16, reason: impl Into<String>) {
        if !self.closed {
            self.closed = true;
            let _ = self.tx.send(Message::close_with(code, reason));
        }
    }

    /// Check if the connection was closed from this side.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for SocketHandle {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.tx.send(Message::close());
        }
    }
}
