//! WebSocket message types.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Close frame carried by a close message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// Close status code (1000 = normal closure).
    pub code: u16,
    /// Human-readable close reason.
    pub reason: String,
}

impl CloseFrame {
    /// Normal closure (code 1000) with a reason.
    pub fn normal(reason: impl Into<String>) -> Self {
        Self {
            code: 1000,
            reason: reason.into(),
        }
    }
}

/// A WebSocket message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Text message
    Text(String),
    /// Binary message
    Binary(Bytes),
    /// Ping message
    Ping(Bytes),
    /// Pong message
    Pong(Bytes),
    /// Close message, with an optional close frame
    Close(Option<CloseFrame>),
}

impl Message {
    /// Create a new text message.
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::Text(text.into())
    }

    /// Create a new binary message.
    pub fn binary<B: Into<Bytes>>(data: B) -> Self {
        Self::Binary(data.into())
    }

    /// Create a close message without a frame.
    pub fn close() -> Self {
        Self::Close(None)
    }

    /// Create a close message with a code and reason.
    pub fn close_with(code: u16, reason: impl Into<String>) -> Self {
        Self::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        }))
    }

    /// Create a JSON text message from a serializable value.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::text(serde_json::to_string(value)?))
    }

    /// Parse the message payload as JSON.
    pub fn parse_json<'a, T: Deserialize<'a>>(&'a self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(self.as_bytes())
    }

    /// Get the payload as a string, for text messages.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Get the message payload as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) | Self::Ping(data) | Self::Pong(data) => data,
            Self::Close(_) => &[],
        }
    }

    /// Check if this is a text message.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Check if this is a binary message.
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    /// Check if this is a close message.
    pub fn is_close(&self) -> bool {
        matches!(self, Self::Close(_))
    }
}

impl From<tungstenite::Message> for Message {
    fn from(msg: tungstenite::Message) -> Self {
        match msg {
            tungstenite::Message::Text(text) => Self::Text(text.as_str().to_string()),
            tungstenite::Message::Binary(data) => Self::Binary(Bytes::from(data)),
            tungstenite::Message::Ping(data) => Self::Ping(Bytes::from(data)),
            tungstenite::Message::Pong(data) => Self::Pong(Bytes::from(data)),
            tungstenite::Message::Close(frame) => Self::Close(frame.map(|f| CloseFrame {
                code: f.code.into(),
                reason: f.reason.as_str().to_string(),
            })),
            tungstenite::Message::Frame(_) => Self::Binary(Bytes::new()),
        }
    }
}

impl From<Message> for tungstenite::Message {
    fn from(msg: Message) -> Self {
        match msg {
            Message::Text(text) => tungstenite::Message::Text(text.into()),
            Message::Binary(data) => tungstenite::Message::Binary(data.to_vec().into()),
            Message::Ping(data) => tungstenite::Message::Ping(data.to_vec().into()),
            Message::Pong(data) => tungstenite::Message::Pong(data.to_vec().into()),
            Message::Close(frame) => tungstenite::Message::Close(frame.map(|f| {
                tungstenite::protocol::CloseFrame {
                    code: f.code.into(),
                    reason: f.reason.into(),
                }
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_frame_survives_conversion() {
        let message = Message::close_with(1001, "going away");
        let raw: tungstenite::Message = message.clone().into();
        let back: Message = raw.into();
        assert_eq!(back, message);
    }

    #[test]
    fn test_text_conversion_roundtrip() {
        let raw: tungstenite::Message = Message::text("hello").into();
        let back: Message = raw.into();
        assert_eq!(back.as_text(), Some("hello"));
    }

    #[test]
    fn test_json_helper() {
        let message = Message::json(&serde_json::json!({"k": 1})).unwrap();
        assert!(message.is_text());
        let value: serde_json::Value = message.parse_json().unwrap();
        assert_eq!(value["k"], 1);
    }
}
