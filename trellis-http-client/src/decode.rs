//! Response body decoding: payload model and the pluggable decoder registry.

use crate::error::{HttpClientError, Result};
use crate::transport::RawResponse;
use bytes::Bytes;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use trellis_scope::{DisposeGuard, Scope};

/// Decoded response data.
///
/// `Null` until a decode step runs; a fetch failure or pre-decode abort
/// never reaches the caller with partial data.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// No decode has run, or decoding an error body failed.
    Null,
    /// Parsed JSON document.
    Json(Value),
    /// UTF-8 text body.
    Text(String),
    /// Raw body bytes.
    Bytes(Bytes),
    /// URL-encoded form pairs.
    Form(Vec<(String, String)>),
    /// Response header pairs.
    Headers(Vec<(String, String)>),
}

impl Payload {
    /// Whether no data has been decoded.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the JSON document, if this is a JSON payload.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Get the text, if this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Get the raw bytes, if this is a bytes payload.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Deserialize the payload into `T` (from a JSON document, text, or raw
    /// bytes).
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        let result = match self {
            Self::Json(value) => serde_json::from_value(value.clone()),
            Self::Text(text) => serde_json::from_str(text),
            Self::Bytes(bytes) => serde_json::from_slice(bytes),
            other => {
                return Err(HttpClientError::Decode {
                    tag: "json".to_string(),
                    reason: format!("payload {other:?} is not deserializable"),
                });
            }
        };
        result.map_err(|e| HttpClientError::Decode {
            tag: "json".to_string(),
            reason: e.to_string(),
        })
    }
}

/// A body decoder: raw transport response in, typed payload out.
pub type DecodeFn = dyn Fn(&RawResponse) -> Result<Payload> + Send + Sync;

/// How to decode the response body for one call.
#[derive(Clone)]
pub enum ResponseAs {
    /// Look up a registered decoder by tag.
    Tag(Cow<'static, str>),
    /// Run a caller-supplied decoder directly.
    Custom(Arc<DecodeFn>),
}

impl ResponseAs {
    /// Registered decoder by tag.
    pub fn tag(tag: impl Into<Cow<'static, str>>) -> Self {
        Self::Tag(tag.into())
    }

    /// The built-in JSON decoder.
    pub fn json() -> Self {
        Self::tag("json")
    }

    /// The built-in text decoder.
    pub fn text() -> Self {
        Self::tag("text")
    }

    /// The built-in raw-bytes decoder.
    pub fn bytes() -> Self {
        Self::tag("arraybuffer")
    }

    /// A caller-supplied decoder function.
    pub fn custom(f: impl Fn(&RawResponse) -> Result<Payload> + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }
}

impl fmt::Debug for ResponseAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(tag) => f.debug_tuple("Tag").field(tag).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

struct DecoderEntry {
    id: u64,
    decode: Arc<DecodeFn>,
}

/// Tag-keyed decoder registry shared by a client and its `extend`ed
/// descendants.
///
/// Registration returns a guard; the guard and the registering scope's
/// disposal both retract the entry, idempotently.
#[derive(Clone)]
pub struct DecoderRegistry {
    inner: Arc<RwLock<HashMap<String, DecoderEntry>>>,
    next_id: Arc<AtomicU64>,
}

impl DecoderRegistry {
    /// Create a registry pre-populated with the built-in decoders:
    /// `json`, `text`, `blob`, `arraybuffer`, `stream`, `formdata`,
    /// `headers`. The binary tags (`blob`, `arraybuffer`, `stream`) all
    /// yield the collected body bytes.
    pub fn with_defaults() -> Self {
        let registry = Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        };
        registry.insert("json", Arc::new(decode_json));
        registry.insert("text", Arc::new(decode_text));
        registry.insert("blob", Arc::new(decode_bytes));
        registry.insert("arraybuffer", Arc::new(decode_bytes));
        registry.insert("stream", Arc::new(decode_bytes));
        registry.insert("formdata", Arc::new(decode_form));
        registry.insert("headers", Arc::new(decode_headers));
        registry
    }

    fn insert(&self, tag: &str, decode: Arc<DecodeFn>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .write()
            .insert(tag.to_string(), DecoderEntry { id, decode });
        id
    }

    /// Register a decoder under `tag`, tied to `scope`: the entry is
    /// retracted when the returned guard drops or the scope disposes,
    /// whichever comes first.
    pub fn register(
        &self,
        tag: impl Into<String>,
        decode: Arc<DecodeFn>,
        scope: &Scope,
    ) -> DecoderGuard {
        let tag = tag.into();
        let id = self.insert(&tag, decode);
        let weak = Arc::downgrade(&self.inner);
        let hook = scope.on_dispose({
            let weak = weak.clone();
            let tag = tag.clone();
            move || remove_entry(&weak, &tag, id)
        });
        DecoderGuard {
            registry: weak,
            tag,
            id,
            _hook: hook,
        }
    }

    /// Look up a decoder by tag.
    pub fn lookup(&self, tag: &str) -> Option<Arc<DecodeFn>> {
        self.inner.read().get(tag).map(|entry| entry.decode.clone())
    }
}

fn remove_entry(weak: &Weak<RwLock<HashMap<String, DecoderEntry>>>, tag: &str, id: u64) {
    if let Some(inner) = weak.upgrade() {
        let mut map = inner.write();
        // only remove our own registration, not a newer one under the same tag
        if map.get(tag).is_some_and(|entry| entry.id == id) {
            map.remove(tag);
        }
    }
}

/// Guard for a scoped decoder registration.
pub struct DecoderGuard {
    registry: Weak<RwLock<HashMap<String, DecoderEntry>>>,
    tag: String,
    id: u64,
    _hook: DisposeGuard,
}

impl DecoderGuard {
    /// Retract the registration now.
    pub fn retract(self) {}
}

impl Drop for DecoderGuard {
    fn drop(&mut self) {
        remove_entry(&self.registry, &self.tag, self.id);
    }
}

/// Content-sniffing default decode, used when no response type is declared:
/// `application/json*` parses JSON, `text/*` yields text, anything else the
/// raw bytes.
pub fn default_decode(raw: &RawResponse) -> Result<Payload> {
    let content_type = raw.content_type().unwrap_or("").to_ascii_lowercase();
    if content_type.starts_with("application/json") {
        decode_json(raw)
    } else if content_type.starts_with("text/") {
        decode_text(raw)
    } else {
        decode_bytes(raw)
    }
}

fn decode_json(raw: &RawResponse) -> Result<Payload> {
    serde_json::from_slice(&raw.body)
        .map(Payload::Json)
        .map_err(|e| HttpClientError::Decode {
            tag: "json".to_string(),
            reason: e.to_string(),
        })
}

fn decode_text(raw: &RawResponse) -> Result<Payload> {
    String::from_utf8(raw.body.to_vec())
        .map(Payload::Text)
        .map_err(|e| HttpClientError::Decode {
            tag: "text".to_string(),
            reason: e.to_string(),
        })
}

fn decode_bytes(raw: &RawResponse) -> Result<Payload> {
    Ok(Payload::Bytes(raw.body.clone()))
}

fn decode_form(raw: &RawResponse) -> Result<Payload> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(&raw.body)
        .map(Payload::Form)
        .map_err(|e| HttpClientError::Decode {
            tag: "formdata".to_string(),
            reason: e.to_string(),
        })
}

fn decode_headers(raw: &RawResponse) -> Result<Payload> {
    Ok(Payload::Headers(
        raw.headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect(),
    ))
}
