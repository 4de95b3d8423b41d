//! Scoped HTTP client with layered configuration.
//!
//! The client resolves every call against three configuration layers
//! (scope-chain intercepts, the instance config, a per-call override),
//! resolves relative URLs against the configured base, and runs one dispatch
//! attempt with timeout, external abort, and scope-disposal cancellation
//! composed around it. Response decoding and proxy dispatch are pluggable
//! through scope-bound registries.
//!
//! # Example
//!
//! ```no_run
//! use trellis_http_client::{HttpClient, HttpConfig, RequestOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new(
//!     HttpConfig::builder()
//!         .base_url("https://api.example.com")
//!         .header("Accept", "application/json")
//!         .build(),
//! );
//!
//! let user = client.get("/users/1", RequestOptions::default()).await?;
//! println!("{:?}", user.as_json());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod client;
mod config;
mod decode;
mod error;
mod interceptor;
mod proxy;
mod request;
mod response;
mod transport;
mod url;

pub use client::HttpClient;
pub use config::{merge_config, resolve_config, HttpConfig, HttpConfigBuilder};
pub use decode::{DecodeFn, DecoderGuard, DecoderRegistry, Payload, ResponseAs};
pub use error::{HttpClientError, Result};
pub use interceptor::{InterceptorGuard, LoggingInterceptor, RequestInterceptor};
pub use proxy::{ProxyFactory, ProxyGuard, ProxyRegistry};
pub use request::{Body, RequestBuilder, RequestOptions, StatusPolicy, StatusPredicate};
pub use response::Response;
pub use transport::{Dispatcher, RawResponse, RedirectPolicy, ReqwestDispatcher, TransportRequest};
pub use crate::url::resolve_url;

/// Commonly used types.
pub mod prelude {
    pub use crate::client::HttpClient;
    pub use crate::config::HttpConfig;
    pub use crate::decode::{Payload, ResponseAs};
    pub use crate::error::{HttpClientError, Result};
    pub use crate::request::{Body, RequestOptions};
    pub use crate::response::Response;
}
