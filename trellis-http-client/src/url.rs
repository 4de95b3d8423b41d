//! Target URL resolution.

use crate::config::HttpConfig;
use crate::error::{HttpClientError, Result};
use serde_json::Value;
use url::Url;

/// Resolve the final request URL from a raw input.
///
/// Relative inputs are joined against `config.base_url` (or prefixed with the
/// deprecated `config.endpoint`); absolute inputs ignore the base entirely.
/// With `socket_upgrade` the scheme is rewritten `http` -> `ws` and
/// `https` -> `wss`. Query params are appended in insertion order; `null`
/// values are skipped, never serialized.
pub fn resolve_url(
    raw: &str,
    config: &HttpConfig,
    params: &[(String, Value)],
    socket_upgrade: bool,
) -> Result<Url> {
    let mut input = raw.to_string();
    if let Some(endpoint) = &config.endpoint
        && Url::parse(&input).is_err()
    {
        input = format!("{}{}", endpoint.trim(), input);
    }

    let mut url = match &config.base_url {
        Some(base) => {
            let base = Url::parse(base).map_err(|e| invalid(base, e))?;
            base.join(&input).map_err(|e| invalid(&input, e))?
        }
        None => Url::parse(&input).map_err(|e| invalid(&input, e))?,
    };

    if socket_upgrade {
        let scheme = match url.scheme() {
            "http" => Some("ws"),
            "https" => Some("wss"),
            _ => None,
        };
        if let Some(scheme) = scheme
            && url.set_scheme(scheme).is_err()
        {
            return Err(HttpClientError::InvalidUrl {
                input: url.to_string(),
                reason: format!("cannot rewrite scheme to {:?}", scheme),
            });
        }
    }

    if !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            match value {
                Value::Null => continue,
                Value::String(s) => {
                    pairs.append_pair(key, s);
                }
                other => {
                    pairs.append_pair(key, &other.to_string());
                }
            }
        }
    }

    Ok(url)
}

fn invalid(input: &str, e: url::ParseError) -> HttpClientError {
    HttpClientError::InvalidUrl {
        input: input.to_string(),
        reason: e.to_string(),
    }
}
