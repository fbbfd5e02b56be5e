//! Inbound request model.
//!
//! Resolves the raw request line against the proxy's own origin and applies
//! the token fix-up for clients that glue path segments onto `?token=`.

use crate::config::{Config, GatewayError, Result};
use crate::core::middleware::TOKEN_PARAM;
use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use url::Url;

/// Request as received from the client, body fully read.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Request resolved to an absolute URL on the proxy's own origin.
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub method: Method,
    pub url: Url,
    pub origin: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ParsedRequest {
    /// Builds the absolute request URL and applies the token fix-up.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if neither the `Host` header nor the
    /// listen address yields a usable origin.
    pub fn parse(inbound: InboundRequest, config: &Config) -> Result<Self> {
        let mut url = base_url(&inbound, config)?;
        url.set_path(inbound.uri.path());
        url.set_query(inbound.uri.query());

        if let Some(token) = query_param(&url, TOKEN_PARAM)
            && let Some(split) = token.find('/')
        {
            let (real_token, extra_path) = token.split_at(split);
            set_query_param(&mut url, TOKEN_PARAM, Some(real_token));
            let path = format!("{}{}", url.path(), extra_path);
            url.set_path(&path);
        }

        let origin = url.origin().ascii_serialization();

        Ok(Self {
            method: inbound.method,
            url,
            origin,
            headers: inbound.headers,
            body: inbound.body,
        })
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        query_param(&self.url, TOKEN_PARAM)
    }

    /// Query string including the leading `?`, or empty.
    #[must_use]
    pub fn search(&self) -> String {
        self.url
            .query()
            .filter(|q| !q.is_empty())
            .map(|q| format!("?{q}"))
            .unwrap_or_default()
    }

    /// Removes the `token` parameter so the secret never travels upstream.
    pub fn strip_token(&mut self) {
        set_query_param(&mut self.url, TOKEN_PARAM, None);
    }
}

fn base_url(inbound: &InboundRequest, config: &Config) -> Result<Url> {
    let scheme = inbound
        .headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| *v == "http" || *v == "https")
        .unwrap_or(&config.public_scheme);

    let host = inbound
        .headers
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| inbound.uri.authority().map(ToString::to_string));

    if let Some(host) = host
        && let Ok(url) = Url::parse(&format!("{scheme}://{host}/"))
    {
        return Ok(url);
    }

    Url::parse(&format!("{scheme}://{}/", config.listen_addr))
        .map_err(|e| GatewayError::Config(format!("cannot derive proxy origin: {e}")))
}

/// First value of query parameter `name`.
#[must_use]
pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Sets (`Some`) or removes (`None`) query parameter `name`.
///
/// Setting replaces the first occurrence and drops any later duplicates.
pub fn set_query_param(url: &mut Url, name: &str, value: Option<&str>) {
    let mut seen = false;
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .into_owned()
        .filter_map(|(k, v)| {
            if k != name {
                return Some((k, v));
            }
            match value {
                Some(new_value) if !seen => {
                    seen = true;
                    Some((k, new_value.to_string()))
                }
                _ => None,
            }
        })
        .collect();

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
}
