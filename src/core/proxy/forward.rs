//! Upstream forwarding.
//!
//! Issues exactly one outbound request per inbound request. Edge headers and
//! the proxy's own credentials are removed before anything leaves.

use crate::config::{Config, GatewayError, Result};
use crate::core::middleware::{decode_basic_password, strip_cookie};
use crate::core::proxy::headers::{strip_edge_headers, strip_hop_by_hop};
use crate::core::proxy::request::ParsedRequest;
use http::header::{ACCEPT_ENCODING, AUTHORIZATION, CONTENT_LENGTH, COOKIE, HOST};
use http::{HeaderMap, HeaderValue};
use reqwest::{Client, redirect};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Hop limit when following raw-content redirects.
const MAX_REDIRECTS: usize = 10;

/// Where a single request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    pub host: String,
    pub url: Url,
    pub follow_redirects: bool,
}

impl UpstreamTarget {
    /// Raw-content target. Redirects are followed.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::UpstreamUnavailable` if the URL cannot be built.
    pub fn raw(config: &Config, path: &str, search: &str) -> Result<Self> {
        Self::build(
            &config.raw_upstream_host,
            &config.raw_upstream_origin(),
            path,
            search,
            true,
        )
    }

    /// Main-site target. Redirects are handed back to the client.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::UpstreamUnavailable` if the URL cannot be built.
    pub fn main(config: &Config, path: &str, search: &str) -> Result<Self> {
        Self::build(
            &config.upstream_host,
            &config.upstream_origin(),
            path,
            search,
            false,
        )
    }

    fn build(
        host: &str,
        origin: &str,
        path: &str,
        search: &str,
        follow_redirects: bool,
    ) -> Result<Self> {
        let url = Url::parse(&format!("{origin}{path}{search}")).map_err(|e| {
            GatewayError::UpstreamUnavailable {
                host: host.to_string(),
                reason: format!("invalid upstream url: {e}"),
            }
        })?;
        Ok(Self {
            host: host.to_string(),
            url,
            follow_redirects,
        })
    }
}

/// Copies client headers for the upstream request.
///
/// `Host` is dropped; the client derives it from the URL of every hop.
/// Edge, hop-by-hop and length headers are dropped too, as is any
/// credential carrying the shared secret.
#[must_use]
pub fn upstream_headers(headers: &HeaderMap, config: &Config) -> HeaderMap {
    let mut out = headers.clone();
    strip_hop_by_hop(&mut out);
    strip_edge_headers(&mut out);
    out.remove(CONTENT_LENGTH);
    out.remove(ACCEPT_ENCODING);

    let cookies: Vec<HeaderValue> = out
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| strip_cookie(v, &config.auth_cookie_name))
        .filter_map(|v| HeaderValue::from_str(&v).ok())
        .collect();
    out.remove(COOKIE);
    for cookie in cookies {
        out.append(COOKIE, cookie);
    }

    let carries_secret = out
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(decode_basic_password)
        .is_some_and(|p| p == config.proxy_password);
    if carries_secret {
        out.remove(AUTHORIZATION);
    }

    out.remove(HOST);
    out
}

/// Outbound HTTP client pair.
pub struct UpstreamForwarder {
    following: Client,
    direct: Client,
    config: Arc<Config>,
}

impl UpstreamForwarder {
    /// Builds both clients with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if a client cannot be constructed.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let build = |policy: redirect::Policy| {
            Client::builder()
                .timeout(config.upstream_timeout())
                .redirect(policy)
                .build()
                .map_err(|e| GatewayError::Config(format!("upstream client: {e}")))
        };

        Ok(Self {
            following: build(redirect::Policy::limited(MAX_REDIRECTS))?,
            direct: build(redirect::Policy::none())?,
            config,
        })
    }

    /// Sends the request to `target` and returns the response head with an
    /// unread body.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::UpstreamUnavailable` on connect, timeout or
    /// protocol failure.
    pub async fn forward(
        &self,
        target: &UpstreamTarget,
        request: &ParsedRequest,
    ) -> Result<reqwest::Response> {
        let client = if target.follow_redirects {
            &self.following
        } else {
            &self.direct
        };

        let headers = upstream_headers(&request.headers, &self.config);
        let mut builder = client
            .request(request.method.clone(), target.url.clone())
            .headers(headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        debug!(method = %request.method, upstream = %target.url, "Forwarding request");

        builder.send().await.map_err(|e| {
            warn!(host = %target.host, error = %e, "Upstream request failed");
            GatewayError::UpstreamUnavailable {
                host: target.host.clone(),
                reason: e.to_string(),
            }
        })
    }
}
