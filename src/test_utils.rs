//! Test utilities and shared configuration.
//!
//! This module provides common helpers for unit tests,
//! reducing duplication across the codebase.

#[cfg(any(test, feature = "testing"))]
use crate::config::{Config, FeatureFlags, RoutingMode};
#[cfg(any(test, feature = "testing"))]
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
#[cfg(any(test, feature = "testing"))]
use std::sync::Arc;

/// Creates a standard configuration for testing purposes.
///
/// This configuration has:
/// - Root routing mode
/// - Password `iloveyou`
/// - Token and Basic auth enabled, raw content gated
/// - Plain HTTP upstreams on `github.test` / `raw.github.test`
#[cfg(any(test, feature = "testing"))]
#[must_use]
pub fn create_test_config() -> Arc<Config> {
    Arc::new(Config {
        listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
        upstream_scheme: "http".to_string(),
        upstream_host: "github.test".to_string(),
        raw_upstream_host: "raw.github.test".to_string(),
        raw_proxy_prefix: "/raw-content".to_string(),
        routing_mode: RoutingMode::Root,
        main_proxy_prefix: "/gh".to_string(),
        proxy_password: "iloveyou".to_string(),
        auth_cookie_name: "__gh_proxy_auth".to_string(),
        auth_cookie_max_age: 604_800,
        auth_realm: "GitHub Proxy".to_string(),
        blocked_paths: ["/login", "/session", "/settings", "/new"]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        banner_html: "<div id=\"proxy-banner\">mirror</div>".to_string(),
        title_prefix: "[Proxy] ".to_string(),
        features: FeatureFlags {
            token_auth_enabled: true,
            basic_auth_enabled: true,
            raw_content_requires_auth: true,
        },
        public_scheme: "https".to_string(),
        upstream_timeout_secs: 5,
        log_format: "pretty".to_string(),
    })
}

/// Same as [`create_test_config`] with the prefixed routing variant enabled.
#[cfg(any(test, feature = "testing"))]
#[must_use]
pub fn create_prefixed_test_config() -> Arc<Config> {
    let mut config = (*create_test_config()).clone();
    config.routing_mode = RoutingMode::Prefixed;
    config.features.raw_content_requires_auth = false;
    Arc::new(config)
}
