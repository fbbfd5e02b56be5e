//! Configuration settings.
//!
//! Defines the main `Config` struct and environment variable loading logic.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Password used when `PROXY_PASSWORD` is not set.
pub const DEFAULT_PROXY_PASSWORD: &str = "iloveyou";

/// Path that accepts the login form submission.
pub const LOGIN_PATH: &str = "/login-proxy";

const DEFAULT_BLOCKED_PATHS: &str =
    "/login,/session,/sessions,/join,/signup,/password_reset,/settings,/account,/new";

const DEFAULT_BANNER_HTML: &str = r#"
<div style="background-color: #fffbe6; color: #333; padding: 12px 20px; border-bottom: 1px solid #f5e79e; text-align: center; font-size: 14px; font-family: sans-serif; z-index: 99999; line-height: 1.5;">
  <strong>Note:</strong> Unofficial mirror for testing and acceleration. Do NOT sign in or submit sensitive data.
</div>
"#;

/// How main-site paths map onto the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMode {
    /// The proxy root maps directly onto the upstream root.
    Root,
    /// Main-site traffic lives under `main_proxy_prefix`; anything else is a 404.
    Prefixed,
}

impl RoutingMode {
    fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "PREFIXED" => Self::Prefixed,
            _ => Self::Root,
        }
    }
}

/// Feature toggles for the credential mechanisms and raw-content gating.
#[derive(Debug, Clone, Copy)]
#[allow(clippy::struct_excessive_bools)]
pub struct FeatureFlags {
    /// Accept the shared secret as a `token` query parameter.
    pub token_auth_enabled: bool,
    /// Accept the shared secret as an HTTP Basic password.
    pub basic_auth_enabled: bool,
    /// Require authentication for the raw-content route.
    pub raw_content_requires_auth: bool,
}

fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_env_bool_or(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(default)
}

fn get_env_u64_or(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn parse_path_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(normalize_prefix)
        .collect()
}

/// Ensures a leading slash and drops any trailing slash.
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the Pingora service listens on.
    pub listen_addr: SocketAddr,
    /// Scheme used to reach both upstreams ("https" in production).
    pub upstream_scheme: String,
    /// Main upstream host, including a port when non-default.
    pub upstream_host: String,
    /// Raw-content upstream host.
    pub raw_upstream_host: String,
    /// Path prefix under which the raw-content upstream is exposed.
    pub raw_proxy_prefix: String,
    /// Main-site routing mode.
    pub routing_mode: RoutingMode,
    /// Main-site prefix, only used in `RoutingMode::Prefixed`.
    pub main_proxy_prefix: String,
    /// Shared secret accepted as cookie value, token, and Basic password.
    pub proxy_password: String,
    /// Name of the authorization cookie.
    pub auth_cookie_name: String,
    /// Authorization cookie lifetime in seconds.
    pub auth_cookie_max_age: u64,
    /// Realm announced in `WWW-Authenticate` challenges.
    pub auth_realm: String,
    /// Main-site paths that are always refused.
    pub blocked_paths: Vec<String>,
    /// HTML fragment inserted after the opening body tag.
    pub banner_html: String,
    /// Text inserted at the start of the page title.
    pub title_prefix: String,
    /// Feature flags for optional functionality.
    pub features: FeatureFlags,
    /// Scheme of the proxy's own origin when `X-Forwarded-Proto` is absent.
    pub public_scheme: String,
    /// Timeout for a single upstream exchange in seconds.
    pub upstream_timeout_secs: u64,
    /// Logging format: "json" or "pretty".
    pub log_format: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Panics
    ///
    /// Panics if `LISTEN_ADDR` is set but is not a valid socket address.
    #[must_use]
    pub fn from_env() -> Arc<Self> {
        let listen_addr = get_env_or("LISTEN_ADDR", "0.0.0.0:8080")
            .parse()
            .expect("LISTEN_ADDR must be a valid socket address");

        let proxy_password = env::var("PROXY_PASSWORD")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                warn!("PROXY_PASSWORD not set, falling back to the built-in default");
                DEFAULT_PROXY_PASSWORD.to_string()
            });

        let features = FeatureFlags {
            token_auth_enabled: get_env_bool_or("TOKEN_AUTH_ENABLED", true),
            basic_auth_enabled: get_env_bool_or("BASIC_AUTH_ENABLED", true),
            raw_content_requires_auth: get_env_bool_or("RAW_CONTENT_REQUIRES_AUTH", true),
        };

        Arc::new(Self {
            listen_addr,
            upstream_scheme: get_env_or("UPSTREAM_SCHEME", "https").to_lowercase(),
            upstream_host: get_env_or("UPSTREAM_HOST", "github.com"),
            raw_upstream_host: get_env_or("RAW_UPSTREAM_HOST", "raw.githubusercontent.com"),
            raw_proxy_prefix: normalize_prefix(&get_env_or("RAW_PROXY_PREFIX", "/raw-content")),
            routing_mode: RoutingMode::from_str(&get_env_or("ROUTING_MODE", "root")),
            main_proxy_prefix: normalize_prefix(&get_env_or("MAIN_PROXY_PREFIX", "/gh")),
            proxy_password,
            auth_cookie_name: get_env_or("AUTH_COOKIE_NAME", "__gh_proxy_auth"),
            auth_cookie_max_age: get_env_u64_or("AUTH_COOKIE_MAX_AGE", 60 * 60 * 24 * 7),
            auth_realm: get_env_or("AUTH_REALM", "GitHub Proxy"),
            blocked_paths: parse_path_list(&get_env_or("BLOCKED_PATHS", DEFAULT_BLOCKED_PATHS)),
            banner_html: get_env_or("BANNER_HTML", DEFAULT_BANNER_HTML),
            title_prefix: get_env_or("TITLE_PREFIX", "[Proxy] "),
            features,
            public_scheme: get_env_or("PUBLIC_SCHEME", "https").to_lowercase(),
            upstream_timeout_secs: get_env_u64_or("UPSTREAM_TIMEOUT_SECS", 30),
            log_format: get_env_or("LOG_FORMAT", "json"),
        })
    }

    /// Origin of the main upstream, e.g. `https://github.com`.
    #[must_use]
    pub fn upstream_origin(&self) -> String {
        format!("{}://{}", self.upstream_scheme, self.upstream_host)
    }

    /// Origin of the raw-content upstream.
    #[must_use]
    pub fn raw_upstream_origin(&self) -> String {
        format!("{}://{}", self.upstream_scheme, self.raw_upstream_host)
    }

    /// Path prepended to every main-site URL handed back to clients.
    #[must_use]
    pub fn main_path_base(&self) -> &str {
        match self.routing_mode {
            RoutingMode::Root => "",
            RoutingMode::Prefixed => &self.main_proxy_prefix,
        }
    }

    /// Where a successful login lands.
    #[must_use]
    pub fn landing_path(&self) -> String {
        format!("{}/", self.main_path_base())
    }

    #[must_use]
    pub const fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}
