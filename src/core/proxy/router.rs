//! Request routing.
//!
//! Classifies a normalized path into the raw-content route, a blocked
//! main-site path, or a pass-through main-site path.

use crate::config::{Config, GatewayError, Result, RoutingMode};
use percent_encoding::percent_decode_str;
use std::sync::Arc;

/// Sub-tree that is refused even when it is not listed.
const ALWAYS_BLOCKED_PREFIX: &str = "/settings/";

/// Where a request goes. Paths are upstream paths (prefixes stripped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    RawContentProxy(String),
    BlockedPath(String),
    MainSiteProxy(String),
}

/// Path router for the two upstreams.
#[derive(Clone)]
pub struct Router {
    config: Arc<Config>,
}

impl Router {
    #[must_use]
    pub const fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Whether `path` lives under the raw-content prefix.
    #[must_use]
    pub fn is_raw_content(&self, path: &str) -> bool {
        path.strip_prefix(self.config.raw_proxy_prefix.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Classifies `path`.
    ///
    /// Raw-content routing is checked first and wins over every main-site rule.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::RouteNotFound` in prefixed mode when the path is
    /// outside the main-site prefix.
    pub fn route(&self, path: &str) -> Result<RouteDecision> {
        if self.is_raw_content(path) {
            let rest = &path[self.config.raw_proxy_prefix.len()..];
            return Ok(RouteDecision::RawContentProxy(rest.to_string()));
        }

        let upstream_path = match self.config.routing_mode {
            RoutingMode::Root => path.to_string(),
            RoutingMode::Prefixed => self.strip_main_prefix(path).ok_or_else(|| {
                GatewayError::RouteNotFound {
                    path: path.to_string(),
                }
            })?,
        };

        if self.is_blocked(&upstream_path) {
            return Ok(RouteDecision::BlockedPath(upstream_path));
        }

        Ok(RouteDecision::MainSiteProxy(upstream_path))
    }

    /// Block rule: exact match or sub-path of a listed entry, plus `/settings/`.
    ///
    /// Checked against both the path as sent and its percent-decoded form.
    #[must_use]
    pub fn is_blocked(&self, path: &str) -> bool {
        let decoded = percent_decode_str(path).decode_utf8_lossy();
        self.matches_block_list(path) || self.matches_block_list(&decoded)
    }

    fn matches_block_list(&self, path: &str) -> bool {
        self.config.blocked_paths.iter().any(|blocked| {
            path == blocked
                || path
                    .strip_prefix(blocked.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        }) || path.starts_with(ALWAYS_BLOCKED_PREFIX)
    }

    fn strip_main_prefix(&self, path: &str) -> Option<String> {
        let rest = path.strip_prefix(self.config.main_proxy_prefix.as_str())?;
        if rest.is_empty() {
            Some("/".to_string())
        } else if rest.starts_with('/') {
            Some(rest.to_string())
        } else {
            None
        }
    }
}
