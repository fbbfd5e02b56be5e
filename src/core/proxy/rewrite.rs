//! Response rewriting.
//!
//! Origin substitution for textual bodies, title prefix and banner injection
//! for HTML, and `Location` rewriting for redirects. All transforms are
//! pattern based and best-effort.

use crate::config::{Config, GatewayError, Result, RoutingMode};
use regex::{Captures, Regex};
use std::borrow::Cow;
use url::Url;

/// Body class derived from the upstream `Content-Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Script,
    Other,
}

impl ContentKind {
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Self {
        let lower = content_type.to_ascii_lowercase();
        if lower.contains("text/html") {
            Self::Html
        } else if lower.contains("javascript") {
            Self::Script
        } else {
            Self::Other
        }
    }

    /// Textual bodies are buffered and rewritten; everything else streams.
    #[must_use]
    pub const fn is_textual(self) -> bool {
        matches!(self, Self::Html | Self::Script)
    }
}

/// Proxy-side bases that replace the upstream origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteTargets {
    /// Proxy origin plus the main prefix in prefixed mode.
    pub main_base: String,
    /// Proxy origin plus the raw-content prefix.
    pub raw_base: String,
}

impl RewriteTargets {
    #[must_use]
    pub fn new(origin: &str, config: &Config) -> Self {
        Self {
            main_base: format!("{origin}{}", config.main_path_base()),
            raw_base: format!("{origin}{}", config.raw_proxy_prefix),
        }
    }
}

/// Text transform applied to buffered textual bodies.
pub trait BodyRewriter: Send + Sync {
    /// Returns the rewritten text, or `None` when nothing matched.
    fn rewrite(&self, text: &str, kind: ContentKind, targets: &RewriteTargets) -> Option<String>;
}

/// Regex-driven implementation of [`BodyRewriter`].
pub struct PatternRewriter {
    main_origin: Regex,
    raw_origin: Regex,
    root_relative: Option<Regex>,
    main_prefix: String,
    title: Regex,
    body_open: Regex,
    head_close: Regex,
    title_prefix: String,
    banner_html: String,
}

fn origin_pattern(scheme: &str, host: &str) -> Result<Regex> {
    let pattern = format!(
        r"{}:(//|\\/\\/){}",
        regex::escape(scheme),
        regex::escape(host)
    );
    Regex::new(&pattern).map_err(|e| GatewayError::Config(format!("origin pattern: {e}")))
}

fn static_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| GatewayError::Config(format!("rewrite pattern: {e}")))
}

/// Replaces every origin match, keeping the JSON-escaped `:\/\/` form.
fn substitute_origin<'t>(text: &'t str, pattern: &Regex, target: &str) -> Cow<'t, str> {
    pattern.replace_all(text, |caps: &Captures| {
        if &caps[1] == "//" {
            target.to_string()
        } else {
            target.replacen("://", r":\/\/", 1)
        }
    })
}

impl PatternRewriter {
    /// Compiles the rewrite patterns for the configured upstreams.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if a pattern fails to compile.
    pub fn new(config: &Config) -> Result<Self> {
        let root_relative = match config.routing_mode {
            RoutingMode::Root => None,
            RoutingMode::Prefixed => Some(static_pattern(
                r#"(?i)(\s(?:href|src|action|data-url)=["'])/([^/])"#,
            )?),
        };

        Ok(Self {
            main_origin: origin_pattern(&config.upstream_scheme, &config.upstream_host)?,
            raw_origin: origin_pattern(&config.upstream_scheme, &config.raw_upstream_host)?,
            root_relative,
            main_prefix: config.main_proxy_prefix.clone(),
            title: static_pattern(r"(?is)<title>(.*?)</title>")?,
            body_open: static_pattern(r"(?i)<body[^>]*>")?,
            head_close: static_pattern(r"(?i)</head>")?,
            title_prefix: config.title_prefix.clone(),
            banner_html: config.banner_html.clone(),
        })
    }

    fn prefix_title(&self, text: &mut String) -> bool {
        let Some(start) = self
            .title
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|inner| inner.start())
        else {
            return false;
        };
        text.insert_str(start, &self.title_prefix);
        true
    }

    fn inject_banner(&self, text: &mut String) -> bool {
        let anchor = self
            .body_open
            .find(text)
            .or_else(|| self.head_close.find(text))
            .map(|m| m.end());
        let Some(at) = anchor else {
            return false;
        };
        text.insert_str(at, &self.banner_html);
        true
    }
}

impl BodyRewriter for PatternRewriter {
    fn rewrite(&self, text: &str, kind: ContentKind, targets: &RewriteTargets) -> Option<String> {
        let mut changed = false;

        let step = substitute_origin(text, &self.main_origin, &targets.main_base);
        changed |= matches!(step, Cow::Owned(_));
        let mut out = step.into_owned();

        let step = substitute_origin(&out, &self.raw_origin, &targets.raw_base);
        if let Cow::Owned(next) = step {
            out = next;
            changed = true;
        }

        if let Some(root_relative) = &self.root_relative {
            let prefix = &self.main_prefix;
            let step = root_relative.replace_all(&out, |caps: &Captures| {
                format!("{}{prefix}/{}", &caps[1], &caps[2])
            });
            if let Cow::Owned(next) = step {
                out = next;
                changed = true;
            }
        }

        if kind == ContentKind::Html {
            changed |= self.prefix_title(&mut out);
            changed |= self.inject_banner(&mut out);
        }

        changed.then_some(out)
    }
}

/// Rewrites a redirect target so the client stays on the proxy.
///
/// Returns `None` when the location cannot be resolved; callers keep the
/// original header in that case.
#[must_use]
pub fn rewrite_location(
    location: &str,
    upstream_url: &Url,
    config: &Config,
    targets: &RewriteTargets,
) -> Option<String> {
    let absolute = upstream_url.join(location).ok()?;
    Some(
        absolute
            .as_str()
            .replace(&config.upstream_origin(), &targets.main_base)
            .replace(&config.raw_upstream_origin(), &targets.raw_base),
    )
}
