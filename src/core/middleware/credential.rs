//! Credential resolution.
//!
//! Decides whether a request carries the shared secret, and through which
//! mechanism. Precedence is cookie, then URL token (with the client-type
//! check), then HTTP Basic.

use crate::config::Config;
use crate::core::middleware::session::read_cookie;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use http::HeaderMap;
use http::header::{AUTHORIZATION, USER_AGENT};
use percent_encoding::percent_decode_str;
use std::sync::Arc;

/// Query parameter carrying the shared secret.
pub const TOKEN_PARAM: &str = "token";

/// Mechanism that produced an authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMechanism {
    Cookie,
    Token,
    Basic,
    None,
}

/// Outcome of credential resolution for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// Request may proceed.
    Authorized(AuthMechanism),
    /// Browser presented a valid token: answer with a cookie and a clean URL.
    TokenRedirect,
    /// No acceptable credential.
    Unauthorized,
}

impl AuthDecision {
    #[must_use]
    pub const fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized(_))
    }

    #[must_use]
    pub const fn mechanism(&self) -> AuthMechanism {
        match self {
            Self::Authorized(mechanism) => *mechanism,
            Self::TokenRedirect | Self::Unauthorized => AuthMechanism::None,
        }
    }
}

/// Heuristic for command-line version-control clients.
#[must_use]
pub fn is_vcs_client(user_agent: &str, path: &str) -> bool {
    user_agent.starts_with("git/")
        || path.ends_with(".git")
        || path.contains("/info/refs")
        || path.contains("/git-upload-pack")
}

/// Extracts the password half of an `Authorization: Basic` header value.
#[must_use]
pub fn decode_basic_password(header_value: &str) -> Option<String> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (_, password) = decoded.split_once(':')?;
    Some(password.to_string())
}

/// Reads a single field from an `application/x-www-form-urlencoded` body.
#[must_use]
pub fn parse_form_field(body: &[u8], field: &str) -> Option<String> {
    let body_str = String::from_utf8_lossy(body);
    body_str.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        let key = percent_decode_str(&k.replace('+', " "))
            .decode_utf8_lossy()
            .into_owned();
        (key == field).then(|| {
            percent_decode_str(&v.replace('+', " "))
                .decode_utf8_lossy()
                .into_owned()
        })
    })
}

/// Resolves credentials against the configured shared secret.
#[derive(Clone)]
pub struct CredentialResolver {
    config: Arc<Config>,
}

impl CredentialResolver {
    #[must_use]
    pub const fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Decides how a request is authorized.
    ///
    /// `path` and `token` are taken after the token fix-up has run.
    #[must_use]
    pub fn resolve(&self, headers: &HeaderMap, path: &str, token: Option<&str>) -> AuthDecision {
        if self.cookie_matches(headers) {
            return AuthDecision::Authorized(AuthMechanism::Cookie);
        }

        if self.token_matches(token) {
            let user_agent = headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");
            if is_vcs_client(user_agent, path) {
                return AuthDecision::Authorized(AuthMechanism::Token);
            }
            if self.basic_matches(headers) {
                return AuthDecision::Authorized(AuthMechanism::Basic);
            }
            return AuthDecision::TokenRedirect;
        }

        if self.basic_matches(headers) {
            return AuthDecision::Authorized(AuthMechanism::Basic);
        }

        AuthDecision::Unauthorized
    }

    /// Whether an unauthorized request should get a Basic challenge rather
    /// than the login page.
    #[must_use]
    pub fn wants_challenge(&self, headers: &HeaderMap, path: &str) -> bool {
        let user_agent = headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        self.config.features.basic_auth_enabled
            && (is_vcs_client(user_agent, path) || headers.contains_key(AUTHORIZATION))
    }

    /// Checks a submitted login form.
    #[must_use]
    pub fn verify_login_form(&self, body: &[u8]) -> bool {
        parse_form_field(body, "password").is_some_and(|p| self.password_matches(&p))
    }

    /// Whether a token value equals the secret.
    #[must_use]
    pub fn token_matches(&self, token: Option<&str>) -> bool {
        self.config.features.token_auth_enabled && token.is_some_and(|t| self.password_matches(t))
    }

    /// Whether a token value equals the secret, regardless of whether token
    /// auth is enabled. Such a token is never forwarded upstream.
    #[must_use]
    pub fn is_secret(&self, token: Option<&str>) -> bool {
        token.is_some_and(|t| self.password_matches(t))
    }

    /// Whether the request carries a Basic credential with the secret as password.
    #[must_use]
    pub fn basic_matches(&self, headers: &HeaderMap) -> bool {
        self.config.features.basic_auth_enabled
            && headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(decode_basic_password)
                .is_some_and(|p| self.password_matches(&p))
    }

    fn cookie_matches(&self, headers: &HeaderMap) -> bool {
        read_cookie(headers, &self.config.auth_cookie_name)
            .is_some_and(|value| self.password_matches(&value))
    }

    fn password_matches(&self, candidate: &str) -> bool {
        let expected = self.config.proxy_password.as_bytes();
        let candidate = candidate.as_bytes();
        expected.len() == candidate.len()
            && expected
                .iter()
                .zip(candidate)
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}
