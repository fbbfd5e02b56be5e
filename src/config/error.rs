//! Error types and result aliases.
//!
//! Defines the core `GatewayError` enumeration and common `Result` type.

use http::StatusCode;
use thiserror::Error;

/// Gateway-specific errors.
///
/// Every variant ends up as a terminal response; none escapes the pipeline.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// No acceptable credential was presented.
    #[error("authentication required")]
    AuthFailure {
        /// Answer with a `WWW-Authenticate` challenge instead of the login page.
        challenge: bool,
    },

    /// Submitted login password did not match.
    #[error("invalid password")]
    LoginRejected,

    /// Path is on the block list.
    #[error("path {path} is blocked")]
    BlockedPath { path: String },

    /// Path lies outside every routed prefix.
    #[error("no route for {path}")]
    RouteNotFound { path: String },

    /// The upstream could not be reached or its body could not be read.
    #[error("upstream {host} unavailable: {reason}")]
    UpstreamUnavailable { host: String, reason: String },

    /// A textual body could not be decoded or rewritten.
    #[error("body processing failed: {0}")]
    BodyProcessing(String),
}

impl GatewayError {
    /// HTTP status reported to the client.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::AuthFailure { .. } => StatusCode::UNAUTHORIZED,
            Self::LoginRejected | Self::BlockedPath { .. } => StatusCode::FORBIDDEN,
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::BodyProcessing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result type alias for `GatewayError`.
pub type Result<T> = std::result::Result<T, GatewayError>;
