//! Library definitions.
//!
//! Exports core modules, types, and the main proxy service implementation.

pub mod config;
pub mod core;
pub mod web;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;
pub use config::{Config, FeatureFlags, GatewayError, Result, RoutingMode};
pub use core::middleware::{AuthDecision, AuthMechanism, CredentialResolver, format_set_cookie};
pub use core::proxy::request::InboundRequest;
pub use core::proxy::response::{ProxyResponse, ResponseBody};
pub use core::proxy::rewrite::{BodyRewriter, ContentKind, PatternRewriter, RewriteTargets};
pub use core::proxy::router::{RouteDecision, Router};
pub use core::proxy::{GateProxy, Pipeline};
pub use web::ui::preload_templates;
