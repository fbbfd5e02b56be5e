//! Proxy service implementation.
//!
//! Handles request parsing, routing, upstream forwarding, response rewriting,
//! and the Pingora service that ties them together.

pub mod forward;
pub mod headers;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod rewrite;
pub mod router;
pub mod service;

pub use pipeline::Pipeline;
pub use service::GateProxy;
