//! Core system components.
//!
//! Contains the proxy pipeline, credential middleware, and request handling infrastructure.

pub mod middleware;
pub mod proxy;
