//! Web presentation layer.
//!
//! Pages served by the proxy itself rather than proxied from upstream.

pub mod ui;
