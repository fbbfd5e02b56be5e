//! Header manipulation.
//!
//! Edge-header stripping for upstream requests, plus the CORS and CSP
//! handling applied to every proxied response.

use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, HeaderName, HeaderValue,
};
use http::{HeaderMap, Method};

/// Headers added by CDNs and load balancers in front of the proxy.
pub const EDGE_HEADERS: &[&str] = &[
    "cf-connecting-ip",
    "cf-ipcountry",
    "cf-ray",
    "cf-visitor",
    "x-forwarded-for",
    "x-forwarded-proto",
    "x-forwarded-host",
    "x-real-ip",
    "true-client-ip",
    "cdn-loop",
];

/// Connection-scoped headers that never cross the proxy.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const CORS_ALLOW_METHODS: &str = "GET,HEAD,POST,PUT,DELETE,OPTIONS";
const PREFLIGHT_ALLOW: &str = "GET, HEAD, POST, OPTIONS";
const PREFLIGHT_MAX_AGE: &str = "86400";

pub fn strip_edge_headers(headers: &mut HeaderMap) {
    for name in EDGE_HEADERS {
        headers.remove(*name);
    }
}

/// Removes hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(http::header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

pub fn strip_content_security_policy(headers: &mut HeaderMap) {
    headers.remove(http::header::CONTENT_SECURITY_POLICY);
    headers.remove(http::header::CONTENT_SECURITY_POLICY_REPORT_ONLY);
}

/// Sets the permissive CORS headers for the proxy's own origin.
pub fn apply_cors_headers(headers: &mut HeaderMap, origin: &str) {
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(CORS_ALLOW_METHODS),
    );
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
}

/// Whether an `OPTIONS` request is a full CORS preflight.
#[must_use]
pub fn is_cors_preflight(method: &Method, headers: &HeaderMap) -> bool {
    method == Method::OPTIONS
        && headers.contains_key(http::header::ORIGIN)
        && headers.contains_key(http::header::ACCESS_CONTROL_REQUEST_METHOD)
        && headers.contains_key(http::header::ACCESS_CONTROL_REQUEST_HEADERS)
}

/// Headers for a 204 preflight answer. Requested headers are echoed back.
#[must_use]
pub fn preflight_headers(origin: &str, request_headers: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(CORS_ALLOW_METHODS),
    );
    let allowed = request_headers
        .get(http::header::ACCESS_CONTROL_REQUEST_HEADERS)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, allowed);
    headers.insert(
        http::header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(PREFLIGHT_MAX_AGE),
    );
    headers
}

/// Headers for a bare `OPTIONS` answer that is not a preflight.
#[must_use]
pub fn options_allow_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(http::header::ALLOW, HeaderValue::from_static(PREFLIGHT_ALLOW));
    headers
}
