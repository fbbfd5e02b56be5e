//! Authorization cookie handling.
//!
//! Formats the `Set-Cookie` value issued after a successful login and reads
//! or scrubs the proxy's cookie from a request `Cookie` header.

use http::HeaderMap;
use http::header::COOKIE;
use percent_encoding::percent_decode_str;

/// Builds the persistent authorization cookie.
#[must_use]
pub fn format_set_cookie(name: &str, value: &str, max_age: u64) -> String {
    format!("{name}={value}; Path=/; Max-Age={max_age}; Secure; HttpOnly; SameSite=Lax")
}

/// Returns the decoded value of cookie `name`, searching every `Cookie` header.
#[must_use]
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key.trim() == name).then(|| {
                percent_decode_str(value.trim())
                    .decode_utf8_lossy()
                    .into_owned()
            })
        })
}

/// Drops cookie `name` from a `Cookie` header value.
///
/// Returns `None` when nothing else is left.
#[must_use]
pub fn strip_cookie(header_value: &str, name: &str) -> Option<String> {
    let kept: Vec<&str> = header_value
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            pair.split_once('=')
                .map_or(pair.trim(), |(key, _)| key.trim())
                != name
        })
        .collect();

    if kept.is_empty() {
        None
    } else {
        Some(kept.join("; "))
    }
}
