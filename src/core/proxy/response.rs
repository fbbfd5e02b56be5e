//! HTTP response utilities.
//!
//! The pipeline produces a `ProxyResponse`; this module builds the terminal
//! responses for each error and writes the final response to the session.

use crate::config::{Config, GatewayError};
use crate::web::ui;
use bytes::Bytes;
use http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, LOCATION, WWW_AUTHENTICATE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use pingora::http::ResponseHeader;
use pingora::proxy::Session;
use pingora::{Error, ErrorType, Result};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";
const NO_STORE: &str = "no-store, no-cache, must-revalidate, max-age=0";

/// Response body as produced by the pipeline.
#[derive(Debug)]
pub enum ResponseBody {
    Empty,
    /// Fully buffered bytes; `Content-Length` is set from their length.
    Full(Bytes),
    /// Upstream body relayed chunk by chunk without buffering.
    Stream(reqwest::Response),
}

impl ResponseBody {
    /// Reads the whole body into memory.
    ///
    /// # Errors
    ///
    /// Returns the upstream read error for streamed bodies.
    pub async fn collect(self) -> std::result::Result<Bytes, reqwest::Error> {
        match self {
            Self::Empty => Ok(Bytes::new()),
            Self::Full(bytes) => Ok(bytes),
            Self::Stream(upstream) => upstream.bytes().await,
        }
    }
}

/// Terminal response for one request.
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl ProxyResponse {
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ResponseBody::Empty,
        }
    }

    /// Plain-text response.
    #[must_use]
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN))
            .with_body(Bytes::from(body.into()))
    }

    /// Uncacheable HTML page.
    #[must_use]
    pub fn html(status: StatusCode, html: String) -> Self {
        Self::new(status)
            .with_header(CONTENT_TYPE, HeaderValue::from_static(TEXT_HTML))
            .with_header(CACHE_CONTROL, HeaderValue::from_static(NO_STORE))
            .with_body(Bytes::from(html))
    }

    /// `302 Found` pointing at `location`.
    #[must_use]
    pub fn redirect(location: &str) -> Self {
        let response = Self::new(StatusCode::FOUND);
        match HeaderValue::from_str(location) {
            Ok(value) => response.with_header(LOCATION, value),
            Err(_) => response,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = ResponseBody::Full(body);
        self
    }

    /// Adds a `Set-Cookie` header when the value is representable.
    #[must_use]
    pub fn with_cookie(mut self, cookie: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(cookie) {
            self.headers.append(http::header::SET_COOKIE, value);
        }
        self
    }
}

/// Maps a pipeline error to the response the client sees.
///
/// Upstream and body failures get generic messages; details stay in the logs.
#[must_use]
pub fn error_response(error: &GatewayError, config: &Config) -> ProxyResponse {
    let status = error.status();
    match error {
        GatewayError::AuthFailure { challenge: true } => {
            let realm = format!("Basic realm=\"{}\"", config.auth_realm);
            let response = ProxyResponse::text(status, "Unauthorized");
            match HeaderValue::from_str(&realm) {
                Ok(value) => response.with_header(WWW_AUTHENTICATE, value),
                Err(_) => response,
            }
        }
        GatewayError::AuthFailure { challenge: false } => {
            ProxyResponse::html(status, ui::get_login_page(config))
        }
        GatewayError::LoginRejected => ProxyResponse::text(status, "Invalid Password"),
        GatewayError::BlockedPath { path } => {
            ProxyResponse::text(status, format!("Path {path} is blocked."))
        }
        GatewayError::RouteNotFound { .. } => ProxyResponse::text(status, "Not Found"),
        GatewayError::UpstreamUnavailable { host, .. } => {
            let message = if *host == config.raw_upstream_host {
                "Raw fetch failed"
            } else {
                "Upstream fetch failed"
            };
            ProxyResponse::text(status, message)
        }
        GatewayError::Config(_) | GatewayError::BodyProcessing(_) => {
            ProxyResponse::text(status, "Internal Server Error")
        }
    }
}

pub(crate) fn allows_body(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

/// Writes `response` to the downstream session.
///
/// # Errors
///
/// Returns an error if the header cannot be built, the session write fails,
/// or the upstream body breaks mid-stream.
pub async fn write_response(session: &mut Session, response: ProxyResponse) -> Result<()> {
    let mut header = ResponseHeader::build(response.status.as_u16(), None)?;
    for (name, value) in &response.headers {
        header.append_header(name.clone(), value.clone())?;
    }

    match response.body {
        ResponseBody::Empty => {
            if allows_body(response.status) && !response.headers.contains_key(CONTENT_LENGTH) {
                header.insert_header(CONTENT_LENGTH, "0")?;
            }
            session
                .write_response_header(Box::new(header), true)
                .await?;
        }
        ResponseBody::Full(bytes) => {
            header.insert_header(CONTENT_LENGTH, bytes.len().to_string())?;
            session
                .write_response_header(Box::new(header), false)
                .await?;
            session.write_response_body(Some(bytes), true).await?;
        }
        ResponseBody::Stream(mut upstream) => {
            session
                .write_response_header(Box::new(header), false)
                .await?;
            loop {
                match upstream.chunk().await {
                    Ok(Some(chunk)) => session.write_response_body(Some(chunk), false).await?,
                    Ok(None) => break,
                    Err(e) => {
                        return Err(Error::because(
                            ErrorType::ReadError,
                            "upstream body interrupted",
                            e,
                        ));
                    }
                }
            }
            session.write_response_body(None, true).await?;
        }
    }
    Ok(())
}
