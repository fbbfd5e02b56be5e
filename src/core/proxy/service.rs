//! Proxy service logic.
//!
//! Adapts the request pipeline to Pingora. Requests are answered entirely
//! inside `request_filter`; Pingora's own upstream phase is never entered.

use crate::config::{Config, Result as GatewayResult};
use crate::core::proxy::pipeline::Pipeline;
use crate::core::proxy::request::InboundRequest;
use crate::core::proxy::response::write_response;
use async_trait::async_trait;
use bytes::BytesMut;
use pingora::proxy::{ProxyHttp, Session};
use pingora::upstreams::peer::HttpPeer;
use pingora::{Error, ErrorType, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Context for a single request.
pub struct RequestCtx {
    pub started: Instant,
    pub status: Option<u16>,
}

/// Main proxy service implementing `ProxyHttp`.
pub struct GateProxy {
    pipeline: Pipeline,
}

impl GateProxy {
    /// Creates a new `GateProxy` service.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if the pipeline cannot be built.
    pub fn new(config: Arc<Config>) -> GatewayResult<Self> {
        Ok(Self {
            pipeline: Pipeline::new(config)?,
        })
    }

    async fn read_body(session: &mut Session) -> Result<bytes::Bytes> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = session.read_request_body().await? {
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer.freeze())
    }
}

#[async_trait]
impl ProxyHttp for GateProxy {
    type CTX = RequestCtx;

    fn new_ctx(&self) -> Self::CTX {
        RequestCtx {
            started: Instant::now(),
            status: None,
        }
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let header = session.req_header();
        let method = header.method.clone();
        let uri = header.uri.clone();
        let headers = header.headers.clone();

        let body = Self::read_body(session).await?;

        let response = self
            .pipeline
            .handle(InboundRequest {
                method,
                uri,
                headers,
                body,
            })
            .await;

        ctx.status = Some(response.status.as_u16());
        write_response(session, response).await?;
        Ok(true)
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        Err(Error::explain(
            ErrorType::InternalError,
            "requests are answered before upstream selection",
        ))
    }

    async fn logging(&self, session: &mut Session, e: Option<&Error>, ctx: &mut Self::CTX) {
        let status = session
            .response_written()
            .map(|r| r.status.as_u16())
            .or(ctx.status)
            .unwrap_or(0);
        let path = session.req_header().uri.path();
        let elapsed_ms = ctx.started.elapsed().as_millis();

        debug!(status = status, http_path = %path, elapsed_ms = elapsed_ms, "Request completed");

        if let Some(err) = e {
            warn!(status = status, http_path = %path, error = %err, "Request aborted");
        } else if status >= 400 {
            warn!(status = status, http_path = %path, "Request error");
        }
    }
}
