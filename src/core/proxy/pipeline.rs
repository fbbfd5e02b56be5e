//! Request pipeline.
//!
//! Runs one request through preflight handling, credential resolution,
//! routing, forwarding and response rewriting. Every outcome, including
//! every error, ends as a `ProxyResponse`.

use crate::config::{Config, GatewayError, LOGIN_PATH, Result};
use crate::core::middleware::{AuthDecision, CredentialResolver, format_set_cookie};
use crate::core::proxy::forward::{UpstreamForwarder, UpstreamTarget};
use crate::core::proxy::headers::{
    apply_cors_headers, is_cors_preflight, options_allow_headers, preflight_headers,
    strip_content_security_policy, strip_hop_by_hop,
};
use crate::core::proxy::request::{InboundRequest, ParsedRequest};
use crate::core::proxy::response::{ProxyResponse, ResponseBody, allows_body, error_response};
use crate::core::proxy::rewrite::{
    BodyRewriter, ContentKind, PatternRewriter, RewriteTargets, rewrite_location,
};
use crate::core::proxy::router::{RouteDecision, Router};
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Request handler shared by every connection.
pub struct Pipeline {
    config: Arc<Config>,
    resolver: CredentialResolver,
    router: Router,
    forwarder: UpstreamForwarder,
    rewriter: Arc<dyn BodyRewriter>,
}

impl Pipeline {
    /// Builds the pipeline with the pattern-based body rewriter.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if a rewrite pattern or HTTP client
    /// cannot be built.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let rewriter = Arc::new(PatternRewriter::new(&config)?);
        Self::with_rewriter(config, rewriter)
    }

    /// Builds the pipeline around a caller-supplied body rewriter.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if an HTTP client cannot be built.
    pub fn with_rewriter(config: Arc<Config>, rewriter: Arc<dyn BodyRewriter>) -> Result<Self> {
        Ok(Self {
            resolver: CredentialResolver::new(config.clone()),
            router: Router::new(config.clone()),
            forwarder: UpstreamForwarder::new(config.clone())?,
            rewriter,
            config,
        })
    }

    /// Handles one request end to end.
    pub async fn handle(&self, inbound: InboundRequest) -> ProxyResponse {
        let outcome = match ParsedRequest::parse(inbound, &self.config) {
            Ok(request) => self.process(request).await,
            Err(e) => Err(e),
        };
        outcome.unwrap_or_else(|e| self.fail(&e))
    }

    fn fail(&self, err: &GatewayError) -> ProxyResponse {
        match err {
            GatewayError::UpstreamUnavailable { host, reason } => {
                warn!(upstream = %host, reason = %reason, "Upstream unavailable");
            }
            GatewayError::BodyProcessing(reason) => {
                error!(reason = %reason, "Response body processing failed");
            }
            GatewayError::Config(reason) => {
                error!(reason = %reason, "Request could not be handled");
            }
            _ => debug!(error = %err, "Request rejected"),
        }
        error_response(err, &self.config)
    }

    async fn process(&self, mut request: ParsedRequest) -> Result<ProxyResponse> {
        if request.method == Method::OPTIONS {
            return Ok(Self::options(&request));
        }

        let path = request.path().to_string();
        let token = request.token();

        if self.resolver.is_secret(token.as_deref()) {
            request.strip_token();
        }

        if !self.config.features.raw_content_requires_auth && self.router.is_raw_content(&path) {
            return self.proxy(request).await;
        }

        let decision = self
            .resolver
            .resolve(&request.headers, &path, token.as_deref());

        if decision == AuthDecision::TokenRedirect {
            info!(path = %path, "Token accepted, issuing cookie");
            return Ok(ProxyResponse::redirect(request.url.as_str()).with_cookie(&self.auth_cookie()));
        }

        if path == LOGIN_PATH && request.method == Method::POST {
            return self.login(&request);
        }

        if !decision.is_authorized() {
            let challenge = self.resolver.wants_challenge(&request.headers, &path);
            return Err(GatewayError::AuthFailure { challenge });
        }

        debug!(mechanism = ?decision.mechanism(), path = %path, "Request authorized");
        self.proxy(request).await
    }

    fn options(request: &ParsedRequest) -> ProxyResponse {
        if is_cors_preflight(&request.method, &request.headers) {
            let mut response = ProxyResponse::new(StatusCode::NO_CONTENT);
            response.headers = preflight_headers(&request.origin, &request.headers);
            response
        } else {
            let mut response = ProxyResponse::new(StatusCode::OK);
            response.headers = options_allow_headers();
            response
        }
    }

    fn login(&self, request: &ParsedRequest) -> Result<ProxyResponse> {
        if self.resolver.verify_login_form(&request.body) {
            info!("Login accepted");
            Ok(ProxyResponse::redirect(&self.config.landing_path()).with_cookie(&self.auth_cookie()))
        } else {
            warn!("Login rejected");
            Err(GatewayError::LoginRejected)
        }
    }

    fn auth_cookie(&self) -> String {
        format_set_cookie(
            &self.config.auth_cookie_name,
            &self.config.proxy_password,
            self.config.auth_cookie_max_age,
        )
    }

    async fn proxy(&self, request: ParsedRequest) -> Result<ProxyResponse> {
        let search = request.search();
        match self.router.route(request.path())? {
            RouteDecision::RawContentProxy(path) => {
                let target = UpstreamTarget::raw(&self.config, &path, &search)?;
                let upstream = self.forwarder.forward(&target, &request).await?;
                let mut headers = upstream.headers().clone();
                strip_hop_by_hop(&mut headers);
                apply_cors_headers(&mut headers, &request.origin);
                Ok(relay(upstream.status(), headers, upstream, &request.method))
            }
            RouteDecision::BlockedPath(_) => Err(GatewayError::BlockedPath {
                path: request.path().to_string(),
            }),
            RouteDecision::MainSiteProxy(path) => {
                let target = UpstreamTarget::main(&self.config, &path, &search)?;
                let upstream = self.forwarder.forward(&target, &request).await?;
                self.rewrite_main(&request, &target, upstream).await
            }
        }
    }

    async fn rewrite_main(
        &self,
        request: &ParsedRequest,
        target: &UpstreamTarget,
        upstream: reqwest::Response,
    ) -> Result<ProxyResponse> {
        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);
        let targets = RewriteTargets::new(&request.origin, &self.config);

        if status.is_redirection() {
            let rewritten = headers
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|location| {
                    rewrite_location(location, &target.url, &self.config, &targets)
                })
                .and_then(|location| HeaderValue::from_str(&location).ok());
            if let Some(location) = rewritten {
                headers.insert(LOCATION, location);
            }
            apply_cors_headers(&mut headers, &request.origin);
            return Ok(relay(status, headers, upstream, &request.method));
        }

        strip_content_security_policy(&mut headers);
        apply_cors_headers(&mut headers, &request.origin);

        let kind = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(ContentKind::Other, ContentKind::from_content_type);

        if !kind.is_textual() || request.method == Method::HEAD || !allows_body(status) {
            return Ok(relay(status, headers, upstream, &request.method));
        }

        let raw = upstream
            .bytes()
            .await
            .map_err(|e| GatewayError::UpstreamUnavailable {
                host: target.host.clone(),
                reason: format!("body read failed: {e}"),
            })?;

        let rewritten = {
            let text = std::str::from_utf8(&raw)
                .map_err(|e| GatewayError::BodyProcessing(format!("{}: {e}", target.url)))?;
            self.rewriter.rewrite(text, kind, &targets)
        };

        let body = rewritten.map_or(raw, Bytes::from);
        headers.remove(CONTENT_LENGTH);

        debug!(upstream = %target.url, bytes = body.len(), "Rewrote textual body");
        Ok(ProxyResponse {
            status,
            headers,
            body: ResponseBody::Full(body),
        })
    }
}

/// Passes an upstream response through without touching the body.
fn relay(
    status: StatusCode,
    headers: HeaderMap,
    upstream: reqwest::Response,
    method: &Method,
) -> ProxyResponse {
    let body = if *method == Method::HEAD || !allows_body(status) {
        ResponseBody::Empty
    } else {
        ResponseBody::Stream(upstream)
    };
    ProxyResponse {
        status,
        headers,
        body,
    }
}
