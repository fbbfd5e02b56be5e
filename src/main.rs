//! `mirrorgate` - Authenticating, link-rewriting reverse proxy.
//!
//! Copyright (C) 2026 Maverick
//! SPDX-License-Identifier: AGPL-3.0-only
//!
//! Initializes the application runtime, loads configuration, sets up logging,
//! and launches the proxy service.

use mirrorgate::{Config, GateProxy, preload_templates};

use pingora::proxy::http_proxy_service;
use pingora::server::Server;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    dotenvy::dotenv().ok();

    let (non_blocking, _guard) = tracing_appender::non_blocking(std::io::stdout());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(non_blocking);

    if log_format.eq_ignore_ascii_case("pretty") {
        subscriber.init();
    } else {
        subscriber.json().init();
    }

    let config = Config::from_env();
    preload_templates();
    info!(
        listen_addr = %config.listen_addr,
        upstream = %config.upstream_origin(),
        raw_upstream = %config.raw_upstream_origin(),
        routing_mode = ?config.routing_mode,
        raw_prefix = %config.raw_proxy_prefix,
        token_auth = config.features.token_auth_enabled,
        basic_auth = config.features.basic_auth_enabled,
        raw_requires_auth = config.features.raw_content_requires_auth,
        log_format = %config.log_format,
        "Server initialized"
    );

    let proxy = match GateProxy::new(config.clone()) {
        Ok(proxy) => proxy,
        Err(e) => {
            error!(error = %e, "Failed to build proxy service");
            std::process::exit(1);
        }
    };

    let mut server = Server::new(None).expect("Failed to create Pingora server");
    server.bootstrap();

    let mut proxy_service = http_proxy_service(&server.configuration, proxy);
    proxy_service.add_tcp(&config.listen_addr.to_string());
    server.add_service(proxy_service);

    server.run_forever();
}
