use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use mirrorgate::config::{Config, FeatureFlags, RoutingMode};
use mirrorgate::core::proxy::GateProxy;
use pingora::proxy::http_proxy_service;
use pingora::server::Server;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub const PASSWORD: &str = "iloveyou";
pub const AUTH_COOKIE: &str = "__gh_proxy_auth=iloveyou";

/// A request as seen by a mock upstream.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

type Handler = Arc<dyn Fn(&Recorded) -> Response<Full<Bytes>> + Send + Sync>;

pub struct MockUpstream {
    pub port: u16,
    pub requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockUpstream {
    pub fn last(&self) -> Recorded {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("upstream saw no request")
    }

    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

pub fn reply(status: u16, content_type: &str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::from_u16(status).unwrap())
        .header("Content-Type", content_type)
        .body(Full::new(body.into()))
        .unwrap()
}

pub fn redirect(location: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::FOUND)
        .header("Location", location)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

async fn spawn_upstream(handler: Handler) -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = requests.clone();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                continue;
            };
            let handler = handler.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let handler = handler.clone();
                    let log = log.clone();
                    async move {
                        let (parts, body) = req.into_parts();
                        let body = body
                            .collect()
                            .await
                            .map(|b| b.to_bytes())
                            .unwrap_or_default();
                        let recorded = Recorded {
                            method: parts.method.to_string(),
                            path_and_query: parts
                                .uri
                                .path_and_query()
                                .map(ToString::to_string)
                                .unwrap_or_default(),
                            headers: parts.headers,
                            body,
                        };
                        let response = handler(&recorded);
                        log.lock().unwrap().push(recorded);
                        Ok::<_, Infallible>(response)
                    }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    MockUpstream { port, requests }
}

pub const RAW_README: &str = "# Hello World\n<title>not a page</title>\nhttp://127.0.0.1/octocat\n";

/// Stands in for the raw-content host. `/hop` redirects to the same server
/// under a different authority (`127.0.0.1` instead of `localhost`).
pub async fn spawn_raw_upstream() -> MockUpstream {
    let listener_port = Arc::new(Mutex::new(0u16));
    let own_port = listener_port.clone();

    let upstream = spawn_upstream(Arc::new(move |req: &Recorded| {
        let raw_port = *own_port.lock().unwrap();
        let path = req.path_and_query.split('?').next().unwrap_or("");
        match path {
            "/octocat/Hello-World/master/README.md" => {
                reply(200, "text/plain; charset=utf-8", RAW_README)
            }
            "/moved" => redirect("/octocat/Hello-World/master/README.md"),
            "/page.html" => reply(
                200,
                "text/html",
                "<html><head><title>Raw</title></head><body>raw</body></html>",
            ),
            "/hop" => redirect(&format!("http://127.0.0.1:{raw_port}/host")),
            "/host" => reply(
                200,
                "text/plain",
                req.headers
                    .get("host")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string(),
            ),
            _ => reply(404, "text/plain", "404: Not Found"),
        }
    }))
    .await;

    *listener_port.lock().unwrap() = upstream.port;
    upstream
}

/// Stands in for the main site. Links point at `127.0.0.1:<own port>` and
/// `localhost:<raw_port>` so the two origins never prefix each other.
pub async fn spawn_main_upstream(raw_port: u16) -> MockUpstream {
    let listener_port = Arc::new(Mutex::new(0u16));
    let own_port = listener_port.clone();

    let upstream = spawn_upstream(Arc::new(move |req: &Recorded| {
        let main_port = *own_port.lock().unwrap();
        let path = req.path_and_query.split('?').next().unwrap_or("");
        match path {
            "/" | "/octocat/Hello-World" => {
                let html = format!(
                    "<html><head><title>Hello-World</title></head>\
                     <body class=\"logged-out\">\
                     <a href=\"http://127.0.0.1:{main_port}/octocat\">owner</a>\
                     <a href=\"/octocat/Hello-World/issues\">issues</a>\
                     <img src=\"http://localhost:{raw_port}/octocat/Hello-World/master/logo.png\">\
                     </body></html>"
                );
                Response::builder()
                    .status(StatusCode::OK)
                    .header("Content-Type", "text/html; charset=utf-8")
                    .header("Content-Security-Policy", "default-src 'none'")
                    .header("Content-Security-Policy-Report-Only", "default-src 'none'")
                    .header("Access-Control-Allow-Origin", "https://github.com")
                    .body(Full::new(Bytes::from(html)))
                    .unwrap()
            }
            "/assets/app.js" => reply(
                200,
                "application/javascript",
                format!("fetch(\"http:\\/\\/127.0.0.1:{main_port}\\/api\")"),
            ),
            "/assets/logo.bin" => reply(
                200,
                "application/octet-stream",
                vec![0u8, 159, 146, 150, 255, 10],
            ),
            "/broken.html" => reply(200, "text/html", vec![b'<', b'p', b'>', 0xff, 0xfe]),
            "/redirect" => redirect("/octocat/Hello-World"),
            "/redirect-raw" => redirect(&format!(
                "http://localhost:{raw_port}/octocat/Hello-World/master/README.md"
            )),
            "/echo" => reply(200, "text/plain", req.body.clone()),
            _ => reply(404, "text/plain", "Not Found"),
        }
    }))
    .await;

    *listener_port.lock().unwrap() = upstream.port;
    upstream
}

pub fn create_test_config(main_port: u16, raw_port: u16) -> Arc<Config> {
    Arc::new(Config {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        upstream_scheme: "http".to_string(),
        upstream_host: format!("127.0.0.1:{main_port}"),
        raw_upstream_host: format!("localhost:{raw_port}"),
        raw_proxy_prefix: "/raw-content".to_string(),
        routing_mode: RoutingMode::Root,
        main_proxy_prefix: "/gh".to_string(),
        proxy_password: PASSWORD.to_string(),
        auth_cookie_name: "__gh_proxy_auth".to_string(),
        auth_cookie_max_age: 604_800,
        auth_realm: "GitHub Proxy".to_string(),
        blocked_paths: vec!["/login".to_string(), "/settings".to_string()],
        banner_html: "<div id=\"proxy-banner\">mirror</div>".to_string(),
        title_prefix: "[Proxy] ".to_string(),
        features: FeatureFlags {
            token_auth_enabled: true,
            basic_auth_enabled: true,
            raw_content_requires_auth: true,
        },
        public_scheme: "http".to_string(),
        upstream_timeout_secs: 5,
        log_format: "pretty".to_string(),
    })
}

pub async fn spawn_proxy(config: Arc<Config>) -> (u16, std::thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut conf_clone = (*config).clone();
    conf_clone.listen_addr = format!("127.0.0.1:{port}").parse().unwrap();
    let config = Arc::new(conf_clone);

    let handle = std::thread::spawn(move || {
        let proxy = GateProxy::new(config.clone()).unwrap();

        let server_conf = Arc::new(pingora::server::configuration::ServerConf::default());
        let mut service = http_proxy_service(&server_conf, proxy);
        service.add_tcp(&config.listen_addr.to_string());

        let mut server = Server::new(None).unwrap();
        server.bootstrap();
        server.add_service(service);
        server.run_forever();
    });

    tokio::time::sleep(Duration::from_secs(3)).await;
    (port, handle)
}

/// Spawns both mock upstreams and a proxy in front of them.
pub async fn spawn_stack(
    tweak: impl FnOnce(&mut Config),
) -> (u16, MockUpstream, MockUpstream) {
    let raw = spawn_raw_upstream().await;
    let main = spawn_main_upstream(raw.port).await;

    let mut config = (*create_test_config(main.port, raw.port)).clone();
    tweak(&mut config);
    let (proxy_port, _) = spawn_proxy(Arc::new(config)).await;
    (proxy_port, main, raw)
}

/// Client that neither follows redirects nor uses a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

pub fn proxy_origin(port: u16) -> String {
    format!("http://127.0.0.1:{port}")
}
