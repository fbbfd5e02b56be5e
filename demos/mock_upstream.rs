//! Stand-ins for the main site and the raw-content host.
//!
//! Point the proxy at them with
//! `UPSTREAM_SCHEME=http UPSTREAM_HOST=127.0.0.1:9001 RAW_UPSTREAM_HOST=localhost:9002`.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;

const MAIN_PORT: u16 = 9001;
const RAW_PORT: u16 = 9002;

async fn main_site(
    req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (status, content_type, body) = match req.uri().path() {
        "/" | "/octocat/Hello-World" => (
            StatusCode::OK,
            "text/html; charset=utf-8",
            format!(
                "<html><head><title>Hello-World</title></head><body>\
                 <a href=\"http://127.0.0.1:{MAIN_PORT}/octocat\">octocat</a>\
                 <img src=\"http://localhost:{RAW_PORT}/octocat/Hello-World/master/logo.png\">\
                 <script src=\"/assets/app.js\"></script></body></html>"
            ),
        ),
        "/assets/app.js" => (
            StatusCode::OK,
            "application/javascript",
            format!("fetch(\"http:\\/\\/127.0.0.1:{MAIN_PORT}\\/api\");"),
        ),
        "/login" => (StatusCode::OK, "text/plain", "Login Page".to_string()),
        _ => (StatusCode::NOT_FOUND, "text/plain", "404 Not Found".to_string()),
    };

    let response = Response::builder()
        .status(status)
        .header("Content-Type", content_type)
        .header("Content-Security-Policy", "default-src 'self'")
        .body(Full::new(Bytes::from(body)))
        .unwrap();

    Ok(response)
}

async fn raw_site(
    req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (status, body) = match req.uri().path() {
        "/octocat/Hello-World/master/README.md" => (StatusCode::OK, "# Hello World\n"),
        _ => (StatusCode::NOT_FOUND, "404: Not Found"),
    };

    let response = Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(body)))
        .unwrap();

    Ok(response)
}

async fn serve<F, Fut>(port: u16, handler: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Fn(Request<hyper::body::Incoming>) -> Fut + Copy + Send + 'static,
    Fut: std::future::Future<Output = Result<Response<Full<Bytes>>, Infallible>> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    println!("Mock upstream listening on http://{addr}");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);

        tokio::task::spawn(async move {
            if let Err(err) = http1::Builder::new()
                .serve_connection(io, service_fn(handler))
                .await
            {
                eprintln!("Error serving connection: {err:?}");
            }
        });
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tokio::try_join!(serve(MAIN_PORT, main_site), serve(RAW_PORT, raw_site))?;
    Ok(())
}
