use crate::common::{AUTH_COOKIE, client, proxy_origin, spawn_stack};

#[tokio::test]
async fn test_html_page_is_rewritten() {
    let (proxy_port, main, raw) = spawn_stack(|_| {}).await;
    let origin = proxy_origin(proxy_port);

    let resp = client()
        .get(format!("http://127.0.0.1:{proxy_port}/octocat/Hello-World"))
        .header("Cookie", AUTH_COOKIE)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let headers = resp.headers().clone();
    assert!(headers.get("content-security-policy").is_none());
    assert!(headers.get("content-security-policy-report-only").is_none());
    assert_eq!(
        headers
            .get("access-control-allow-origin")
            .unwrap()
            .to_str()
            .unwrap(),
        origin
    );
    assert_eq!(
        headers.get("access-control-allow-credentials").unwrap(),
        "true"
    );

    let body = resp.text().await.unwrap();
    let declared: usize = headers
        .get("content-length")
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(declared, body.len());

    assert_eq!(body.matches("<title>[Proxy] Hello-World</title>").count(), 1);
    assert!(body.contains("<body class=\"logged-out\"><div id=\"proxy-banner\">mirror</div>"));
    assert!(body.contains(&format!("href=\"{origin}/octocat\"")));
    assert!(body.contains(&format!(
        "src=\"{origin}/raw-content/octocat/Hello-World/master/logo.png\""
    )));
    assert!(!body.contains(&format!("127.0.0.1:{}/", main.port)));
    assert!(!body.contains(&format!("localhost:{}/", raw.port)));
}

#[tokio::test]
async fn test_escaped_origin_in_script() {
    let (proxy_port, _main, _raw) = spawn_stack(|_| {}).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{proxy_port}/assets/app.js"))
        .header("Cookie", AUTH_COOKIE)
        .send()
        .await
        .unwrap();

    let body = resp.text().await.unwrap();
    assert_eq!(
        body,
        format!("fetch(\"http:\\/\\/127.0.0.1:{proxy_port}\\/api\")")
    );
}

#[tokio::test]
async fn test_binary_body_is_byte_identical() {
    let (proxy_port, _main, _raw) = spawn_stack(|_| {}).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{proxy_port}/assets/logo.bin"))
        .header("Cookie", AUTH_COOKIE)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert!(resp.headers().get("access-control-allow-origin").is_some());
    let bytes = resp.bytes().await.unwrap();
    assert_eq!(&bytes[..], &[0u8, 159, 146, 150, 255, 10]);
}

#[tokio::test]
async fn test_invalid_utf8_html_is_500() {
    let (proxy_port, _main, _raw) = spawn_stack(|_| {}).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{proxy_port}/broken.html"))
        .header("Cookie", AUTH_COOKIE)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    assert_eq!(resp.text().await.unwrap(), "Internal Server Error");
}

#[tokio::test]
async fn test_main_redirect_is_rewritten_not_followed() {
    let (proxy_port, main, _raw) = spawn_stack(|_| {}).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{proxy_port}/redirect"))
        .header("Cookie", AUTH_COOKIE)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 302);
    assert_eq!(
        resp.headers().get("location").unwrap().to_str().unwrap(),
        format!("{}/octocat/Hello-World", proxy_origin(proxy_port))
    );
    assert!(resp.headers().get("access-control-allow-origin").is_some());
    assert_eq!(main.count(), 1);
}

#[tokio::test]
async fn test_redirect_to_raw_host_is_rewritten() {
    let (proxy_port, _main, raw) = spawn_stack(|_| {}).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{proxy_port}/redirect-raw"))
        .header("Cookie", AUTH_COOKIE)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 302);
    assert_eq!(
        resp.headers().get("location").unwrap().to_str().unwrap(),
        format!(
            "{}/raw-content/octocat/Hello-World/master/README.md",
            proxy_origin(proxy_port)
        )
    );
    assert_eq!(raw.count(), 0);
}

#[tokio::test]
async fn test_head_request_has_no_body() {
    let (proxy_port, _main, _raw) = spawn_stack(|_| {}).await;

    let resp = client()
        .head(format!("http://127.0.0.1:{proxy_port}/octocat/Hello-World"))
        .header("Cookie", AUTH_COOKIE)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert!(resp.headers().get("content-security-policy").is_none());
    assert!(resp.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_forwarded_proto_sets_rewrite_origin() {
    let (proxy_port, _main, _raw) = spawn_stack(|_| {}).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{proxy_port}/octocat/Hello-World"))
        .header("Cookie", AUTH_COOKIE)
        .header("X-Forwarded-Proto", "https")
        .send()
        .await
        .unwrap();

    let body = resp.text().await.unwrap();
    assert!(body.contains(&format!("href=\"https://127.0.0.1:{proxy_port}/octocat\"")));
}
