//! End-to-end tests for HTTP relaying.

use std::time::Duration;

use axum::http::StatusCode;
use forward_proxy::routing::EncodedPath;

mod common;

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

async fn next_capture(rx: &mut tokio::sync::mpsc::UnboundedReceiver<common::Captured>) -> common::Captured {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("backend saw no request")
        .expect("backend channel closed")
}

#[tokio::test]
async fn test_forwards_method_body_and_sanitized_headers() {
    let (backend, mut seen) = common::start_http_backend().await;
    let (proxy, shutdown) = common::start_proxy().await;

    let res = client()
        .post(format!("http://{}/proxy?url=http://{}/echo?x=1", proxy, backend))
        .header("Origin", "https://app.example")
        .header("Referer", "https://app.example/page")
        .header("X-Forwarded-For", "203.0.113.7")
        .header("CF-Connecting-IP", "203.0.113.7")
        .header("X-Real-IP", "203.0.113.7")
        .header("X-Custom", "Kept-As-Is")
        .body("payload")
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    let headers = res.headers().clone();
    assert_eq!(headers["access-control-allow-origin"], "https://app.example");
    assert_eq!(headers["timing-allow-origin"], "https://app.example");
    assert_eq!(headers["access-control-allow-credentials"], "true");
    assert_eq!(headers["x-upstream"], "yes");
    assert_eq!(res.text().await.unwrap(), "echo");

    let captured = next_capture(&mut seen).await;
    assert_eq!(captured.method, "POST");
    assert_eq!(captured.uri, "/echo?x=1");
    assert_eq!(&captured.body[..], b"payload");
    for name in ["origin", "referer", "x-forwarded-for", "cf-connecting-ip", "x-real-ip"] {
        assert!(!captured.headers.contains_key(name), "{} leaked upstream", name);
    }
    assert_eq!(captured.headers["x-custom"], "Kept-As-Is");
    assert_eq!(captured.headers["host"], backend.to_string().as_str());

    shutdown.trigger();
}

#[tokio::test]
async fn test_get_is_sent_without_body() {
    let (backend, mut seen) = common::start_http_backend().await;
    let (proxy, shutdown) = common::start_proxy().await;

    let res = client()
        .get(format!("http://{}/proxy?url=http://{}/echo", proxy, backend))
        .body("should not travel")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let captured = next_capture(&mut seen).await;
    assert_eq!(captured.method, "GET");
    assert!(captured.body.is_empty());
    assert!(!captured.headers.contains_key("content-length"));
    assert!(!captured.headers.contains_key("transfer-encoding"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_encoded_path_target() {
    let (backend, mut seen) = common::start_http_backend().await;
    let (proxy, shutdown) = common::start_proxy().await;

    let encoded = EncodedPath::encode(&format!("http://{}/echo?y=2", backend));
    let res = client()
        .put(format!("http://{}/proxy/{}", proxy, encoded))
        .body("data")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");

    let captured = next_capture(&mut seen).await;
    assert_eq!(captured.method, "PUT");
    assert_eq!(captured.uri, "/echo?y=2");
    assert_eq!(&captured.body[..], b"data");

    shutdown.trigger();
}

#[tokio::test]
async fn test_relative_redirect_is_rewritten_not_followed() {
    let (backend, _seen) = common::start_http_backend().await;
    let (proxy, shutdown) = common::start_proxy().await;

    let res = client()
        .get(format!("http://{}/proxy?url=http://{}/redirect", proxy, backend))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FOUND);
    let expected = format!("/proxy/{}", EncodedPath::encode(&format!("http://{}/landing", backend)));
    assert_eq!(res.headers()["location"], expected.as_str());

    shutdown.trigger();
}

#[tokio::test]
async fn test_absolute_redirect_is_rewritten() {
    let (backend, _seen) = common::start_http_backend().await;
    let (proxy, shutdown) = common::start_proxy().await;

    let res = client()
        .get(format!("http://{}/proxy?url=http://{}/absolute-redirect", proxy, backend))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
    let location = res.headers()["location"].to_str().unwrap().to_string();
    let encoded = location.strip_prefix("/proxy/").expect("location not proxied");
    assert_eq!(
        EncodedPath::from_segment(encoded).decode().unwrap(),
        "http://elsewhere.example/x"
    );

    shutdown.trigger();
}

#[tokio::test]
async fn test_streamed_body_arrives_intact() {
    let (backend, _seen) = common::start_http_backend().await;
    let (proxy, shutdown) = common::start_proxy().await;

    let res = client()
        .get(format!("http://{}/proxy?url=http://{}/stream", proxy, backend))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "chunk-1 chunk-2 chunk-3");

    shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let dead = common::unused_addr().await;
    let (proxy, shutdown) = common::start_proxy().await;

    let res = client()
        .get(format!("http://{}/proxy?url=http://{}/", proxy, dead))
        .header("Origin", "https://app.example")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(res.headers()["access-control-allow-origin"], "https://app.example");
    assert_eq!(res.text().await.unwrap(), "Upstream unreachable");

    shutdown.trigger();
}

#[tokio::test]
async fn test_slow_upstream_is_bad_gateway_with_cors() {
    let (backend, _seen) = common::start_http_backend().await;
    let (proxy, shutdown) = common::start_proxy_with(|config| config.timeouts.request_secs = 1).await;

    let res = client()
        .get(format!("http://{}/proxy?url=http://{}/slow", proxy, backend))
        .header("Origin", "https://app.example")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(res.headers()["access-control-allow-origin"], "https://app.example");
    assert_eq!(res.text().await.unwrap(), "Upstream unreachable");

    shutdown.trigger();
}

#[tokio::test]
async fn test_connection_listed_headers_are_not_forwarded() {
    let (backend, mut seen) = common::start_http_backend().await;
    let (proxy, shutdown) = common::start_proxy().await;

    let res = client()
        .post(format!("http://{}/proxy?url=http://{}/echo", proxy, backend))
        .header("Connection", "x-hop-secret")
        .header("X-Hop-Secret", "do-not-forward")
        .header("X-Custom", "kept")
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let captured = next_capture(&mut seen).await;
    assert!(!captured.headers.contains_key("x-hop-secret"));
    assert_eq!(captured.headers["x-custom"], "kept");

    shutdown.trigger();
}

#[tokio::test]
async fn test_unroutable_requests_are_bad_request() {
    let (proxy, shutdown) = common::start_proxy().await;
    let client = client();

    for path in ["/nothing-here", "/proxy", "/proxy/", "/proxy/***", "/proxy?url=relative/only"] {
        let res = client
            .get(format!("http://{}{}", proxy, path))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "path {}", path);
    }

    shutdown.trigger();
}
