mod common;

use std::net::SocketAddr;

use axum::{
    body::{Body, to_bytes},
    extract::ConnectInfo,
    http::{Request, StatusCode, header},
};
use common::{Harness, payload_for};
use serde_json::Value;
use tower::ServiceExt;
use weather_gateway::{app, config::GatewayConfig, upstream::UpstreamError};

fn request(uri: &str, peer: &str) -> Request<Body> {
    let mut req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let addr: SocketAddr = peer.parse().unwrap();
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn serves_raw_payload_with_cache_header() {
    let h = Harness::new(GatewayConfig::default());
    let router = app(h.state(false));

    let response = router
        .clone()
        .oneshot(request("/weather?country=izmir", "192.0.2.1:4000"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(response.headers()["x-cache"], "miss");
    assert!(response.headers().contains_key("x-request-id"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), payload_for("izmir").as_bytes());

    let response = router
        .oneshot(request("/weather?country=izmir", "192.0.2.1:4001"))
        .await
        .unwrap();
    assert_eq!(response.headers()["x-cache"], "hit");
}

#[tokio::test]
async fn over_limit_client_gets_429_with_structured_body() {
    let h = Harness::new(GatewayConfig {
        burst: 2,
        ..GatewayConfig::default()
    });
    let router = app(h.state(false));

    for _ in 0..2 {
        let response = router
            .clone()
            .oneshot(request("/weather", "198.51.100.3:1000"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = router
        .clone()
        .oneshot(request("/weather", "198.51.100.3:1001"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    let body = body_json(response).await;
    assert_eq!(body["code"], 1005);
    assert!(body["msg"].as_str().unwrap().starts_with("Too many requests"));

    // Another peer address is another bucket.
    let response = router
        .oneshot(request("/weather", "198.51.100.4:1000"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn forwarded_headers_pick_the_bucket_only_when_trusted() {
    let h = Harness::new(GatewayConfig {
        burst: 1,
        ..GatewayConfig::default()
    });
    let router = app(h.state(true));

    let forwarded = |ip: &str| {
        let mut req = request("/weather", "10.0.0.1:80");
        req.headers_mut().insert("x-real-ip", ip.parse().unwrap());
        req
    };

    let first = router.clone().oneshot(forwarded("203.0.113.1")).await.unwrap();
    let second = router.clone().oneshot(forwarded("203.0.113.2")).await.unwrap();
    let repeat = router.oneshot(forwarded("203.0.113.1")).await.unwrap();

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(repeat.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn upstream_failures_surface_as_server_errors() {
    let h = Harness::new(GatewayConfig::default());
    let router = app(h.state(false));

    h.upstream.fail_next(UpstreamError::Rejected {
        status: 500,
        body: "boom".into(),
    });
    let response = router
        .clone()
        .oneshot(request("/weather?country=rize", "192.0.2.9:1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["code"], 5002);

    h.upstream.fail_next(UpstreamError::Unavailable("dns".into()));
    let response = router
        .oneshot(request("/weather?country=rize", "192.0.2.9:1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["code"], 5001);
}

#[tokio::test]
async fn large_error_body_reaches_the_client_intact() {
    let h = Harness::new(GatewayConfig::default());
    let router = app(h.state(false));

    let upstream_body = "x".repeat(5000);
    h.upstream.fail_next(UpstreamError::Rejected {
        status: 500,
        body: upstream_body.clone(),
    });
    let response = router
        .oneshot(request("/weather?country=rize", "192.0.2.9:1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["code"], 5002);
    assert!(body["msg"].as_str().unwrap().contains(&upstream_body));
}

#[tokio::test]
async fn cache_write_failure_is_invisible_to_the_client() {
    let h = Harness::new(GatewayConfig::default());
    h.cache.fail_sets(true);
    let router = app(h.state(false));

    let response = router
        .oneshot(request("/weather?country=sinop", "192.0.2.5:1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), payload_for("sinop").as_bytes());
}

#[tokio::test]
async fn root_redirects_to_weather() {
    let h = Harness::new(GatewayConfig::default());
    let response = app(h.state(false))
        .oneshot(request("/", "192.0.2.1:1"))
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(response.headers()[header::LOCATION], "/weather");
}

#[tokio::test]
async fn health_reports_clients_and_counters() {
    let h = Harness::new(GatewayConfig::default());
    let router = app(h.state(false));

    router
        .clone()
        .oneshot(request("/weather?country=ordu", "192.0.2.1:1"))
        .await
        .unwrap();
    let response = router
        .oneshot(request("/health", "192.0.2.1:1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["resp_data"]["status"], "ok");
    assert_eq!(body["resp_data"]["tracked_clients"], 1);
    assert_eq!(body["resp_data"]["metrics"]["admitted"], 1);
    assert_eq!(body["resp_data"]["metrics"]["upstream_fills"], 1);
}
