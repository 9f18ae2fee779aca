mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use common::{encoded_image, memory_config, SpyOrigin};
use pixelproxy::config::ProxyConfig;
use pixelproxy::{router, AppState};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

const GIF_BODY: &[u8] = b"GIF89a opaque gif payload";

/// Starts a throwaway origin server on an ephemeral port.
async fn spawn_origin() -> SocketAddr {
    let jpeg = encoded_image(100, 50, image::ImageFormat::Jpeg);
    let app = Router::new()
        .route(
            "/img.jpg",
            get(move || {
                let body = jpeg.clone();
                async move { ([(header::CONTENT_TYPE, "image/jpeg")], body) }
            }),
        )
        .route("/pic.gif", get(|| async { ([(header::CONTENT_TYPE, "image/gif")], GIF_BODY) }))
        .route("/broken.png", get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn test_state() -> AppState {
    let cfg = ProxyConfig { origin_scheme: "http".into(), ..memory_config() };
    AppState::from_config(&cfg).unwrap()
}

async fn get_path(app: &Router, uri: &str, accept: Option<&str>) -> Response {
    let mut req = Request::builder().uri(uri);
    if let Some(a) = accept {
        req = req.header(header::ACCEPT, a);
    }
    app.clone().oneshot(req.body(Body::empty()).unwrap()).await.unwrap()
}

async fn body_bytes(resp: Response) -> bytes::Bytes {
    axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = router(test_state());
    let response = get_path(&app, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "pixelproxy");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = router(test_state());
    let response = get_path(&app, "/metrics", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let text = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(text.contains("pixelproxy_cache_hits_total"));
    assert!(text.contains("pixelproxy_transforms_total"));
}

#[tokio::test]
async fn test_unsupported_extension_is_not_found() {
    let origin = Arc::new(SpyOrigin::serving("image/jpeg", encoded_image(4, 4, image::ImageFormat::Jpeg)));
    let (pipeline, _cache) = common::pipeline(origin.clone());
    let app = router(AppState::new(pipeline));
    let response = get_path(&app, "/example.com/readme.txt", Some("image/webp")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(&body_bytes(response).await[..], b"Not found");
    assert_eq!(origin.calls(), 0);
}

#[tokio::test]
async fn test_origin_error_is_not_found() {
    let origin = spawn_origin().await;
    let app = router(test_state());
    let response = get_path(&app, &format!("/{}/broken.png", origin), None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(&body_bytes(response).await[..], b"Not found");
}

#[tokio::test]
async fn test_webp_negotiation_end_to_end() {
    let origin = spawn_origin().await;
    let state = test_state();
    let app = router(state.clone());
    let uri = format!("/{}/img.jpg?w=50", origin);

    let first = get_path(&app, &uri, Some("image/webp,*/*")).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers()[header::CONTENT_TYPE], "image/webp");
    assert_eq!(first.headers()[header::CACHE_CONTROL], "s-maxage=15552000");
    let first_headers = first.headers().clone();
    let first_body = body_bytes(first).await;

    let decoded = image::load_from_memory_with_format(&first_body, image::ImageFormat::WebP).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (50, 25));

    state.pipeline.writer().drain().await;

    let second = get_path(&app, &uri, Some("image/webp,*/*")).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers(), &first_headers);
    assert_eq!(body_bytes(second).await, first_body);
}

#[tokio::test]
async fn test_legacy_client_gets_original_jpeg() {
    let origin = spawn_origin().await;
    let app = router(test_state());
    let response = get_path(&app, &format!("/{}/img.jpg", origin), Some("image/jpeg")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "s-maxage=15552000");
    let body = body_bytes(response).await;
    assert_eq!(body.to_vec(), encoded_image(100, 50, image::ImageFormat::Jpeg));
}

#[tokio::test]
async fn test_gif_passthrough_end_to_end() {
    let origin = spawn_origin().await;
    let app = router(test_state());
    let response = get_path(&app, &format!("/{}/pic.gif?w=10&h=10", origin), Some("image/webp")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/gif");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "s-maxage=15552000");
    assert_eq!(&body_bytes(response).await[..], GIF_BODY);
}

#[tokio::test]
async fn test_cache_stats_endpoint() {
    let app = router(test_state());
    let response = get_path(&app, "/stats/cache", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert!(json["requests"]["total"].is_u64());
    assert_eq!(json["cache"]["pending_writes"], 0);
}

#[tokio::test]
async fn test_non_get_is_rejected() {
    let app = router(test_state());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/example.com/img.jpg")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
