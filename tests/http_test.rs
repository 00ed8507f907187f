//! The axum router serving a service description loaded from disk
#![cfg(unix)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use clapi::Gateway;
use clapi::application::SpecLoader;
use clapi::infrastructure::{FileSpecLoader, ShellCommandExecutor, build_security_checks, http};
use tower::ServiceExt;

async fn app() -> Router {
    let source = format!("{}/tests/fixtures/service.yaml", env!("CARGO_MANIFEST_DIR"));
    let spec = FileSpecLoader::new().load(&source).await.expect("fixture spec");
    assert_eq!(spec.port(), 9090);

    let checks = build_security_checks(&spec).expect("security checks");
    let gateway = Gateway::new(Arc::new(spec), Arc::new(ShellCommandExecutor::new()), checks)
        .expect("gateway");
    http::router(Arc::new(gateway))
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_public_operation() {
    let response = app()
        .await
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/cli/public/echo")
                .header("content-type", "text/plain")
                .body(Body::from("over the wire"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/plain");
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert_eq!(body_text(response).await, "over the wire");
}

#[tokio::test]
async fn test_private_operation_requires_key() {
    let response = app()
        .await
        .oneshot(
            Request::builder()
                .uri("/cli/private/hans")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(response).await, "Unauthorized (missing API Key)");

    let response = app()
        .await
        .oneshot(
            Request::builder()
                .uri("/cli/private/hans")
                .header("x-api-key", "k-123")
                .header("x-greeting", "servus")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "servus hans");
}

#[tokio::test]
async fn test_base_path_is_required() {
    let response = app()
        .await
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/public/echo")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_text(response).await,
        "Unable to locate operation: [POST] /public/echo"
    );
}
