//! axum transport adapter
//!
//! Every operation is mounted at `basePath + path`. Requests are converted to
//! the uniform [`GatewayRequest`] view, answered by the [`Gateway`] and turned
//! back into HTTP responses.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Path, Request};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter};
use indexmap::IndexMap;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::application::Gateway;
use crate::core::{GatewayRequest, GatewayResponse, HttpMethod, Result};

/// Largest request body read into memory
pub const BODY_LIMIT: usize = 16 * 1024 * 1024;

#[derive(Clone)]
struct OperationRoute {
    gateway: Arc<Gateway>,
    /// Path template as declared in the service description
    template: String,
    method: HttpMethod,
}

/// Builds the router serving every operation of the gateway's service description
pub fn router(gateway: Arc<Gateway>) -> Router {
    let base_path = gateway.spec().base_path();
    let mut routes: IndexMap<String, MethodRouter> = IndexMap::new();

    for operation in gateway.spec().operations() {
        let route = format!("{base_path}{}", operation.path);
        let target = OperationRoute {
            gateway: Arc::clone(&gateway),
            template: operation.path.clone(),
            method: operation.method,
        };
        debug!("Mounting {} at {route}", operation.label());

        let method_router = routes
            .shift_remove(&route)
            .unwrap_or_else(|| MethodRouter::new().fallback(not_found));
        let method_router = method_router.on(
            method_filter(operation.method),
            move |params: Option<Path<HashMap<String, String>>>, request: Request| {
                let params = params.map(|Path(params)| params).unwrap_or_default();
                serve_operation(target.clone(), params, request)
            },
        );
        routes.insert(route, method_router);
    }

    routes
        .into_iter()
        .fold(Router::new(), |router, (route, method_router)| {
            router.route(&route, method_router)
        })
        .fallback(not_found)
        .layer(middleware::from_fn(answer_options))
        .layer(CorsLayer::permissive())
}

/// Binds `address` and serves until ctrl-c
pub async fn serve(gateway: Arc<Gateway>, address: SocketAddr) -> Result<()> {
    let app = router(gateway);
    let listener = TcpListener::bind(address).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("Unable to listen for shutdown signal: {err}");
                std::future::pending::<()>().await;
            }
            info!("Shutting down");
        })
        .await?;
    Ok(())
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Delete => MethodFilter::DELETE,
        HttpMethod::Patch => MethodFilter::PATCH,
        HttpMethod::Head => MethodFilter::HEAD,
        HttpMethod::Options => MethodFilter::OPTIONS,
    }
}

async fn serve_operation(
    target: OperationRoute,
    path_params: HashMap<String, String>,
    request: Request,
) -> Response {
    let request = match gateway_request(&target, path_params, request).await {
        Ok(request) => request,
        Err(response) => return response,
    };
    let response = target
        .gateway
        .dispatch(&target.template, target.method, &request)
        .await;
    debug!(
        "[{}] {} -> {}",
        target.method.as_str().to_ascii_uppercase(),
        request.path,
        response.status
    );
    into_response(response)
}

async fn gateway_request(
    target: &OperationRoute,
    path_params: HashMap<String, String>,
    request: Request,
) -> std::result::Result<GatewayRequest, Response> {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path();

    let mut request = GatewayRequest::new(target.method, path);
    for (name, value) in &parts.headers {
        match value.to_str() {
            Ok(value) => request = request.with_header(name.as_str(), value),
            Err(_) => debug!("Ignoring non-text header {name}"),
        }
    }
    if let Some(query) = parts.uri.query() {
        request = request.with_query_string(query);
    }
    request = request.with_path_params(path_params);

    let bytes = axum::body::to_bytes(body, BODY_LIMIT).await.map_err(|err| {
        debug!("Unable to read request body: {err}");
        (StatusCode::PAYLOAD_TOO_LARGE, "Unable to read request body").into_response()
    })?;
    Ok(request.with_raw_body(&bytes))
}

fn into_response(response: GatewayResponse) -> Response {
    let mut http = Response::new(Body::from(response.body));
    *http.status_mut() =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    for (name, value) in &response.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                http.headers_mut().append(name, value);
            }
            _ => warn!("Dropping invalid response header {name}"),
        }
    }
    http
}

async fn answer_options(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    next.run(request).await
}

async fn not_found(method: Method, uri: Uri) -> Response {
    let response = GatewayResponse::text(
        404,
        format!("Unable to locate operation: [{method}] {}", uri.path()),
    );
    into_response(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::shell::command_executor::MockCommandExecutor;
    use crate::openapi::ServiceSpec;
    use serde_json::json;
    use tower::ServiceExt;

    fn app(executor: MockCommandExecutor) -> Router {
        let spec = ServiceSpec::from_document(json!({
            "openapi": "3.0.0",
            "servers": [{"url": "/", "variables": {"basePath": {"default": "api"}}}],
            "paths": {
                "/items/{id}": {
                    "get": {
                        "parameters": [{"name": "id", "in": "path"}],
                        "x-cli": {"command": "show ${:id}"},
                        "responses": {"200": {"description": "ok", "content": {"text/plain": {}}}}
                    },
                    "delete": {
                        "parameters": [{"name": "id", "in": "path"}],
                        "x-cli": {"command": "remove ${:id}"},
                        "responses": {"200": {
                            "description": "gone",
                            "content": {"text/plain": {"x-value": "removed"}}
                        }}
                    }
                },
                "/items": {
                    "post": {
                        "x-cli": {"command": "create"},
                        "requestBody": {"content": {"application/json": {}}},
                        "responses": {"200": {"description": "ok", "content": {"application/json": {}}}}
                    }
                }
            }
        }))
        .unwrap();
        let gateway = Gateway::new(Arc::new(spec), Arc::new(executor), HashMap::new()).unwrap();
        router(Arc::new(gateway))
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn request(method: &str, uri: &str, body: Body) -> Request {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(body)
            .unwrap()
    }

    #[tokio::test]
    async fn test_path_parameters_reach_the_command() {
        let app = app(MockCommandExecutor::new().with_result("show a b", 0, "item", ""));

        let response = app
            .oneshot(request("GET", "/api/items/a%20b", Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/plain");
        assert_eq!(body_text(response).await, "item");
    }

    #[tokio::test]
    async fn test_methods_share_a_path() {
        let app = app(MockCommandExecutor::new().with_result("remove 7", 0, "", ""));

        let response = app
            .oneshot(request("DELETE", "/api/items/7", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "removed");
    }

    #[tokio::test]
    async fn test_json_body_is_piped() {
        let executor = Arc::new(MockCommandExecutor::new().with_result("create", 0, "{}", ""));
        let spec_executor = Arc::clone(&executor);
        let spec = ServiceSpec::from_document(json!({
            "swagger": "2.0",
            "paths": {"/items": {"post": {
                "parameters": [{"name": "item", "in": "body"}],
                "x-cli": {"command": "create"}
            }}}
        }))
        .unwrap();
        let gateway = Gateway::new(Arc::new(spec), spec_executor, HashMap::new()).unwrap();
        let app = router(Arc::new(gateway));

        let request = Request::builder()
            .method("POST")
            .uri("/items")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name": "hans"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        let stdin: serde_json::Value = serde_json::from_slice(calls[0].1.as_ref().unwrap()).unwrap();
        assert_eq!(stdin, json!({"name": "hans"}));
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let response = app(MockCommandExecutor::new())
            .oneshot(request("GET", "/api/unknown", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_text(response).await,
            "Unable to locate operation: [GET] /api/unknown"
        );

        let response = app(MockCommandExecutor::new())
            .oneshot(request("PUT", "/api/items/7", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_options_and_cors() {
        let response = app(MockCommandExecutor::new())
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/items")
                    .header("origin", "http://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_failed_command_is_internal_error() {
        let response = app(MockCommandExecutor::new())
            .oneshot(request("GET", "/api/items/7", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Internal Server Error");
    }
}
