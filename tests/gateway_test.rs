//! End-to-end gateway tests against the real shell executor
#![cfg(unix)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clapi::Gateway;
use clapi::core::{GatewayRequest, HttpMethod};
use clapi::infrastructure::ShellCommandExecutor;
use clapi::openapi::ServiceSpec;
use serde_json::{Value, json};

fn gateway(paths: Value) -> Gateway {
    gateway_with(paths, ShellCommandExecutor::new())
}

fn gateway_with(paths: Value, executor: ShellCommandExecutor) -> Gateway {
    let spec = ServiceSpec::from_document(json!({
        "openapi": "3.0.0",
        "info": {"title": "Shell API", "version": "1.0.0"},
        "servers": [{"url": "http://localhost:8080/", "variables": {"basePath": {"default": "api"}}}],
        "paths": paths
    }))
    .expect("valid service description");
    Gateway::new(Arc::new(spec), Arc::new(executor), HashMap::new()).expect("gateway")
}

fn get(path: &str) -> GatewayRequest {
    GatewayRequest::new(HttpMethod::Get, path)
}

fn post_json(path: &str, body: &Value) -> GatewayRequest {
    GatewayRequest::new(HttpMethod::Post, path)
        .with_header("Content-Type", "application/json")
        .with_raw_body(body.to_string().as_bytes())
}

#[tokio::test]
async fn test_query_parameter_in_command() {
    let gateway = gateway(json!({
        "/greet": {"get": {
            "parameters": [
                {"name": "name", "in": "query", "required": true},
                {"name": "loud", "in": "query", "x-transform": {"true": "!", "false": "."}}
            ],
            "x-cli": {"command": "printf 'hello %s%s' ${:name} '${:loud}'"},
            "responses": {"200": {"description": "ok", "content": {"text/plain": {}}}}
        }}
    }));

    let response = gateway
        .dispatch_request(get("/api/greet").with_query_string("name=hans&loud=true"))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body_text(), "hello hans!");
    assert_eq!(response.header("content-type"), Some("text/plain"));

    let response = gateway
        .dispatch_request(get("/api/greet").with_query_string("name=franz"))
        .await;
    assert_eq!(response.body_text(), "hello franz");

    let response = gateway.dispatch_request(get("/api/greet")).await;
    assert_eq!(response.status, 500);
    assert_eq!(response.body_text(), "Internal Server Error");
}

#[tokio::test]
async fn test_body_is_piped_to_stdin() {
    let gateway = gateway(json!({
        "/echo": {"post": {
            "requestBody": {"content": {"application/json": {}}},
            "x-cli": {"command": "cat"},
            "responses": {"200": {"description": "ok", "content": {"application/json": {}}}}
        }}
    }));

    let body = json!({"name": "hans", "tags": ["a", "b"]});
    let response = gateway.dispatch_request(post_json("/api/echo", &body)).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("application/json"));
    let echoed: Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(echoed, body);
}

#[tokio::test]
async fn test_json_path_and_regex_queries() {
    let gateway = gateway(json!({
        "/names": {"post": {
            "requestBody": {"content": {"application/json": {}}},
            "x-cli": {"command": "echo ${:body.[*].name|,} ${:body/\"id\": *([0-9]+)/$1}"},
            "responses": {"200": {"description": "ok"}}
        }}
    }));

    let body = json!([{"name": "hans", "id": 7}, {"name": "franz", "id": 8}]);
    let response = gateway.dispatch_request(post_json("/api/names", &body)).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body_text(), "hans,franz 7\n");
}

#[tokio::test]
async fn test_input_template_replaces_body() {
    let gateway = gateway(json!({
        "/upper": {"post": {
            "parameters": [{"name": "word", "in": "query"}],
            "x-cli": {"command": "tr a-z A-Z", "input": "${:word} and ${:word}"},
            "responses": {"200": {"description": "ok"}}
        }}
    }));

    let request = GatewayRequest::new(HttpMethod::Post, "/api/upper").with_query("word", "abc");
    let response = gateway.dispatch_request(request).await;
    assert_eq!(response.body_text(), "ABC AND ABC");
}

#[tokio::test]
async fn test_exit_codes_select_responses() {
    let gateway = gateway(json!({
        "/items/{id}": {"get": {
            "parameters": [{"name": "id", "in": "path"}],
            "x-cli": {"command": "test ${:id} = 1 && echo found || { echo \"no item ${:id}\" >&2; exit 4; }"},
            "responses": {
                "200": {"description": "found"},
                "404": {"description": "missing", "x-code": 4}
            }
        }},
        "/broken": {"get": {
            "x-cli": {"command": "echo broken >&2; exit 9"},
            "responses": {"200": {"description": "ok"}}
        }}
    }));

    let response = gateway.dispatch_request(get("/api/items/1")).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body_text(), "found\n");

    let response = gateway.dispatch_request(get("/api/items/2")).await;
    assert_eq!(response.status, 404);
    assert_eq!(response.body_text(), "no item 2\n");

    let response = gateway.dispatch_request(get("/api/broken")).await;
    assert_eq!(response.status, 500);
    assert_eq!(response.body_text(), "broken\n");
}

#[tokio::test]
async fn test_response_headers_and_negotiation() {
    let gateway = gateway(json!({
        "/whoami": {"get": {
            "parameters": [{"name": "name", "in": "query"}],
            "x-cli": {"command": "printf %s ${:name}"},
            "responses": {"200": {
                "description": "ok",
                "headers": {"X-Name": {"x-value": "${:name}"}},
                "content": {
                    "application/json": {"x-value": "{\"name\": \"${:output}\"}"},
                    "text/plain": {}
                }
            }}
        }}
    }));

    let request = get("/api/whoami").with_query("name", "hans");
    let response = gateway.dispatch_request(request.clone()).await;
    assert_eq!(response.header("content-type"), Some("application/json"));
    assert_eq!(response.body_text(), r#"{"name": "hans"}"#);
    assert_eq!(response.header("x-name"), Some("hans"));

    let response = gateway
        .dispatch_request(request.with_header("Accept", "text/*"))
        .await;
    assert_eq!(response.header("content-type"), Some("text/plain"));
    assert_eq!(response.body_text(), "hans");
}

#[tokio::test]
async fn test_files_are_exchanged_and_removed() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in-${:id}.txt");
    let output = dir.path().join("out-${:id}.txt");
    let gateway = gateway(json!({
        "/convert/{id}": {"post": {
            "parameters": [{"name": "id", "in": "path"}],
            "requestBody": {"content": {"text/plain": {}}},
            "x-cli": {
                "command": "tr a-z A-Z < ${:inputFile} > ${:outputFile}",
                "bodyToFile": true,
                "fileToBody": true,
                "inputFileName": input.to_str().unwrap(),
                "outputFileName": output.to_str().unwrap()
            },
            "responses": {"200": {"description": "ok", "content": {"text/plain": {}}}}
        }}
    }));

    let request = GatewayRequest::new(HttpMethod::Post, "/api/convert/42")
        .with_header("Content-Type", "text/plain")
        .with_raw_body(b"hello file");
    let response = gateway.dispatch_request(request).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body_text(), "HELLO FILE");
    assert!(!dir.path().join("in-42.txt").exists());
    assert!(!dir.path().join("out-42.txt").exists());
}

#[tokio::test]
async fn test_generated_temp_files() {
    let gateway = gateway(json!({
        "/count": {"post": {
            "requestBody": {"content": {"text/plain": {}}},
            "x-cli": {
                "command": "{ wc -c < ${:inputFile} | tr -d ' \\n'; printf ' %s %s' ${:inputFile} ${:outputFile}; } > ${:outputFile}",
                "bodyToFile": true,
                "fileToBody": true
            },
            "responses": {"200": {"description": "ok"}}
        }}
    }));

    let request = GatewayRequest::new(HttpMethod::Post, "/api/count")
        .with_header("Content-Type", "text/plain")
        .with_raw_body(b"12345");
    let response = gateway.dispatch_request(request).await;

    assert_eq!(response.status, 200);
    let body = response.body_text();
    let parts: Vec<&str> = body.split(' ').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "5");
    for path in &parts[1..] {
        assert!(Path::new(path).starts_with(std::env::temp_dir()));
        assert!(!Path::new(path).exists(), "{path} was not removed");
    }
}

#[tokio::test]
async fn test_output_file_name_without_file_to_body_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("report.txt");
    std::fs::write(&file, "user data").unwrap();
    let gateway = gateway(json!({
        "/report": {"get": {
            "x-cli": {
                "command": "echo from-stdout",
                "outputFileName": file.to_str().unwrap()
            },
            "responses": {"200": {"description": "ok", "content": {"text/plain": {}}}}
        }}
    }));

    let response = gateway.dispatch_request(get("/api/report")).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body_text(), "from-stdout\n");
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "user data");
}

#[tokio::test]
async fn test_input_file_removed_after_failed_command() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let gateway = gateway(json!({
        "/fail": {"post": {
            "requestBody": {"content": {"text/plain": {}}},
            "x-cli": {
                "command": "test -s ${:inputFile} && exit 3",
                "bodyToFile": true,
                "inputFileName": input.to_str().unwrap()
            },
            "responses": {
                "200": {"description": "ok"},
                "500": {"description": "failed", "content": {"text/plain": {"x-value": "conversion failed"}}}
            }
        }}
    }));

    let request = GatewayRequest::new(HttpMethod::Post, "/api/fail")
        .with_header("Content-Type", "text/plain")
        .with_raw_body(b"payload");
    let response = gateway.dispatch_request(request).await;

    assert_eq!(response.status, 500);
    assert_eq!(response.body_text(), "conversion failed");
    assert!(!input.exists());
}

#[tokio::test]
async fn test_input_file_removed_after_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("slow.txt");
    let gateway = gateway_with(
        json!({
            "/slow": {"post": {
                "requestBody": {"content": {"text/plain": {}}},
                "x-cli": {
                    "command": "sleep 5",
                    "bodyToFile": true,
                    "inputFileName": input.to_str().unwrap()
                },
                "responses": {"200": {"description": "ok"}}
            }}
        }),
        ShellCommandExecutor::new().with_timeout(Duration::from_millis(200)),
    );

    let request = GatewayRequest::new(HttpMethod::Post, "/api/slow")
        .with_header("Content-Type", "text/plain")
        .with_raw_body(b"payload");
    let response = gateway.dispatch_request(request).await;

    assert_eq!(response.status, 500);
    assert_eq!(response.body_text(), "Internal Server Error");
    assert!(!input.exists());
}

#[tokio::test]
async fn test_static_output_file_is_served_and_kept() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("static.txt");
    std::fs::write(&file, "static content").unwrap();
    let gateway = gateway(json!({
        "/static": {"get": {
            "x-cli": {"outputFileName": file.to_str().unwrap()},
            "responses": {"200": {"description": "ok", "content": {"text/plain": {}}}}
        }}
    }));

    let response = gateway.dispatch_request(get("/api/static")).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body_text(), "static content");
    assert!(file.exists());
}

#[tokio::test]
async fn test_unknown_symbol_is_internal_error() {
    let gateway = gateway(json!({
        "/typo": {"get": {
            "x-cli": {"command": "echo ${:nmae}"},
            "responses": {"200": {"description": "ok"}}
        }}
    }));

    let response = gateway.dispatch_request(get("/api/typo")).await;
    assert_eq!(response.status, 500);
    assert_eq!(response.body_text(), "Internal Server Error");
}

#[tokio::test]
async fn test_global_named_transforms() {
    let spec = ServiceSpec::from_document(json!({
        "swagger": "2.0",
        "basePath": "/v2",
        "x-transforms": {
            "level": {"low": "1", "high": "9"},
            "shout": "@uppercase"
        },
        "paths": {"/compress": {"post": {
            "parameters": [
                {"name": "level", "in": "formData", "x-transform": "level"},
                {"name": "label", "in": "formData", "x-transform": "shout"}
            ],
            "x-cli": {"command": "echo ${:level} ${:label} ${=level}"}
        }}}
    }))
    .unwrap();
    let gateway = Gateway::new(
        Arc::new(spec),
        Arc::new(ShellCommandExecutor::new()),
        HashMap::new(),
    )
    .unwrap();

    let request = GatewayRequest::new(HttpMethod::Post, "/v2/compress")
        .with_header("Content-Type", "application/x-www-form-urlencoded")
        .with_raw_body(b"level=high&label=fast");
    let response = gateway.dispatch_request(request).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body_text(), "9 FAST high\n");
}
