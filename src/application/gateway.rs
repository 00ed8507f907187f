//! Use case for serving one HTTP operation with one command execution

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::application::{AuthCheck, CommandExecutor};
use crate::core::{CommandOutput, Error, GatewayRequest, GatewayResponse, HttpMethod, Result};
use crate::engine::environment::{BODY, ERROR, OUTPUT};
use crate::engine::{ParamValue, ParameterExtractor, ResponseMapper, TemplateResolver, select};
use crate::openapi::{OperationDescriptor, ServiceSpec};

/// Removes tracked files when dropped
#[derive(Debug, Default)]
struct TempFiles {
    paths: Vec<PathBuf>,
}

impl TempFiles {
    fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => warn!("Failed to remove {}: {err}", path.display()),
            }
        }
    }
}

/// Dispatches requests to the operations of a service description
pub struct Gateway {
    spec: Arc<ServiceSpec>,
    executor: Arc<dyn CommandExecutor>,
    security: HashMap<String, Arc<dyn AuthCheck>>,
}

impl Gateway {
    /// Creates the gateway, checking that every enforced security scheme has
    /// a check
    pub fn new(
        spec: Arc<ServiceSpec>,
        executor: Arc<dyn CommandExecutor>,
        security: HashMap<String, Arc<dyn AuthCheck>>,
    ) -> Result<Self> {
        for operation in spec.operations() {
            if let Some(name) = spec.operation_securities(operation).first() {
                if !security.contains_key(name) {
                    return Err(Error::config(format!(
                        "No security check available for scheme '{name}' used by {}",
                        operation.label()
                    )));
                }
            }
        }
        Ok(Self {
            spec,
            executor,
            security,
        })
    }

    pub fn spec(&self) -> &Arc<ServiceSpec> {
        &self.spec
    }

    /// Serves the operation declared at a path template and method.
    ///
    /// Never fails: authentication failures become 401 with the check's
    /// reason, every other error is logged and becomes a plain 500.
    pub async fn dispatch(
        &self,
        path: &str,
        method: HttpMethod,
        request: &GatewayRequest,
    ) -> GatewayResponse {
        match self.spec.operation(path, method) {
            Some(operation) => self.run(operation, request).await,
            None => GatewayResponse::not_found(method, path),
        }
    }

    /// Serves a request by its concrete path, for transports without routing
    pub async fn dispatch_request(&self, request: GatewayRequest) -> GatewayResponse {
        let Some((operation, params)) = self.spec.locate(request.method, &request.path) else {
            return GatewayResponse::not_found(request.method, &request.path);
        };
        let request = request.with_path_params(params);
        self.run(operation, &request).await
    }

    async fn run(&self, operation: &OperationDescriptor, request: &GatewayRequest) -> GatewayResponse {
        match self.handle(operation, request).await {
            Ok(response) => response,
            Err(Error::Auth(reason)) => {
                debug!("Rejected {}: {reason}", operation.label());
                GatewayResponse::unauthorized(reason)
            }
            Err(err) => {
                error!("Error during execution of {}: {err}", operation.label());
                GatewayResponse::internal_error()
            }
        }
    }

    async fn handle(
        &self,
        operation: &OperationDescriptor,
        request: &GatewayRequest,
    ) -> Result<GatewayResponse> {
        if let Some(name) = self.spec.operation_securities(operation).first() {
            let check = self.security.get(name).ok_or_else(|| {
                Error::config(format!("No security check available for scheme '{name}'"))
            })?;
            check.check(request).await?;
        }

        let cli = operation.cli.as_ref().ok_or_else(|| {
            Error::config(format!("No CLI options defined for {}", operation.label()))
        })?;

        let extraction = ParameterExtractor::new(self.spec.transforms()).extract(operation, request)?;
        let mut temp_files = TempFiles::default();
        if let Some(path) = &extraction.input_file {
            temp_files.track(path.clone());
        }

        let (command, mut input) = {
            let resolver = TemplateResolver::new(&extraction.environment);
            let command = resolver.resolve_optional(cli.command.as_deref())?;
            let input = match &cli.input {
                Some(template) => Some(resolver.resolve(template)?.into_bytes()),
                None => extraction
                    .environment
                    .transformed(BODY)
                    .and_then(ParamValue::to_bytes),
            };
            (command, input)
        };

        if let Some(path) = &extraction.input_file {
            tokio::fs::write(path, input.take().unwrap_or_default()).await?;
        }

        let output = match &command {
            Some(command) => {
                if let Some(path) = &extraction.output_file {
                    temp_files.track(path.clone());
                }
                debug!("Executing command for {}: {command}", operation.label());
                let output = self.executor.execute(command, input).await?;
                debug!("Command finished with exit code {}", output.exit_code);
                output
            }
            None if extraction.output_file.is_some() => CommandOutput::default(),
            None => {
                return Err(Error::config(format!(
                    "x-cli information inconsistent for {}",
                    operation.label()
                )));
            }
        };

        let mut environment = extraction.environment;
        environment.bind_both(OUTPUT, ParamValue::from_bytes(output.stdout.clone()));
        environment.bind_both(ERROR, ParamValue::from_bytes(output.stderr.clone()));

        let selected = select(&operation.responses, output.exit_code);
        ResponseMapper::new(self.spec.transforms())
            .render(
                &selected,
                &environment,
                request.header("accept"),
                &output,
                extraction.output_file.as_deref(),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::shell::command_executor::MockCommandExecutor;
    use async_trait::async_trait;
    use serde_json::json;
    use tracing_test::traced_test;

    struct RejectAll;

    #[async_trait]
    impl AuthCheck for RejectAll {
        async fn check(&self, _request: &GatewayRequest) -> Result<()> {
            Err(Error::auth("Unauthorized (missing API Key)"))
        }
    }

    fn spec(security: bool) -> Arc<ServiceSpec> {
        let mut document = json!({
            "openapi": "3.0.0",
            "servers": [{"url": "/", "variables": {"basePath": {"default": "api"}}}],
            "components": {"securitySchemes": {"key": {"type": "apiKey", "in": "header", "name": "X-Key"}}},
            "paths": {
                "/echo": {
                    "post": {
                        "parameters": [{"name": "requiredArg", "in": "query", "required": true}],
                        "x-cli": {"command": "echo ${:requiredArg}"},
                        "responses": {
                            "200": {"description": "ok", "content": {"text/plain": {}}},
                            "404": {"description": "not found", "x-code": 1}
                        }
                    }
                },
                "/missing": {
                    "get": {"x-cli": {"command": "echo ${:nothing}"}}
                }
            }
        });
        if security {
            document["security"] = json!([{"key": []}]);
        }
        Arc::new(ServiceSpec::from_document(document).unwrap())
    }

    fn gateway(executor: Arc<MockCommandExecutor>, security: bool) -> Gateway {
        let mut checks: HashMap<String, Arc<dyn AuthCheck>> = HashMap::new();
        if security {
            checks.insert("key".to_string(), Arc::new(RejectAll));
        }
        Gateway::new(spec(security), executor, checks).unwrap()
    }

    fn echo_request(value: &str) -> GatewayRequest {
        GatewayRequest::new(HttpMethod::Post, "/api/echo").with_query("requiredArg", value)
    }

    #[tokio::test]
    async fn test_dispatch_renders_command() {
        let executor = Arc::new(MockCommandExecutor::new().with_result("echo value", 0, "value\n", ""));
        let gateway = gateway(executor.clone(), false);

        let response = gateway
            .dispatch("/echo", HttpMethod::Post, &echo_request("value"))
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body_text(), "value\n");
        assert_eq!(executor.calls(), vec![("echo value".to_string(), None)]);
    }

    #[tokio::test]
    async fn test_exit_code_mapping() {
        let executor = Arc::new(MockCommandExecutor::new().with_result("echo x", 1, "", "no such item"));
        let gateway = gateway(executor, false);

        let response = gateway
            .dispatch("/echo", HttpMethod::Post, &echo_request("x"))
            .await;
        assert_eq!(response.status, 404);
        assert_eq!(response.body_text(), "no such item");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_unknown_parameter_becomes_internal_error() {
        let executor = Arc::new(MockCommandExecutor::new());
        let gateway = gateway(executor.clone(), false);
        let request = GatewayRequest::new(HttpMethod::Get, "/api/missing");

        let response = gateway.dispatch("/missing", HttpMethod::Get, &request).await;
        assert_eq!(response.status, 500);
        assert_eq!(response.body_text(), "Internal Server Error");
        assert!(executor.calls().is_empty());
        assert!(logs_contain("Unknown parameters: :nothing"));
    }

    #[tokio::test]
    async fn test_execution_error_becomes_internal_error() {
        let executor = Arc::new(MockCommandExecutor::new());
        let gateway = gateway(executor, false);

        let response = gateway
            .dispatch("/echo", HttpMethod::Post, &echo_request("unscripted"))
            .await;
        assert_eq!(response.status, 500);
    }

    #[tokio::test]
    async fn test_auth_failure_short_circuits() {
        let executor = Arc::new(MockCommandExecutor::new());
        let gateway = gateway(executor.clone(), true);

        let response = gateway
            .dispatch("/echo", HttpMethod::Post, &echo_request("x"))
            .await;
        assert_eq!(response.status, 401);
        assert_eq!(response.body_text(), "Unauthorized (missing API Key)");
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_request_locates_operation() {
        let executor = Arc::new(MockCommandExecutor::new().with_result("echo x", 0, "x", ""));
        let gateway = gateway(executor, false);

        let request = GatewayRequest::new(HttpMethod::Get, "/api/nowhere");
        let response = gateway.dispatch_request(request).await;
        assert_eq!(response.status, 404);
        assert_eq!(
            response.body_text(),
            "Unable to locate operation: [GET] /api/nowhere"
        );

        assert_eq!(gateway.dispatch_request(echo_request("x")).await.status, 200);
    }

    #[test]
    fn test_missing_security_check_fails_construction() {
        let executor: Arc<dyn CommandExecutor> = Arc::new(MockCommandExecutor::new());
        let result = Gateway::new(spec(true), executor, HashMap::new());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
