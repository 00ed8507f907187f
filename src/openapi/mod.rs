//! Service description adapter
//!
//! [`ServiceSpec`] parses an OpenAPI 3.0.x or Swagger 2.0 document into
//! dialect-neutral descriptors once at load time. Request handling only reads
//! those descriptors; the raw document stays available for tooling.

pub mod dialect;
pub mod openapi3;
pub mod swagger2;
pub mod types;

use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::HashMap;

use crate::core::{Error, HttpMethod, Result, utils};
use crate::engine::transform::{TransformRegistry, TransformSpec};

pub use dialect::{SpecDialect, detect};
pub use types::{
    BodyContent, BodyDescriptor, CliConfig, ConnectorConfig, ContentSpec, CsvOptions, HeaderSpec,
    OperationDescriptor, ParameterDescriptor, ParameterLocation, ResponseSpec, SecurityScheme,
};

/// Extension key of an operation's CLI binding
pub const CLI_EXTENSION: &str = "x-cli";
/// Extension key of response bodies and header values
pub const VALUE_EXTENSION: &str = "x-value";
/// Extension key of the exit code a response is selected for
pub const CODE_EXTENSION: &str = "x-code";
/// Extension key of the TLS settings
pub const SSL_EXTENSION: &str = "x-ssl";

/// A loaded and validated CLI service description
#[derive(Debug)]
pub struct ServiceSpec {
    document: JsonValue,
    dialect: Box<dyn SpecDialect>,
    operations: Vec<OperationDescriptor>,
    security_schemes: IndexMap<String, SecurityScheme>,
    global_security: Vec<String>,
    transforms: TransformRegistry,
}

impl ServiceSpec {
    /// Parses and validates a document.
    pub fn from_document(document: JsonValue) -> Result<Self> {
        let spec = Self::parse(document)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parses a document without validating the CLI bindings.
    pub fn parse(document: JsonValue) -> Result<Self> {
        let dialect = detect(&document)?;
        let transforms = TransformRegistry::from_document(&document)?;
        let operations = parse_operations(&document, dialect.as_ref())?;
        tracing::debug!(
            "{} document declares {} operations",
            dialect.name(),
            operations.len()
        );

        let security_schemes = dialect
            .security_schemes(&document)?
            .into_iter()
            .map(|scheme| (scheme.name.clone(), scheme))
            .collect();
        let global_security = security_names(document.get("security"));

        Ok(Self {
            document,
            dialect,
            operations,
            security_schemes,
            global_security,
            transforms,
        })
    }

    /// Checks everything that must hold before the service accepts traffic.
    ///
    /// Every operation needs an `x-cli` binding with a command or an output
    /// file, the dialect's structural rules must hold, every transform must
    /// resolve and every referenced security scheme must be declared.
    pub fn validate(&self) -> Result<()> {
        if !self.document.get("paths").is_some_and(JsonValue::is_object) {
            return Err(Error::config("No paths defined in OpenAPI specification."));
        }

        for operation in &self.operations {
            let Some(cli) = &operation.cli else {
                return Err(Error::config(format!(
                    "No CLI options defined for method {} in path {}",
                    operation.method, operation.path
                )));
            };
            if cli.command.is_none() && cli.output_file_name.is_none() {
                return Err(Error::config(format!(
                    "No command or outputFileName defined for method {} in path {}",
                    operation.method, operation.path
                )));
            }
        }

        self.dialect.validate(&self.document)?;

        for operation in &self.operations {
            for spec in transform_specs(operation) {
                self.transforms.resolve(spec).map_err(|err| {
                    Error::transform(format!("{}: {err}", operation.label()))
                })?;
            }
            for name in self.operation_securities(operation) {
                if !self.security_schemes.contains_key(&name) {
                    return Err(Error::config(format!(
                        "Security scheme '{name}' used by {} is not declared",
                        operation.label()
                    )));
                }
            }
        }
        Ok(())
    }

    /// The raw document
    pub fn document(&self) -> &JsonValue {
        &self.document
    }

    pub fn dialect(&self) -> &dyn SpecDialect {
        self.dialect.as_ref()
    }

    pub fn transforms(&self) -> &TransformRegistry {
        &self.transforms
    }

    /// Title from the info object, if any
    pub fn title(&self) -> Option<&str> {
        self.document.get("info")?.get("title")?.as_str()
    }

    /// All operations in declaration order
    pub fn operations(&self) -> &[OperationDescriptor] {
        &self.operations
    }

    /// Invokes `visit` for every operation in declaration order
    pub fn for_each_operation<F>(&self, mut visit: F)
    where
        F: FnMut(&str, HttpMethod, &OperationDescriptor),
    {
        for operation in &self.operations {
            visit(&operation.path, operation.method, operation);
        }
    }

    /// Looks up the operation declared at a path template and method
    pub fn operation(&self, path: &str, method: HttpMethod) -> Option<&OperationDescriptor> {
        self.operations
            .iter()
            .find(|operation| operation.path == path && operation.method == method)
    }

    /// Invokes `visit` for each parameter of an operation: path-level first,
    /// then operation-level. Header names are passed lower-cased.
    pub fn for_each_operation_parameter<F>(&self, path: &str, method: HttpMethod, mut visit: F)
    where
        F: FnMut(&str, &ParameterDescriptor),
    {
        let Some(operation) = self.operation(path, method) else {
            return;
        };
        for param in &operation.parameters {
            if param.location == ParameterLocation::Header {
                visit(&param.name.to_ascii_lowercase(), param);
            } else {
                visit(&param.name, param);
            }
        }
    }

    /// The request body of an operation, if one is declared
    pub fn body_spec(&self, path: &str, method: HttpMethod) -> Option<&BodyDescriptor> {
        self.operation(path, method)?.body.as_ref()
    }

    /// Picks the content entry of a response for a chosen content type
    pub fn response_content<'a>(
        &self,
        response: &'a ResponseSpec,
        content_type: Option<&str>,
    ) -> Option<&'a ContentSpec> {
        response.content_for(content_type)
    }

    /// Invokes `visit` for every declared security scheme
    pub fn for_each_security_scheme<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&str, &SecurityScheme) -> Result<()>,
    {
        for (name, scheme) in &self.security_schemes {
            visit(name, scheme)?;
        }
        Ok(())
    }

    pub fn security_scheme(&self, name: &str) -> Option<&SecurityScheme> {
        self.security_schemes.get(name)
    }

    /// Security requirement names of an operation: global ones first, then
    /// the operation's own, without duplicates
    pub fn operation_securities(&self, operation: &OperationDescriptor) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.global_security.iter().chain(&operation.security) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// URL prefix of every operation, possibly empty
    pub fn base_path(&self) -> String {
        self.dialect.base_path(&self.document)
    }

    /// Whether TLS settings (`x-ssl`) are present
    pub fn uses_https(&self) -> bool {
        self.document
            .get(SSL_EXTENSION)
            .is_some_and(|ssl| !ssl.is_null() && ssl != &JsonValue::Bool(false))
    }

    /// The listening port: the declared one, else 443 with TLS settings, else 80
    pub fn port(&self) -> u16 {
        self.dialect
            .declared_port(&self.document)
            .unwrap_or(if self.uses_https() { 443 } else { 80 })
    }

    /// Finds the operation serving a concrete request path.
    ///
    /// The base path is stripped first. Templates without parameters win
    /// over parameterized ones; otherwise declaration order decides.
    pub fn locate(
        &self,
        method: HttpMethod,
        request_path: &str,
    ) -> Option<(&OperationDescriptor, HashMap<String, String>)> {
        let base_path = self.base_path();
        let relative = request_path.strip_prefix(base_path.as_str())?;
        let relative = if relative.is_empty() { "/" } else { relative };

        let mut candidates = self
            .operations
            .iter()
            .filter(|operation| operation.method == method)
            .filter_map(|operation| {
                utils::match_path_template(&operation.path, relative)
                    .map(|params| (operation, params))
            });

        let first = candidates.next()?;
        if first.1.is_empty() {
            return Some(first);
        }
        Some(
            candidates
                .find(|(_, params)| params.is_empty())
                .unwrap_or(first),
        )
    }
}

fn parse_operations(
    document: &JsonValue,
    dialect: &dyn SpecDialect,
) -> Result<Vec<OperationDescriptor>> {
    let Some(paths) = document.get("paths").and_then(JsonValue::as_object) else {
        return Ok(Vec::new());
    };

    let mut operations = Vec::new();
    for (path, path_item) in paths {
        let path_item = dialect::resolve_ref(document, path_item)?;
        for method in HttpMethod::all() {
            if let Some(operation) = path_item.get(method.as_str()).filter(|op| op.is_object()) {
                operations.push(build_operation(
                    document, dialect, path, *method, path_item, operation,
                )?);
            }
        }
    }
    Ok(operations)
}

fn build_operation(
    document: &JsonValue,
    dialect: &dyn SpecDialect,
    path: &str,
    method: HttpMethod,
    path_item: &JsonValue,
    operation: &JsonValue,
) -> Result<OperationDescriptor> {
    let mut parameters = parse_parameters(document, dialect, path_item)?;
    parameters.extend(parse_parameters(document, dialect, operation)?);

    let body = dialect.body(document, operation, &parameters)?;

    let responses = operation
        .get("responses")
        .and_then(JsonValue::as_object)
        .into_iter()
        .flatten()
        .map(|(status, response)| {
            let response = dialect::resolve_ref(document, response)?;
            parse_response(document, dialect, status, response).map(|r| (status.clone(), r))
        })
        .collect::<Result<IndexMap<_, _>>>()?;

    let cli = operation
        .get(CLI_EXTENSION)
        .map(|cli| {
            serde_json::from_value::<CliConfig>(cli.clone()).map_err(|err| {
                Error::config(format!(
                    "Invalid CLI options for method {method} in path {path}: {err}"
                ))
            })
        })
        .transpose()?;

    Ok(OperationDescriptor {
        path: path.to_string(),
        method,
        operation_id: dialect::string_field(operation, "operationId"),
        parameters,
        body,
        responses,
        cli,
        security: security_names(operation.get("security")),
    })
}

fn parse_parameters(
    document: &JsonValue,
    dialect: &dyn SpecDialect,
    owner: &JsonValue,
) -> Result<Vec<ParameterDescriptor>> {
    owner
        .get("parameters")
        .and_then(JsonValue::as_array)
        .into_iter()
        .flatten()
        .map(|param| parse_parameter(dialect, dialect::resolve_ref(document, param)?))
        .collect()
}

fn parse_parameter(dialect: &dyn SpecDialect, param: &JsonValue) -> Result<ParameterDescriptor> {
    let name = param
        .get("name")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| Error::config("Parameter missing name"))?;
    let raw_location = param.get("in").and_then(JsonValue::as_str).unwrap_or("");
    let location = dialect.parameter_location(raw_location).ok_or_else(|| {
        Error::config(format!(
            "Unsupported location '{raw_location}' of parameter '{name}' in {} document",
            dialect.name()
        ))
    })?;

    Ok(ParameterDescriptor {
        name: name.to_string(),
        location,
        required: param
            .get("required")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false),
        transform: TransformSpec::from_object(param)?,
        schema: param.get("schema").cloned(),
    })
}

fn parse_response(
    document: &JsonValue,
    dialect: &dyn SpecDialect,
    status: &str,
    response: &JsonValue,
) -> Result<ResponseSpec> {
    let exit_code = match response.get(CODE_EXTENSION) {
        None | Some(JsonValue::Null) => None,
        Some(code) => {
            let parsed = match code {
                JsonValue::Number(code) => code.as_i64().and_then(|code| i32::try_from(code).ok()),
                JsonValue::String(code) => code.trim().parse().ok(),
                _ => None,
            };
            if parsed.is_none() {
                tracing::warn!("Ignoring non-integer {CODE_EXTENSION} of response {status}");
            }
            parsed
        }
    };

    let headers = response
        .get("headers")
        .and_then(JsonValue::as_object)
        .map(parse_headers)
        .unwrap_or_default();

    Ok(ResponseSpec {
        status: status.to_string(),
        exit_code,
        headers,
        contents: dialect.response_contents(document, response)?,
    })
}

fn parse_headers(headers: &JsonMap<String, JsonValue>) -> IndexMap<String, HeaderSpec> {
    headers
        .iter()
        .map(|(name, header)| {
            (
                name.clone(),
                HeaderSpec {
                    value_template: header
                        .get(VALUE_EXTENSION)
                        .and_then(JsonValue::as_str)
                        .map(str::to_string),
                },
            )
        })
        .collect()
}

/// First key of each security requirement object
fn security_names(security: Option<&JsonValue>) -> Vec<String> {
    security
        .and_then(JsonValue::as_array)
        .into_iter()
        .flatten()
        .filter_map(|requirement| requirement.as_object()?.keys().next().cloned())
        .collect()
}

fn transform_specs(operation: &OperationDescriptor) -> impl Iterator<Item = &TransformSpec> {
    let parameters = operation.parameters.iter().map(|param| &param.transform);
    let body = operation
        .body
        .iter()
        .flat_map(|body| body.contents.iter().map(|content| &content.transform));
    let responses = operation
        .responses
        .values()
        .flat_map(|response| response.contents.iter().map(|content| &content.transform));
    parameters.chain(body).chain(responses)
}
