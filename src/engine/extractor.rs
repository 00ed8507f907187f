//! Builds the parameter environment of a request

use std::path::PathBuf;

use serde_json::{Map as JsonMap, Value as JsonValue};
use uuid::Uuid;

use crate::core::{Error, GatewayRequest, RequestBody, Result};
use crate::engine::environment::{BODY, INPUT_FILE, OUTPUT_FILE, ParamValue, ParameterEnvironment};
use crate::engine::template::TemplateResolver;
use crate::engine::transform::{Transform, TransformRegistry};
use crate::openapi::{OperationDescriptor, ParameterDescriptor, ParameterLocation};

/// Environment and file paths produced for one request
#[derive(Debug, Clone)]
pub struct Extraction {
    pub environment: ParameterEnvironment,
    /// File the request input is written to (`bodyToFile`)
    pub input_file: Option<PathBuf>,
    /// File the response body is read from (`fileToBody`)
    pub output_file: Option<PathBuf>,
}

/// Extracts declared parameters and the body from a request
#[derive(Debug, Clone, Copy)]
pub struct ParameterExtractor<'a> {
    transforms: &'a TransformRegistry,
}

impl<'a> ParameterExtractor<'a> {
    pub fn new(transforms: &'a TransformRegistry) -> Self {
        Self { transforms }
    }

    /// Binds `=name`/`:name` for every declared parameter, `=body`/`:body`
    /// for a declared body and the file pseudo-parameters.
    ///
    /// Fails as a whole when a required parameter is missing; nothing is
    /// templated before every parameter has been extracted.
    pub fn extract(
        &self,
        operation: &OperationDescriptor,
        request: &GatewayRequest,
    ) -> Result<Extraction> {
        let mut environment = ParameterEnvironment::new();
        let mut missing = Vec::new();

        for param in &operation.parameters {
            if param.location == ParameterLocation::Body {
                continue;
            }
            let raw = raw_value(param, request);
            if raw.is_none() && param.is_required() {
                missing.push(param.name.clone());
                continue;
            }
            let raw = ParamValue::from_optional(raw);
            let transformed = self.transforms.resolve(&param.transform)?.apply(&raw);
            environment.bind_parameter(&param.variable_name(), raw, transformed);
        }

        if !missing.is_empty() {
            return Err(Error::parameter_value(format!(
                "Missing required parameters: {}",
                missing.join(", ")
            )));
        }

        if let Some(body) = &operation.body {
            let raw = body_value(&request.body);
            if raw.is_undefined() && body.required {
                return Err(Error::parameter_value("Missing required request body"));
            }
            let transform = match body.content_for(request.content_type()) {
                Some(content) => self.transforms.resolve(&content.transform)?,
                None => Transform::Identity,
            };
            let transformed = transform.apply(&raw);
            environment.bind_parameter(BODY, raw, transformed);
        }

        let mut extraction = Extraction {
            environment,
            input_file: None,
            output_file: None,
        };

        let Some(cli) = &operation.cli else {
            return Ok(extraction);
        };

        if cli.body_to_file {
            let path = self.file_path(&extraction.environment, cli.input_file_name.as_deref(), "in")?;
            extraction
                .environment
                .bind_both(INPUT_FILE, ParamValue::text(path.to_string_lossy()));
            extraction.input_file = Some(path);
        }
        if cli.file_to_body() {
            let path =
                self.file_path(&extraction.environment, cli.output_file_name.as_deref(), "out")?;
            extraction
                .environment
                .bind_both(OUTPUT_FILE, ParamValue::text(path.to_string_lossy()));
            extraction.output_file = Some(path);
        }

        Ok(extraction)
    }

    /// Resolves a configured file name template, or allocates a unique path in
    /// the temp directory
    fn file_path(
        &self,
        environment: &ParameterEnvironment,
        template: Option<&str>,
        prefix: &str,
    ) -> Result<PathBuf> {
        match template {
            Some(template) => TemplateResolver::new(environment)
                .resolve(template)
                .map(PathBuf::from),
            None => Ok(std::env::temp_dir().join(format!("clapi-{prefix}-{}", Uuid::new_v4()))),
        }
    }
}

fn raw_value(param: &ParameterDescriptor, request: &GatewayRequest) -> Option<String> {
    match param.location {
        ParameterLocation::Path => request.path_params.get(&param.name).cloned(),
        ParameterLocation::Query => request.query.get(&param.name).cloned(),
        ParameterLocation::Header => request.header(&param.name).map(str::to_string),
        ParameterLocation::Cookie => request.cookie(&param.name).map(str::to_string),
        ParameterLocation::FormData => request.body.field(&param.name),
        ParameterLocation::Body => None,
    }
}

fn body_value(body: &RequestBody) -> ParamValue {
    match body {
        RequestBody::Empty => ParamValue::Undefined,
        RequestBody::Json(value) => ParamValue::Json(value.clone()),
        RequestBody::Text(text) => ParamValue::text(text.clone()),
        RequestBody::Form(fields) => ParamValue::Json(JsonValue::Object(
            fields
                .iter()
                .map(|(name, value)| (name.clone(), JsonValue::String(value.clone())))
                .collect::<JsonMap<_, _>>(),
        )),
        RequestBody::Binary(bytes) => ParamValue::Binary(bytes.clone()),
    }
}
