//! Swagger 2.0 dialect

use serde_json::Value as JsonValue;

use crate::core::Result;
use crate::engine::transform::TransformSpec;
use crate::openapi::VALUE_EXTENSION;
use crate::openapi::dialect::{SpecDialect, parse_security_table};
use crate::openapi::types::{
    BodyContent, BodyDescriptor, ContentSpec, ParameterDescriptor, ParameterLocation,
    SecurityScheme,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct Swagger2;

impl SpecDialect for Swagger2 {
    fn name(&self) -> &'static str {
        "Swagger 2"
    }

    fn validate(&self, _document: &JsonValue) -> Result<()> {
        Ok(())
    }

    fn base_path(&self, document: &JsonValue) -> String {
        document
            .get("basePath")
            .and_then(JsonValue::as_str)
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_default()
    }

    fn declared_port(&self, document: &JsonValue) -> Option<u16> {
        let host = document.get("host")?.as_str()?;
        url::Url::parse(&format!("http://{host}")).ok()?.port()
    }

    fn parameter_location(&self, location: &str) -> Option<ParameterLocation> {
        match location {
            "path" => Some(ParameterLocation::Path),
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            "body" => Some(ParameterLocation::Body),
            "formData" => Some(ParameterLocation::FormData),
            _ => None,
        }
    }

    /// The last `in: body` parameter describes the body
    fn body(
        &self,
        _document: &JsonValue,
        _operation: &JsonValue,
        parameters: &[ParameterDescriptor],
    ) -> Result<Option<BodyDescriptor>> {
        Ok(parameters
            .iter()
            .rev()
            .find(|param| param.location == ParameterLocation::Body)
            .map(|param| BodyDescriptor {
                required: param.required,
                contents: vec![BodyContent {
                    media_type: None,
                    transform: param.transform.clone(),
                    schema: param.schema.clone(),
                }],
            }))
    }

    /// The response object itself is the single content entry
    fn response_contents(
        &self,
        _document: &JsonValue,
        response: &JsonValue,
    ) -> Result<Vec<ContentSpec>> {
        Ok(vec![ContentSpec {
            media_type: None,
            body_template: response
                .get(VALUE_EXTENSION)
                .and_then(JsonValue::as_str)
                .map(str::to_string),
            transform: TransformSpec::from_object(response)?,
            schema: response.get("schema").cloned(),
        }])
    }

    /// `type: basic` is normalized to `http` with scheme `basic`
    fn security_schemes(&self, document: &JsonValue) -> Result<Vec<SecurityScheme>> {
        let mut schemes = parse_security_table(
            document,
            document
                .get("securityDefinitions")
                .and_then(JsonValue::as_object),
        )?;
        for scheme in schemes.iter_mut().filter(|scheme| scheme.kind == "basic") {
            scheme.kind = "http".to_string();
            scheme.scheme = Some("basic".to_string());
        }
        Ok(schemes)
    }
}
