//! OpenAPI 3.0.x dialect

use serde_json::Value as JsonValue;

use crate::core::{Error, Result};
use crate::engine::transform::TransformSpec;
use crate::openapi::dialect::{SpecDialect, parse_security_table, resolve_ref};
use crate::openapi::types::{
    BodyContent, BodyDescriptor, ContentSpec, ParameterDescriptor, ParameterLocation,
    SecurityScheme,
};
use crate::openapi::VALUE_EXTENSION;

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenApi3;

impl OpenApi3 {
    fn server(document: &JsonValue) -> Option<&JsonValue> {
        document
            .get("servers")
            .and_then(JsonValue::as_array)
            .and_then(|servers| servers.first())
    }
}

impl SpecDialect for OpenApi3 {
    fn name(&self) -> &'static str {
        "OpenAPI 3"
    }

    fn validate(&self, document: &JsonValue) -> Result<()> {
        let servers = document.get("servers").and_then(JsonValue::as_array);
        if servers.map(Vec::len) != Some(1) {
            return Err(Error::config(
                "Property \"servers\" is missing or does not list exactly one server!",
            ));
        }
        if Self::server(document)
            .and_then(|server| server.pointer("/variables/basePath"))
            .is_none()
        {
            return Err(Error::config(
                "Variable \"basePath\" is missing at server object!",
            ));
        }
        Ok(())
    }

    fn base_path(&self, document: &JsonValue) -> String {
        Self::server(document)
            .and_then(|server| server.pointer("/variables/basePath/default"))
            .and_then(JsonValue::as_str)
            .filter(|base| !base.is_empty())
            .map(|base| format!("/{}", base.trim_start_matches('/')))
            .unwrap_or_default()
    }

    fn declared_port(&self, document: &JsonValue) -> Option<u16> {
        let url = Self::server(document)?.get("url")?.as_str()?;
        url::Url::parse(url).ok()?.port()
    }

    fn parameter_location(&self, location: &str) -> Option<ParameterLocation> {
        match location {
            "path" => Some(ParameterLocation::Path),
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            "cookie" => Some(ParameterLocation::Cookie),
            _ => None,
        }
    }

    fn body(
        &self,
        document: &JsonValue,
        operation: &JsonValue,
        _parameters: &[ParameterDescriptor],
    ) -> Result<Option<BodyDescriptor>> {
        let Some(request_body) = operation.get("requestBody") else {
            return Ok(None);
        };
        let request_body = resolve_ref(document, request_body)?;

        let contents = request_body
            .get("content")
            .and_then(JsonValue::as_object)
            .into_iter()
            .flatten()
            .map(|(media_type, entry)| {
                Ok(BodyContent {
                    media_type: Some(media_type.clone()),
                    transform: TransformSpec::from_object(entry)?,
                    schema: entry.get("schema").cloned(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(BodyDescriptor {
            required: request_body
                .get("required")
                .and_then(JsonValue::as_bool)
                .unwrap_or(false),
            contents,
        }))
    }

    fn response_contents(
        &self,
        _document: &JsonValue,
        response: &JsonValue,
    ) -> Result<Vec<ContentSpec>> {
        response
            .get("content")
            .and_then(JsonValue::as_object)
            .into_iter()
            .flatten()
            .map(|(media_type, entry)| {
                Ok(ContentSpec {
                    media_type: Some(media_type.clone()),
                    body_template: entry
                        .get(VALUE_EXTENSION)
                        .and_then(JsonValue::as_str)
                        .map(str::to_string),
                    transform: TransformSpec::from_object(entry)?,
                    schema: entry.get("schema").cloned(),
                })
            })
            .collect()
    }

    fn security_schemes(&self, document: &JsonValue) -> Result<Vec<SecurityScheme>> {
        parse_security_table(
            document,
            document
                .pointer("/components/securitySchemes")
                .and_then(JsonValue::as_object),
        )
    }
}
