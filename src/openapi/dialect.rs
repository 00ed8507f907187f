//! Dialect seam between OpenAPI 3.0.x and Swagger 2.0 documents
//!
//! Everything both dialects share (paths, operations, parameter lists,
//! responses, `x-cli`) is parsed by [`ServiceSpec`](super::ServiceSpec).
//! The trait covers the places where the two formats disagree.

use serde_json::{Map as JsonMap, Value as JsonValue};
use std::fmt;

use crate::core::{Error, Result};
use crate::openapi::openapi3::OpenApi3;
use crate::openapi::swagger2::Swagger2;
use crate::openapi::types::{
    BodyDescriptor, ConnectorConfig, ContentSpec, ParameterDescriptor, ParameterLocation,
    SecurityScheme,
};

/// Extension key of a security scheme's credential store
pub const CONNECTOR_EXTENSION: &str = "x-connector";

/// Dialect-specific parts of reading a service description
pub trait SpecDialect: Send + Sync + fmt::Debug {
    /// Human readable dialect name
    fn name(&self) -> &'static str;

    /// Checks dialect-specific structure, e.g. the server list
    fn validate(&self, document: &JsonValue) -> Result<()>;

    /// URL prefix under which all operations are served, possibly empty
    fn base_path(&self, document: &JsonValue) -> String;

    /// Port declared in the server URL or host, if any
    fn declared_port(&self, document: &JsonValue) -> Option<u16>;

    /// Maps an `in` value to a parameter location
    fn parameter_location(&self, location: &str) -> Option<ParameterLocation>;

    /// Builds the request body of an operation
    fn body(
        &self,
        document: &JsonValue,
        operation: &JsonValue,
        parameters: &[ParameterDescriptor],
    ) -> Result<Option<BodyDescriptor>>;

    /// Builds the media type entries of a (dereferenced) response object
    fn response_contents(&self, document: &JsonValue, response: &JsonValue)
    -> Result<Vec<ContentSpec>>;

    /// Lists the declared security schemes in declaration order
    fn security_schemes(&self, document: &JsonValue) -> Result<Vec<SecurityScheme>>;
}

/// Picks the dialect of a document.
///
/// `openapi` values starting with `3.0` select OpenAPI 3, `swagger: "2.0"`
/// selects Swagger 2. Anything else is rejected.
pub fn detect(document: &JsonValue) -> Result<Box<dyn SpecDialect>> {
    if document.get("swagger").and_then(JsonValue::as_str) == Some("2.0") {
        return Ok(Box::new(Swagger2));
    }
    if document
        .get("openapi")
        .and_then(JsonValue::as_str)
        .is_some_and(|version| version.starts_with("3.0"))
    {
        return Ok(Box::new(OpenApi3));
    }
    Err(Error::config("Unsupported specification version"))
}

/// Follows a local `$ref`, returning the value itself when it is not a reference
pub fn resolve_ref<'a>(document: &'a JsonValue, value: &'a JsonValue) -> Result<&'a JsonValue> {
    let mut current = value;
    // Bounded so that self-referencing pointers cannot loop forever
    for _ in 0..32 {
        let Some(reference) = current.get("$ref").and_then(JsonValue::as_str) else {
            return Ok(current);
        };
        let pointer = reference.strip_prefix('#').ok_or_else(|| {
            Error::config(format!("External references not supported: {reference}"))
        })?;
        current = document.pointer(pointer).ok_or_else(|| {
            Error::config(format!("Unable to resolve reference: {reference}"))
        })?;
    }
    Err(Error::config("Reference chain too deep"))
}

/// Parses one entry of a security scheme table
pub fn parse_security_scheme(name: &str, value: &JsonValue) -> Result<SecurityScheme> {
    let kind = value
        .get("type")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| Error::config(format!("Security scheme '{name}' has no type")))?;
    let connector = value
        .get(CONNECTOR_EXTENSION)
        .map(|connector| {
            serde_json::from_value::<ConnectorConfig>(connector.clone()).map_err(|err| {
                Error::config(format!("Invalid connector of security scheme '{name}': {err}"))
            })
        })
        .transpose()?;

    Ok(SecurityScheme {
        name: name.to_string(),
        kind: kind.to_string(),
        scheme: string_field(value, "scheme").map(|scheme| scheme.to_ascii_lowercase()),
        location: string_field(value, "in"),
        parameter_name: string_field(value, "name"),
        connector,
    })
}

/// Parses every entry of a security scheme table
pub(crate) fn parse_security_table(
    document: &JsonValue,
    table: Option<&JsonMap<String, JsonValue>>,
) -> Result<Vec<SecurityScheme>> {
    table
        .into_iter()
        .flatten()
        .map(|(name, value)| parse_security_scheme(name, resolve_ref(document, value)?))
        .collect()
}

pub(crate) fn string_field(value: &JsonValue, key: &str) -> Option<String> {
    value.get(key).and_then(JsonValue::as_str).map(str::to_string)
}
