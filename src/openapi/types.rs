//! Dialect-neutral descriptors of a CLI service description

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::core::HttpMethod;
use crate::core::{media_type, utils};
use crate::engine::transform::TransformSpec;

/// Where a parameter is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
    /// Swagger 2 body parameter
    Body,
    /// Swagger 2 form field
    FormData,
}

/// A declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub transform: TransformSpec,
    pub schema: Option<JsonValue>,
}

impl ParameterDescriptor {
    /// Path parameters are required regardless of the declaration
    pub fn is_required(&self) -> bool {
        self.required || self.location == ParameterLocation::Path
    }

    /// Name under which the parameter is bound in templates.
    ///
    /// Header names are lower-cased and camel-cased (`X-Request-Id` becomes
    /// `xRequestId`), all other names are used as declared.
    pub fn variable_name(&self) -> String {
        match self.location {
            ParameterLocation::Header => utils::header_variable_name(&self.name),
            _ => self.name.clone(),
        }
    }
}

/// One media type a request body can be sent as
#[derive(Debug, Clone, PartialEq)]
pub struct BodyContent {
    /// `None` for Swagger 2 bodies, which carry no media type
    pub media_type: Option<String>,
    pub transform: TransformSpec,
    pub schema: Option<JsonValue>,
}

/// The request body of an operation
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDescriptor {
    pub required: bool,
    pub contents: Vec<BodyContent>,
}

impl BodyDescriptor {
    /// Picks the body content for a request content type.
    ///
    /// The first declared media type matching the content type wins; entries
    /// without a media type match anything.
    pub fn content_for(&self, content_type: Option<&str>) -> Option<&BodyContent> {
        self.contents.iter().find(|content| match &content.media_type {
            None => true,
            Some(declared) => content_type
                .map(|actual| media_type::matches(actual, declared))
                .unwrap_or(false),
        })
    }
}

/// A response media type entry
#[derive(Debug, Clone, PartialEq)]
pub struct ContentSpec {
    pub media_type: Option<String>,
    /// Body template from `x-value`
    pub body_template: Option<String>,
    pub transform: TransformSpec,
    pub schema: Option<JsonValue>,
}

impl ContentSpec {
    /// The content type implied by this entry: its media type, or one derived
    /// from the schema (`object` is JSON, a non-binary `string` is plain text)
    pub fn implied_content_type(&self) -> Option<String> {
        if let Some(media) = &self.media_type {
            return Some(media.clone());
        }
        let schema = self.schema.as_ref()?;
        match schema.get("type").and_then(JsonValue::as_str) {
            Some("object") => Some(mime::APPLICATION_JSON.to_string()),
            Some("string") if schema.get("format").and_then(JsonValue::as_str) != Some("binary") => {
                Some(mime::TEXT_PLAIN.to_string())
            }
            _ => None,
        }
    }
}

/// A response header, optionally valued by a template
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderSpec {
    pub value_template: Option<String>,
}

/// A declared response
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSpec {
    /// The response key, e.g. `"200"` or `"default"`
    pub status: String,
    /// Process exit code this response is selected for (`x-code`)
    pub exit_code: Option<i32>,
    pub headers: IndexMap<String, HeaderSpec>,
    pub contents: Vec<ContentSpec>,
}

impl ResponseSpec {
    /// Declared media types in declaration order
    pub fn media_types(&self) -> Vec<&str> {
        self.contents
            .iter()
            .filter_map(|content| content.media_type.as_deref())
            .collect()
    }

    /// Picks the content entry for a chosen content type.
    ///
    /// A declared media type matching the requested one wins, otherwise the
    /// first entry. Returns `None` when no content is declared.
    pub fn content_for(&self, requested: Option<&str>) -> Option<&ContentSpec> {
        requested
            .and_then(|requested| {
                self.contents.iter().find(|content| {
                    content
                        .media_type
                        .as_deref()
                        .map(|declared| media_type::overlaps(requested, declared))
                        .unwrap_or(false)
                })
            })
            .or_else(|| self.contents.first())
    }

    /// The content type implied by the first content entry
    pub fn implied_content_type(&self) -> Option<String> {
        self.contents
            .first()
            .and_then(ContentSpec::implied_content_type)
            .filter(|value| media_type::is_concrete(value))
    }
}

/// The `x-cli` extension of an operation
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Command template
    pub command: Option<String>,
    /// Stdin template
    pub input: Option<String>,
    /// Write the request body to a file instead of passing it on
    #[serde(default)]
    pub body_to_file: bool,
    /// Read the response body from the output file; defaults to true only for
    /// operations that serve an output file without running a command
    pub file_to_body: Option<bool>,
    pub input_file_name: Option<String>,
    pub output_file_name: Option<String>,
}

impl CliConfig {
    pub fn file_to_body(&self) -> bool {
        self.file_to_body
            .unwrap_or(self.command.is_none() && self.output_file_name.is_some())
    }
}

/// CSV connector options
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CsvOptions {
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Explicit column names; when absent the first row is the header
    pub columns: Option<Vec<String>>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            columns: None,
        }
    }
}

fn default_delimiter() -> String {
    ",".to_string()
}

/// Credential store of a security scheme (`x-connector`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConnectorConfig {
    #[serde(rename = "type")]
    pub kind: String,
    /// Path of the credential file
    pub source: String,
    /// Column keying the records, by name or position
    pub index: Option<JsonValue>,
    /// Role name to column (name or position)
    #[serde(default)]
    pub mapping: IndexMap<String, JsonValue>,
    #[serde(default)]
    pub options: CsvOptions,
}

/// A declared security scheme
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityScheme {
    pub name: String,
    /// `apiKey`, `http`, ...
    pub kind: String,
    /// `basic`, `bearer`, ... for `http` schemes
    pub scheme: Option<String>,
    /// Where an API key is sent (`header`, `query`, `cookie`)
    pub location: Option<String>,
    /// Name of the header, query parameter or cookie carrying the API key
    pub parameter_name: Option<String>,
    pub connector: Option<ConnectorConfig>,
}

/// A single operation at a path and method
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    pub path: String,
    pub method: HttpMethod,
    pub operation_id: Option<String>,
    pub parameters: Vec<ParameterDescriptor>,
    pub body: Option<BodyDescriptor>,
    pub responses: IndexMap<String, ResponseSpec>,
    pub cli: Option<CliConfig>,
    /// Security requirement names declared on the operation
    pub security: Vec<String>,
}

impl OperationDescriptor {
    /// `[METHOD] path`, as used in log and error messages
    pub fn label(&self) -> String {
        format!(
            "[{}] {}",
            self.method.as_str().to_ascii_uppercase(),
            self.path
        )
    }
}
