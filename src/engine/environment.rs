//! Request-scoped parameter environment
//!
//! Every declared parameter `P` contributes two symbols: `=P` holds the value
//! as extracted from the request and `:P` the value after `P`'s transform.
//! Looking up a symbol distinguishes a missing binding (`None`) from a binding
//! whose value is [`ParamValue::Undefined`], e.g. an unmatched dictionary key.

use serde_json::Value as JsonValue;
use std::borrow::Cow;
use std::collections::HashMap;

/// Prefix of symbols holding raw request values
pub const RAW_PREFIX: char = '=';
/// Prefix of symbols holding transformed values
pub const TRANSFORMED_PREFIX: char = ':';

/// Name under which the request body is bound
pub const BODY: &str = "body";
/// Name of the input file pseudo-parameter
pub const INPUT_FILE: &str = "inputFile";
/// Name of the output file pseudo-parameter
pub const OUTPUT_FILE: &str = "outputFile";
/// Name under which process stdout is bound
pub const OUTPUT: &str = "output";
/// Name under which process stderr is bound
pub const ERROR: &str = "error";

/// A value bound in the parameter environment
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Bound, but without a value (absent optional parameter, unmatched key)
    Undefined,
    /// Text or structured data
    Json(JsonValue),
    /// Raw bytes, e.g. an octet-stream request body
    Binary(Vec<u8>),
}

impl ParamValue {
    /// Wraps a piece of text
    pub fn text<S: Into<String>>(value: S) -> Self {
        Self::Json(JsonValue::String(value.into()))
    }

    /// Wraps bytes, keeping them as text when they are valid UTF-8
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::text(text),
            Err(err) => Self::Binary(err.into_bytes()),
        }
    }

    /// Wraps an optional piece of text, mapping `None` to `Undefined`
    pub fn from_optional<S: Into<String>>(value: Option<S>) -> Self {
        value.map(Self::text).unwrap_or(Self::Undefined)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// The text form used when the value is substituted into a template.
    ///
    /// Strings are inserted verbatim, other JSON values as compact JSON and
    /// `Undefined` as the empty string.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Self::Undefined => Cow::Borrowed(""),
            Self::Json(JsonValue::String(text)) => Cow::Borrowed(text),
            Self::Json(other) => Cow::Owned(other.to_string()),
            Self::Binary(bytes) => String::from_utf8_lossy(bytes),
        }
    }

    /// The key used for dictionary lookups, `None` for `Undefined`
    pub fn as_key(&self) -> Option<Cow<'_, str>> {
        if self.is_undefined() {
            None
        } else {
            Some(self.to_text())
        }
    }

    /// Whether the value is already structured (object or array)
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Json(JsonValue::Object(_) | JsonValue::Array(_)))
    }

    /// The bytes written to stdin, a file or a response body.
    ///
    /// Structured values are serialized as JSON. `Undefined` yields `None`.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Self::Undefined => None,
            Self::Json(JsonValue::String(text)) => Some(text.clone().into_bytes()),
            Self::Json(other) => Some(other.to_string().into_bytes()),
            Self::Binary(bytes) => Some(bytes.clone()),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

impl From<JsonValue> for ParamValue {
    fn from(value: JsonValue) -> Self {
        Self::Json(value)
    }
}

/// Mapping from symbol to value for a single request
#[derive(Debug, Clone, Default)]
pub struct ParameterEnvironment {
    values: HashMap<String, ParamValue>,
}

impl ParameterEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a single symbol, replacing any previous binding
    pub fn bind<S: Into<String>>(&mut self, symbol: S, value: ParamValue) {
        self.values.insert(symbol.into(), value);
    }

    /// Binds the raw (`=name`) and transformed (`:name`) symbols of a parameter
    pub fn bind_parameter(&mut self, name: &str, raw: ParamValue, transformed: ParamValue) {
        self.values.insert(format!("{RAW_PREFIX}{name}"), raw);
        self.values.insert(format!("{TRANSFORMED_PREFIX}{name}"), transformed);
    }

    /// Binds the same value under both the raw and the transformed symbol
    pub fn bind_both(&mut self, name: &str, value: ParamValue) {
        self.bind_parameter(name, value.clone(), value);
    }

    /// Looks up a symbol; `None` means the symbol is not bound at all
    pub fn get(&self, symbol: &str) -> Option<&ParamValue> {
        self.values.get(symbol)
    }

    /// Looks up the transformed value of a parameter
    pub fn transformed(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(&format!("{TRANSFORMED_PREFIX}{name}"))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.values.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over all bound symbols in no particular order
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}
