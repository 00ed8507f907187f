//! Parameter and response transforms
//!
//! A transform is declared with `x-transform` on a parameter, request body
//! media type or response media type. The declaration is parsed into a
//! [`TransformSpec`] when the service description is loaded and compiled into
//! a [`Transform`] by the [`TransformRegistry`], which also owns the global
//! `x-transforms` table that named references point into.
//!
//! Supported declarations:
//!
//! * absent: identity
//! * an object: a dictionary lookup keyed by the textual value
//! * `"@lowercase"`, `"@uppercase"`, `"@trim"`, `"@json"`, `"@string"`: built-ins
//! * any other string: the name of an entry in `x-transforms`
//!
//! Inline function sources are rejected while loading.

use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::core::{Error, Result};
use crate::engine::environment::ParamValue;

/// Extension key of a single transform declaration
pub const TRANSFORM_EXTENSION: &str = "x-transform";
/// Extension key of the global table of named transforms
pub const TRANSFORMS_EXTENSION: &str = "x-transforms";

/// Declarative form of a transform, as written in the service description
#[derive(Debug, Clone, PartialEq)]
pub enum TransformSpec {
    Identity,
    Dictionary(Arc<JsonMap<String, JsonValue>>),
    /// A callable transform; only the sandboxed built-ins resolve
    Callable(String),
    /// A named entry of the global transform table
    Reference(String),
}

impl TransformSpec {
    /// Parses the value of an `x-transform` extension.
    ///
    /// # Examples
    /// ```
    /// use clapi::engine::transform::TransformSpec;
    /// use serde_json::json;
    ///
    /// assert_eq!(TransformSpec::from_extension(None).unwrap(), TransformSpec::Identity);
    /// assert!(matches!(
    ///     TransformSpec::from_extension(Some(&json!("toUpper"))).unwrap(),
    ///     TransformSpec::Reference(_)
    /// ));
    /// ```
    pub fn from_extension(value: Option<&JsonValue>) -> Result<Self> {
        match value {
            None | Some(JsonValue::Null) => Ok(Self::Identity),
            Some(JsonValue::Object(map)) => Ok(Self::Dictionary(Arc::new(map.clone()))),
            Some(JsonValue::String(text)) => {
                let text = text.trim();
                if text.starts_with('@') || text.starts_with("function") {
                    Ok(Self::Callable(text.to_string()))
                } else {
                    Ok(Self::Reference(text.to_string()))
                }
            }
            Some(other) => Err(Error::transform(format!(
                "Transformation has to be specified as object or string, got {other}"
            ))),
        }
    }

    /// Reads the `x-transform` extension of a JSON object.
    pub fn from_object(object: &JsonValue) -> Result<Self> {
        Self::from_extension(object.get(TRANSFORM_EXTENSION))
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }
}

/// Sandboxed callable transforms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinTransform {
    Lowercase,
    Uppercase,
    Trim,
    /// Parses textual JSON into a structured value
    Json,
    /// Serializes a structured value into text
    String,
}

impl BuiltinTransform {
    fn apply(self, value: &ParamValue) -> ParamValue {
        match (self, value) {
            (_, ParamValue::Undefined) => ParamValue::Undefined,
            (Self::Lowercase, _) => map_text(value, |text| text.to_lowercase()),
            (Self::Uppercase, _) => map_text(value, |text| text.to_uppercase()),
            (Self::Trim, _) => map_text(value, |text| text.trim().to_string()),
            (Self::Json, ParamValue::Json(JsonValue::String(text))) => {
                serde_json::from_str(text)
                    .map(ParamValue::Json)
                    .unwrap_or_else(|_| value.clone())
            }
            (Self::Json, ParamValue::Binary(bytes)) => serde_json::from_slice(bytes)
                .map(ParamValue::Json)
                .unwrap_or_else(|_| value.clone()),
            (Self::Json, _) => value.clone(),
            (Self::String, _) => ParamValue::text(value.to_text()),
        }
    }
}

/// Applies a text function to string values; other values pass unchanged.
fn map_text(value: &ParamValue, f: impl Fn(&str) -> String) -> ParamValue {
    match value {
        ParamValue::Json(JsonValue::String(text)) => ParamValue::text(f(text)),
        ParamValue::Binary(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => ParamValue::text(f(text)),
            Err(_) => value.clone(),
        },
        other => other.clone(),
    }
}

impl FromStr for BuiltinTransform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "@lowercase" => Ok(Self::Lowercase),
            "@uppercase" => Ok(Self::Uppercase),
            "@trim" => Ok(Self::Trim),
            "@json" => Ok(Self::Json),
            "@string" => Ok(Self::String),
            other if other.starts_with("function") => Err(Error::transform(
                "Inline function transforms are not supported, use a built-in such as @lowercase",
            )),
            other => Err(Error::transform(format!("Unknown built-in transform '{other}'"))),
        }
    }
}

impl fmt::Display for BuiltinTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lowercase => write!(f, "@lowercase"),
            Self::Uppercase => write!(f, "@uppercase"),
            Self::Trim => write!(f, "@trim"),
            Self::Json => write!(f, "@json"),
            Self::String => write!(f, "@string"),
        }
    }
}

/// A resolved transform, ready to be applied to request and response values
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Identity,
    Dictionary(Arc<JsonMap<String, JsonValue>>),
    Builtin(BuiltinTransform),
}

impl Transform {
    /// Applies the transform.
    ///
    /// Dictionary lookups use the textual form of the value as key. A missing
    /// key, or an `Undefined` input, yields `Undefined`.
    pub fn apply(&self, value: &ParamValue) -> ParamValue {
        match self {
            Self::Identity => value.clone(),
            Self::Dictionary(entries) => value
                .as_key()
                .and_then(|key| entries.get(key.as_ref()))
                .cloned()
                .map(ParamValue::Json)
                .unwrap_or(ParamValue::Undefined),
            Self::Builtin(builtin) => builtin.apply(value),
        }
    }
}

/// Resolves transform declarations against the global `x-transforms` table
#[derive(Debug, Clone, Default)]
pub struct TransformRegistry {
    named: Option<IndexMap<String, TransformSpec>>,
}

impl TransformRegistry {
    /// Creates a registry without a global transform table
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry from the `x-transforms` extension of a document.
    ///
    /// Every named entry is resolved once so that malformed entries, dangling
    /// references and reference cycles fail here rather than per request.
    pub fn from_document(document: &JsonValue) -> Result<Self> {
        let named = match document.get(TRANSFORMS_EXTENSION) {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::Object(table)) => Some(
                table
                    .iter()
                    .map(|(name, value)| {
                        TransformSpec::from_extension(Some(value))
                            .map(|spec| (name.clone(), spec))
                            .map_err(|err| {
                                Error::transform(format!("Named transform '{name}': {err}"))
                            })
                    })
                    .collect::<Result<IndexMap<_, _>>>()?,
            ),
            Some(_) => {
                return Err(Error::transform(format!(
                    "{TRANSFORMS_EXTENSION} has to be an object of named transforms"
                )));
            }
        };

        let registry = Self { named };
        if let Some(named) = &registry.named {
            for name in named.keys() {
                registry.resolve(&TransformSpec::Reference(name.clone()))?;
            }
        }
        Ok(registry)
    }

    /// Names of all entries of the global table, in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.named.iter().flat_map(|named| named.keys().map(String::as_str))
    }

    /// Compiles a declaration, following named references.
    pub fn resolve(&self, spec: &TransformSpec) -> Result<Transform> {
        let mut visited = Vec::new();
        self.resolve_inner(spec, &mut visited)
    }

    fn resolve_inner(&self, spec: &TransformSpec, visited: &mut Vec<String>) -> Result<Transform> {
        match spec {
            TransformSpec::Identity => Ok(Transform::Identity),
            TransformSpec::Dictionary(entries) => Ok(Transform::Dictionary(entries.clone())),
            TransformSpec::Callable(source) => source.parse().map(Transform::Builtin),
            TransformSpec::Reference(name) => {
                if visited.contains(name) {
                    visited.push(name.clone());
                    return Err(Error::transform(format!(
                        "Cyclic transform reference: {}",
                        visited.join(" -> ")
                    )));
                }
                let named = self.named.as_ref().ok_or_else(|| {
                    Error::transform(format!(
                        "Transform '{name}' referenced, but no global {TRANSFORMS_EXTENSION} defined"
                    ))
                })?;
                let target = named.get(name).ok_or_else(|| {
                    Error::transform(format!(
                        "Transform '{name}' is not defined in {TRANSFORMS_EXTENSION}"
                    ))
                })?;
                visited.push(name.clone());
                self.resolve_inner(target, visited)
            }
        }
    }
}
