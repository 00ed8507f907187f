//! Transport-neutral request, response and process views
//!
//! The HTTP server converts its framework types into a [`GatewayRequest`] and
//! turns the resulting [`GatewayResponse`] back into a framework response, so
//! the engine never sees axum types.

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::core::media_type;
use crate::core::{Error, Result};

/// HTTP methods an operation can be declared for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    /// Get all HTTP methods as an array
    pub fn all() -> &'static [HttpMethod] {
        &[
            HttpMethod::Get,
            HttpMethod::Post,
            HttpMethod::Put,
            HttpMethod::Delete,
            HttpMethod::Patch,
            HttpMethod::Head,
            HttpMethod::Options,
        ]
    }

    /// The lower-case key used for the method in a path item
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
            HttpMethod::Patch => "patch",
            HttpMethod::Head => "head",
            HttpMethod::Options => "options",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        HttpMethod::all()
            .iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| Error::config(format!("Unsupported HTTP method: {s}")))
    }
}

/// A decoded request body
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(JsonValue),
    Text(String),
    Form(IndexMap<String, String>),
    Binary(Vec<u8>),
}

impl RequestBody {
    /// Decodes raw body bytes according to the request's `Content-Type`.
    ///
    /// JSON and `+json` bodies are parsed, URL-encoded forms are split into
    /// fields, `text/*` stays text and everything else stays raw bytes.
    /// A JSON body that fails to parse is kept as text.
    pub fn decode(content_type: Option<&str>, bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::Empty;
        }
        let Some(content_type) = content_type else {
            return Self::Binary(bytes.to_vec());
        };

        if media_type::is_json(content_type) {
            return serde_json::from_slice(bytes)
                .map(Self::Json)
                .unwrap_or_else(|_| Self::text_or_binary(bytes));
        }
        if media_type::matches(content_type, "application/x-www-form-urlencoded") {
            return Self::Form(url::form_urlencoded::parse(bytes).into_owned().collect());
        }
        if media_type::matches(content_type, "text/*") {
            return Self::text_or_binary(bytes);
        }
        Self::Binary(bytes.to_vec())
    }

    fn text_or_binary(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::Text(text.to_string()),
            Err(_) => Self::Binary(bytes.to_vec()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Looks up a field of a form or JSON object body
    pub fn field(&self, name: &str) -> Option<String> {
        match self {
            Self::Form(fields) => fields.get(name).cloned(),
            Self::Json(JsonValue::Object(map)) => map.get(name).map(|value| match value {
                JsonValue::String(text) => text.clone(),
                other => other.to_string(),
            }),
            _ => None,
        }
    }
}

/// Uniform view of an incoming request
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: HttpMethod,
    pub path: String,
    /// Header values keyed by lower-cased header name
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub path_params: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub body: RequestBody,
}

impl GatewayRequest {
    pub fn new<S: Into<String>>(method: HttpMethod, path: S) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            query: HashMap::new(),
            path_params: HashMap::new(),
            cookies: HashMap::new(),
            body: RequestBody::Empty,
        }
    }

    /// Adds a header; a `Cookie` header is also split into cookies
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name == "cookie" {
            self.cookies.extend(parse_cookies(value));
        }
        self.headers.insert(name, value.to_string());
        self
    }

    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query.insert(name.to_string(), value.to_string());
        self
    }

    /// Parses a raw query string (without the leading `?`)
    pub fn with_query_string(mut self, query: &str) -> Self {
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            self.query.entry(name.into_owned()).or_insert(value.into_owned());
        }
        self
    }

    pub fn with_path_params(mut self, params: HashMap<String, String>) -> Self {
        self.path_params.extend(params);
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Decodes and attaches a raw body using the request's content type
    pub fn with_raw_body(self, bytes: &[u8]) -> Self {
        let body = RequestBody::decode(self.content_type(), bytes);
        self.with_body(body)
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }
}

fn parse_cookies(header: &str) -> impl Iterator<Item = (String, String)> + '_ {
    header.split(';').filter_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        let value = value.trim().trim_matches('"');
        let value = percent_encoding::percent_decode_str(value)
            .decode_utf8_lossy()
            .into_owned();
        Some((name.trim().to_string(), value))
    })
}

/// Uniform view of an outgoing response
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status: u16,
    pub headers: IndexMap<String, String>,
    pub body: Vec<u8>,
}

impl GatewayResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: IndexMap::new(),
            body: Vec::new(),
        }
    }

    /// A plain-text response
    pub fn text<S: Into<String>>(status: u16, body: S) -> Self {
        let mut response = Self::new(status);
        response
            .headers
            .insert("Content-Type".to_string(), "text/plain; charset=utf-8".to_string());
        response.body = body.into().into_bytes();
        response
    }

    /// The generic 500 response; details only go to the log
    pub fn internal_error() -> Self {
        Self::text(500, "Internal Server Error")
    }

    pub fn unauthorized<S: Into<String>>(reason: S) -> Self {
        Self::text(401, reason)
    }

    pub fn not_found(method: HttpMethod, path: &str) -> Self {
        Self::text(
            404,
            format!(
                "Unable to locate operation: [{}] {path}",
                method.as_str().to_ascii_uppercase()
            ),
        )
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Captured result of a command execution
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
