//! Placeholder expressions: plain symbols, JSONPath and regex queries

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde_json::Value as JsonValue;
use serde_json_path::JsonPath;

use crate::core::{Error, Result};
use crate::engine::environment::{ParamValue, TRANSFORMED_PREFIX};

const DEFAULT_SEPARATOR: &str = ",";

static JSON_PATH_QUERY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^([:=][A-Za-z0-9_-]+)(\.[^|]*)(?:\|(.*))?$").expect("valid JSONPath query regex")
});

static REGEX_QUERY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^([:=][A-Za-z0-9_-]+)/(.*)/([a-z]*)(?:\$([0-9]+))?(?:\|(.*))?$")
        .expect("valid regex query regex")
});

/// A parsed placeholder expression
#[derive(Debug)]
pub enum Query {
    /// `${symbol}`
    Plain { symbol: String },
    /// `${symbol.path|separator}`
    JsonPath {
        symbol: String,
        path: JsonPath,
        separator: String,
    },
    /// `${symbol/pattern/flags$group|separator}`
    Regex {
        symbol: String,
        regex: Regex,
        global: bool,
        group: usize,
        separator: String,
    },
}

impl Query {
    /// Parses the text between `${` and `}`.
    ///
    /// The first `.` or `/` decides the form: a `.` starts a JSONPath, a `/`
    /// starts a regex. Without either the expression is a plain symbol.
    pub fn parse(expression: &str) -> Result<Self> {
        match expression.find(['.', '/']).map(|index| expression.as_bytes()[index]) {
            Some(b'.') => Self::parse_json_path(expression),
            Some(_) => Self::parse_regex(expression),
            None => Ok(Self::Plain {
                symbol: expression.to_string(),
            }),
        }
    }

    fn parse_json_path(expression: &str) -> Result<Self> {
        let captures = JSON_PATH_QUERY
            .captures(expression)
            .ok_or_else(|| Error::query_syntax(expression, "Does not match JSON Path query"))?;

        let path = format!("${}", normalize_path(&captures[2]));
        let path = JsonPath::parse(&path)
            .map_err(|err| Error::query_syntax(expression, err.to_string()))?;

        Ok(Self::JsonPath {
            symbol: captures[1].to_string(),
            path,
            separator: separator(captures.get(3)),
        })
    }

    fn parse_regex(expression: &str) -> Result<Self> {
        let captures = REGEX_QUERY
            .captures(expression)
            .ok_or_else(|| Error::query_syntax(expression, "Does not match reg ex query"))?;

        let mut builder = RegexBuilder::new(&captures[2]);
        let mut global = false;
        for flag in captures[3].chars() {
            match flag {
                'g' => global = true,
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'u' => {}
                other => {
                    return Err(Error::query_syntax(
                        expression,
                        format!("Unsupported regex flag '{other}'"),
                    ));
                }
            }
        }
        let regex = builder
            .build()
            .map_err(|err| Error::query_syntax(expression, err.to_string()))?;

        let group = match captures.get(4) {
            Some(group) => group
                .as_str()
                .parse::<usize>()
                .map_err(|err| Error::query_syntax(expression, err.to_string()))?,
            None => 0,
        };
        if group >= regex.captures_len() {
            return Err(Error::query_syntax(
                expression,
                format!("Capture group {group} does not exist"),
            ));
        }

        Ok(Self::Regex {
            symbol: captures[1].to_string(),
            regex,
            global,
            group,
            separator: separator(captures.get(5)),
        })
    }

    /// The environment symbol this expression reads
    pub fn symbol(&self) -> &str {
        match self {
            Self::Plain { symbol } | Self::JsonPath { symbol, .. } | Self::Regex { symbol, .. } => {
                symbol
            }
        }
    }

    /// Evaluates the expression against the symbol's value
    pub fn evaluate(&self, value: &ParamValue) -> Result<String> {
        match self {
            Self::Plain { .. } => Ok(value.to_text().into_owned()),
            Self::JsonPath {
                symbol,
                path,
                separator,
            } => {
                let document = structured(symbol, value)?;
                let results: Vec<JsonValue> =
                    path.query(&document).all().into_iter().cloned().collect();
                Ok(format_results(symbol, results, separator))
            }
            Self::Regex {
                symbol,
                regex,
                global,
                group,
                separator,
            } => {
                let text = value.to_text();
                let mut results = Vec::new();
                for captures in regex.captures_iter(&text) {
                    if let Some(matched) = captures.get(*group) {
                        results.push(JsonValue::String(matched.as_str().to_string()));
                    }
                    if !global {
                        break;
                    }
                }
                Ok(format_results(symbol, results, separator))
            }
        }
    }
}

/// Rewrites the legacy `.[` step into a bracket selector, keeping `..[`
fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();
    let mut previous = None;
    while let Some(ch) = chars.next() {
        if ch == '.' && chars.peek() == Some(&'[') && previous != Some('.') {
            previous = Some(ch);
            continue;
        }
        normalized.push(ch);
        previous = Some(ch);
    }
    normalized
}

fn separator(capture: Option<regex::Match<'_>>) -> String {
    capture
        .map(|m| m.as_str())
        .filter(|sep| !sep.is_empty())
        .unwrap_or(DEFAULT_SEPARATOR)
        .to_string()
}

/// The structured view of a value a JSONPath runs against
fn structured(symbol: &str, value: &ParamValue) -> Result<JsonValue> {
    match value {
        ParamValue::Undefined => Ok(JsonValue::Null),
        ParamValue::Json(JsonValue::String(text)) => serde_json::from_str(text).map_err(|err| {
            Error::parameter_value(format!("Value of {symbol} is not valid JSON: {err}"))
        }),
        ParamValue::Json(other) => Ok(other.clone()),
        ParamValue::Binary(bytes) => serde_json::from_slice(bytes).map_err(|err| {
            Error::parameter_value(format!("Value of {symbol} is not valid JSON: {err}"))
        }),
    }
}

/// Formats query results.
///
/// Transformed (`:`) symbols yield an empty string, a single quoted element,
/// or all elements joined by `separator` inside one pair of quotes. Raw (`=`)
/// symbols yield the result list as JSON with inner quotes escaped, quoted.
fn format_results(symbol: &str, results: Vec<JsonValue>, separator: &str) -> String {
    if symbol.starts_with(TRANSFORMED_PREFIX) {
        match results.len() {
            0 => String::new(),
            _ => {
                let joined = results
                    .iter()
                    .map(element_text)
                    .collect::<Vec<_>>()
                    .join(separator);
                format!("\"{joined}\"")
            }
        }
    } else {
        let serialized = JsonValue::Array(results).to_string();
        format!("\"{}\"", serialized.replace('"', "\\\""))
    }
}

fn element_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}
