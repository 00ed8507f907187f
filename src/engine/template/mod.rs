//! `${...}` template resolution
//!
//! Placeholders are found with a brace-balanced scan, so regex quantifiers
//! such as `{2,3}` stay inside their placeholder. A `\` inside a placeholder
//! escapes the next character for the scan only; the expression text keeps it.
//!
//! Resolution is single pass: every distinct expression is evaluated once,
//! all of its occurrences are replaced, and substituted text is never scanned
//! again. Unknown symbols are collected over the whole template and reported
//! together; malformed queries fail right away.

pub mod query;

use std::collections::HashMap;

use crate::core::{Error, Result};
use crate::engine::environment::ParameterEnvironment;

pub use query::Query;

/// A `${...}` occurrence inside a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder<'a> {
    /// Byte offset of the `$`
    pub start: usize,
    /// Byte offset just past the closing `}`
    pub end: usize,
    /// Text between `${` and `}`
    pub expression: &'a str,
}

/// Finds all non-overlapping placeholders, left to right.
///
/// An unterminated `${` and an empty `${}` are left as literal text.
pub fn placeholders(template: &str) -> Vec<Placeholder<'_>> {
    let bytes = template.as_bytes();
    let mut found = Vec::new();
    let mut index = 0;

    while index + 1 < bytes.len() {
        if bytes[index] != b'$' || bytes[index + 1] != b'{' {
            index += 1;
            continue;
        }

        let start = index;
        let mut depth = 1;
        let mut cursor = index + 2;
        let mut end = None;
        while cursor < bytes.len() {
            match bytes[cursor] {
                b'\\' => cursor += 1,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(cursor);
                        break;
                    }
                }
                _ => {}
            }
            cursor += 1;
        }

        match end {
            Some(close) if close > start + 2 => {
                found.push(Placeholder {
                    start,
                    end: close + 1,
                    expression: &template[start + 2..close],
                });
                index = close + 1;
            }
            Some(close) => index = close + 1,
            None => break,
        }
    }

    found
}

/// Resolves templates against a parameter environment
#[derive(Debug, Clone, Copy)]
pub struct TemplateResolver<'a> {
    env: &'a ParameterEnvironment,
}

impl<'a> TemplateResolver<'a> {
    pub fn new(env: &'a ParameterEnvironment) -> Self {
        Self { env }
    }

    /// Substitutes every placeholder of `template`.
    ///
    /// # Examples
    /// ```
    /// use clapi::engine::environment::{ParamValue, ParameterEnvironment};
    /// use clapi::engine::template::TemplateResolver;
    ///
    /// let mut env = ParameterEnvironment::new();
    /// env.bind_both("name", ParamValue::text("world"));
    ///
    /// let resolver = TemplateResolver::new(&env);
    /// assert_eq!(resolver.resolve("echo hello ${:name}").unwrap(), "echo hello world");
    /// assert!(resolver.resolve("echo ${:missing}").is_err());
    /// ```
    pub fn resolve(&self, template: &str) -> Result<String> {
        let found = placeholders(template);
        if found.is_empty() {
            return Ok(template.to_string());
        }

        let mut resolved: HashMap<&str, String> = HashMap::new();
        let mut unknown: Vec<String> = Vec::new();

        for placeholder in &found {
            if resolved.contains_key(placeholder.expression) {
                continue;
            }
            let query = Query::parse(placeholder.expression)?;
            match self.env.get(query.symbol()) {
                Some(value) => {
                    resolved.insert(placeholder.expression, query.evaluate(value)?);
                }
                None => {
                    let symbol = query.symbol().to_string();
                    if !unknown.contains(&symbol) {
                        unknown.push(symbol);
                    }
                }
            }
        }

        if !unknown.is_empty() {
            return Err(Error::UnknownParameter(unknown));
        }

        let mut output = String::with_capacity(template.len());
        let mut last = 0;
        for placeholder in &found {
            output.push_str(&template[last..placeholder.start]);
            if let Some(text) = resolved.get(placeholder.expression) {
                output.push_str(text);
            }
            last = placeholder.end;
        }
        output.push_str(&template[last..]);
        Ok(output)
    }

    /// Resolves an optional template
    pub fn resolve_optional(&self, template: Option<&str>) -> Result<Option<String>> {
        template.map(|template| self.resolve(template)).transpose()
    }
}

/// Shorthand for [`TemplateResolver::resolve`]
pub fn resolve(template: &str, env: &ParameterEnvironment) -> Result<String> {
    TemplateResolver::new(env).resolve(template)
}
