//! String and path utilities shared by the service description adapter and the transport layer

use std::collections::HashMap;

/// Converts a string to lowerCamelCase.
///
/// Words are separated by `-`, `_`, `.` or whitespace. The first word keeps
/// its case, every following word gets an upper-case first letter. This is
/// how header parameter names become template variables.
///
/// # Examples
/// ```
/// use clapi::core::utils::to_camel_case;
///
/// assert_eq!(to_camel_case("test-parameter"), "testParameter");
/// assert_eq!(to_camel_case("api_key"), "apiKey");
/// assert_eq!(to_camel_case("accept"), "accept");
/// ```
pub fn to_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut upper_next = false;

    for ch in s.chars() {
        if ch == '-' || ch == '_' || ch == '.' || ch.is_whitespace() {
            upper_next = !result.is_empty();
            continue;
        }
        if upper_next {
            result.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            result.push(ch);
        }
    }

    result
}

/// Computes the template variable name of a header parameter.
///
/// Header names are case-insensitive, so they are lower-cased before the
/// camel-case conversion.
pub fn header_variable_name(header: &str) -> String {
    to_camel_case(&header.to_ascii_lowercase())
}

/// Matches a concrete request path against an OpenAPI path template.
///
/// Returns the captured path parameters when every literal segment matches
/// and every `{name}` segment is non-empty. Trailing slashes are ignored.
///
/// # Examples
/// ```
/// use clapi::core::utils::match_path_template;
///
/// let params = match_path_template("/pets/{petId}", "/pets/42").unwrap();
/// assert_eq!(params["petId"], "42");
/// assert!(match_path_template("/pets/{petId}", "/owners/42").is_none());
/// ```
pub fn match_path_template(template: &str, path: &str) -> Option<HashMap<String, String>> {
    let template_segments: Vec<&str> = template.trim_end_matches('/').split('/').collect();
    let path_segments: Vec<&str> = path.trim_end_matches('/').split('/').collect();

    if template_segments.len() != path_segments.len() {
        return None;
    }

    let mut params = HashMap::new();
    for (expected, actual) in template_segments.iter().zip(path_segments.iter()) {
        if let Some(name) = expected
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
        {
            if actual.is_empty() {
                return None;
            }
            params.insert(name.to_string(), percent_decode(actual));
        } else if expected != actual {
            return None;
        }
    }

    Some(params)
}

/// Decodes `%XX` escapes of a single path segment.
fn percent_decode(segment: &str) -> String {
    percent_encoding::percent_decode_str(segment)
        .decode_utf8_lossy()
        .into_owned()
}
