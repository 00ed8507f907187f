//! Wildcard-aware media type matching and `Accept` negotiation

use mime::Mime;

/// A parsed media type or media range; parameters are ignored when matching.
#[derive(Debug, Clone, PartialEq)]
struct MediaRange(Mime);

impl MediaRange {
    fn parse(value: &str) -> Option<Self> {
        value.trim().parse::<Mime>().ok().map(Self)
    }

    fn contains(&self, other: &MediaRange) -> bool {
        let (range, actual) = (&self.0, &other.0);
        let top_matches = range.type_() == mime::STAR
            || range.type_().as_str().eq_ignore_ascii_case(actual.type_().as_str());
        let sub_matches = if range.subtype() == mime::STAR {
            // `*+json` only admits subtypes carrying the same suffix
            match range.suffix() {
                Some(suffix) => actual
                    .suffix()
                    .is_some_and(|other| other.as_str().eq_ignore_ascii_case(suffix.as_str())),
                None => true,
            }
        } else {
            range.subtype().as_str().eq_ignore_ascii_case(actual.subtype().as_str())
                && same_suffix(range, actual)
        };
        top_matches && sub_matches
    }
}

fn same_suffix(a: &Mime, b: &Mime) -> bool {
    match (a.suffix(), b.suffix()) {
        (Some(a), Some(b)) => a.as_str().eq_ignore_ascii_case(b.as_str()),
        (None, None) => true,
        _ => false,
    }
}

/// Checks whether `content_type` falls into the media range `pattern`.
///
/// Parameters such as `; charset=utf-8` are ignored on both sides. The pattern
/// may use `*` for the type, the subtype, or a `*+suffix` subtype.
///
/// # Examples
/// ```
/// use clapi::core::media_type::matches;
///
/// assert!(matches("application/json; charset=utf-8", "application/json"));
/// assert!(matches("application/vnd.api+json", "application/*+json"));
/// assert!(matches("text/plain", "*/*"));
/// assert!(!matches("text/plain", "application/json"));
/// ```
pub fn matches(content_type: &str, pattern: &str) -> bool {
    match (MediaRange::parse(content_type), MediaRange::parse(pattern)) {
        (Some(actual), Some(range)) => range.contains(&actual),
        _ => false,
    }
}

/// Checks whether either media range contains the other.
///
/// Declared media types may themselves be ranges (`*/*`), and requested types
/// may be ranges too (`Accept: text/*`), so negotiation is symmetric.
pub fn overlaps(a: &str, b: &str) -> bool {
    match (MediaRange::parse(a), MediaRange::parse(b)) {
        (Some(a), Some(b)) => a.contains(&b) || b.contains(&a),
        _ => false,
    }
}

/// Whether the value is a concrete, well-formed media type (no wildcards).
pub fn is_concrete(value: &str) -> bool {
    value
        .parse::<Mime>()
        .map(|mime| mime.type_() != mime::STAR && mime.subtype() != mime::STAR)
        .unwrap_or(false)
}

/// Returns the media type of a `Content-Type` header without parameters.
pub fn essence(content_type: &str) -> Option<String> {
    content_type
        .parse::<Mime>()
        .ok()
        .map(|mime| mime.essence_str().to_string())
}

/// Whether a request body with this content type carries JSON.
pub fn is_json(content_type: &str) -> bool {
    matches(content_type, mime::APPLICATION_JSON.essence_str())
        || matches(content_type, "application/*+json")
}

/// Splits an `Accept` header into its media ranges, highest quality first.
///
/// Entries with `q=0` are dropped. Entries with equal quality keep their
/// original order.
pub fn parse_accept(accept: &str) -> Vec<String> {
    let mut entries: Vec<(String, f32)> = accept
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let range = parts.next()?.trim();
            if range.is_empty() {
                return None;
            }
            let quality = parts
                .filter_map(|param| param.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            Some((range.to_string(), quality))
        })
        .filter(|(_, quality)| *quality > 0.0)
        .collect();

    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    entries.into_iter().map(|(range, _)| range).collect()
}

/// Negotiates a concrete response media type from an `Accept` header.
///
/// The first accepted range (by quality) that overlaps a declared media type
/// selects that declared type. Without declared types the first concrete
/// accepted type wins. Returns `None` when nothing acceptable is found, which
/// includes a plain `*/*` against no declared types.
pub fn negotiate(accept: &str, declared: &[&str]) -> Option<String> {
    let ranges = parse_accept(accept);

    if declared.is_empty() {
        return ranges.into_iter().find(|range| is_concrete(range));
    }

    for range in &ranges {
        if let Some(found) = declared.iter().find(|media| overlaps(range, media)) {
            if is_concrete(found) {
                return Some((*found).to_string());
            }
            if is_concrete(range) {
                return Some(range.clone());
            }
        }
    }
    None
}
