//! Response normalizer: extracts a JSON payload from unstructured backend
//! output, repairs common formatting slips, and flattens it into a flat
//! list of strings.
//!
//! Backends are asked for JSON but reply with prose around it, missing
//! separators, or a bare comma-separated list. The normalizer is the one
//! place that copes with all of that; it never panics, and adversarial
//! input yields one of the two named errors.

use serde_json::Value;
use thiserror::Error;

/// Errors from normalizing a backend response.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("no structured data found in backend response")]
    NoStructuredData,

    #[error("backend response contained malformed JSON: {0}")]
    MalformedJson(#[source] serde_json::Error),
}

/// Normalize raw backend text into an ordered list of strings.
///
/// Extraction is greedy: the span from the first `[` to the last `]` wins,
/// falling back to the first `{` .. last `}`. The span is repaired (missing
/// separators inserted), parsed strictly, and on failure parsed once more
/// wrapped in `[...]` to admit bare comma-separated lists. The parsed value
/// is flattened depth-first: strings collected in encounter order, arrays
/// and objects recursed, other scalars dropped.
pub fn normalize(raw: &str) -> Result<Vec<String>, NormalizeError> {
    let span = extract_span(raw).ok_or(NormalizeError::NoStructuredData)?;
    let repaired = repair(span);

    let value = match serde_json::from_str::<Value>(&repaired) {
        Ok(v) => v,
        // A bare list like `"a", "b"` parses once brackets are supplied.
        Err(_) => serde_json::from_str::<Value>(&format!("[{repaired}]"))
            .map_err(NormalizeError::MalformedJson)?,
    };

    let mut out = Vec::new();
    flatten(&value, &mut out);
    Ok(out)
}

/// The first `[` .. last `]` span, else the first `{` .. last `}` span.
/// Spans cross newlines.
fn extract_span(raw: &str) -> Option<&str> {
    span_between(raw, '[', ']').or_else(|| span_between(raw, '{', '}'))
}

fn span_between(raw: &str, open: char, close: char) -> Option<&str> {
    let start = raw.find(open)?;
    let end = raw.rfind(close)?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Insert the comma the backend forgot between adjacent `}{`, `][`, and
/// `""` pairs. Light textual repair only; anything deeper is the parser's
/// problem.
fn repair(span: &str) -> String {
    span.replace("}{", "},{")
        .replace("][", "],[")
        .replace("\"\"", "\",\"")
}

/// Depth-first flatten over the parsed value. Object values recurse in
/// insertion order (serde_json `preserve_order`).
fn flatten(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => {
            for item in items {
                flatten(item, out);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                flatten(item, out);
            }
        }
        // Numbers, booleans, and nulls carry no prompt text.
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_embedded_in_prose() {
        let out = normalize("Here is data: [\"a\", \"b\"] — thanks").expect("should normalize");
        assert_eq!(out, vec!["a", "b"]);
    }

    #[test]
    fn object_flattens_in_encounter_order() {
        let out = normalize(r#"{"a":"x","b":["y","z"]}"#).expect("should normalize");
        assert_eq!(out, vec!["x", "y", "z"]);
    }

    #[test]
    fn object_key_order_preserved_not_sorted() {
        let out = normalize(r#"{"zeta":"first","alpha":"second"}"#).expect("should normalize");
        assert_eq!(out, vec!["first", "second"]);
    }

    #[test]
    fn array_preferred_over_object() {
        let out = normalize(r#"{"ignored": 1} ["a"]"#);
        // The bracket span wins, but here the braces precede the brackets so
        // the greedy `[..]` span is just `["a"]`.
        assert_eq!(out.expect("should normalize"), vec!["a"]);
    }

    #[test]
    fn spans_cross_newlines() {
        let out = normalize("[\n  \"one\",\n  \"two\"\n]").expect("should normalize");
        assert_eq!(out, vec!["one", "two"]);
    }

    #[test]
    fn repairs_missing_comma_between_objects() {
        let out = normalize(r#"[{"a":"x"}{"b":"y"}]"#).expect("should repair");
        assert_eq!(out, vec!["x", "y"]);
    }

    #[test]
    fn repairs_missing_comma_between_arrays() {
        let out = normalize(r#"[["a"]["b"]]"#).expect("should repair");
        assert_eq!(out, vec!["a", "b"]);
    }

    #[test]
    fn repairs_missing_comma_between_strings() {
        let out = normalize(r#"["a""b"]"#).expect("should repair");
        assert_eq!(out, vec!["a", "b"]);
    }

    #[test]
    fn bare_list_gets_wrapped() {
        // No enclosing brackets at all, but a brace span exists nowhere
        // either -- extraction fails, so this is the no-data case.
        let err = normalize("just prose, no payload").unwrap_err();
        assert!(matches!(err, NormalizeError::NoStructuredData));
    }

    #[test]
    fn brace_span_with_trailing_garbage_wraps_to_list() {
        // Extraction yields `{"a":"x"}, {"b":"y"}` via first-{ .. last-},
        // which only parses after wrapping in brackets.
        let out = normalize(r#"{"a":"x"}, {"b":"y"}"#).expect("should normalize");
        assert_eq!(out, vec!["x", "y"]);
    }

    #[test]
    fn malformed_json_is_named_error() {
        let err = normalize("[\"unterminated").unwrap_err();
        assert!(matches!(err, NormalizeError::MalformedJson(_)));
    }

    #[test]
    fn truncated_object_is_malformed() {
        let err = normalize(r#"{"a": "x", "b"#).unwrap_err();
        // `rfind('}')` fails, `{`..`}` has no close -- depending on shape
        // this is either no-data or malformed; truncation mid-string has no
        // closing brace at all.
        assert!(matches!(err, NormalizeError::NoStructuredData | NormalizeError::MalformedJson(_)));
    }

    #[test]
    fn non_string_scalars_dropped() {
        let out = normalize(r#"["a", 1, true, null, "b"]"#).expect("should normalize");
        assert_eq!(out, vec!["a", "b"]);
    }

    #[test]
    fn serde_roundtrip_flattens_to_identity() {
        let serialized = serde_json::to_string(&vec!["a", "b"]).unwrap();
        let out = normalize(&serialized).expect("should normalize");
        assert_eq!(out, vec!["a", "b"]);
    }

    #[test]
    fn deep_nesting() {
        let out = normalize(r#"[{"a": [{"b": ["x"]}, "y"]}, "z"]"#).expect("should normalize");
        assert_eq!(out, vec!["x", "y", "z"]);
    }

    #[test]
    fn empty_array_yields_empty_list() {
        let out = normalize("[]").expect("should normalize");
        assert!(out.is_empty());
    }
}
