//! Template compiler: parses a `::`-delimited template string into an
//! ordered generation plan.
//!
//! A template is split on `::` into sections. A section may carry a leading
//! decimal prefix that sets the answer count for the section *before* it
//! (the prefix sits at the boundary, so `"animals :: 3colors"` requests 3
//! answers for `animals`). Any explicit prefix switches the whole plan to
//! explode (cartesian) combination; without prefixes every section uses the
//! default count and results are zipped positionally.

use thiserror::Error;

/// The section separator.
pub const SEPARATOR: &str = "::";

/// Errors from compiling a template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("invalid repeat count {0:?} (must be a positive integer)")]
    InvalidCount(String),
}

/// One `::`-delimited unit of a template, with its target answer count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSegment {
    /// Number of answers the retry engine must produce for this segment.
    pub count: usize,
    /// Segment text, trimmed, digit prefixes stripped. May contain the
    /// `{prompt}` placeholder; substitution is the orchestrator's job.
    pub text: String,
}

/// Ordered, immutable output of [`compile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPlan {
    pub segments: Vec<PlanSegment>,
    /// True iff any segment declared an explicit count. Selects cartesian
    /// (explode) combination over positional zip.
    pub explode: bool,
}

impl GenerationPlan {
    /// A plan with no segments. The orchestrator treats this as "use the
    /// caller's original prompt unchanged".
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Compile a raw template into a [`GenerationPlan`].
///
/// Templates without `::` take the fast path: one segment, the whole
/// trimmed template, `default_count` answers. Whitespace-only sections are
/// dropped; a template of nothing but separators compiles to an empty plan.
pub fn compile(template: &str, default_count: usize) -> Result<GenerationPlan, TemplateError> {
    // Common case: no sections at all.
    if !template.contains(SEPARATOR) {
        let text = template.trim();
        let segments = if text.is_empty() {
            vec![]
        } else {
            vec![PlanSegment {
                count: default_count,
                text: text.to_owned(),
            }]
        };
        return Ok(GenerationPlan {
            segments,
            explode: false,
        });
    }

    let parts: Vec<&str> = template.split(SEPARATOR).collect();
    let mut segments = Vec::with_capacity(parts.len());
    let mut explode = false;

    for (i, raw) in parts.iter().enumerate() {
        // Leading digits on this part belong to the previous boundary;
        // strip them to recover the section text.
        let text = raw.trim_start().trim_start_matches(|c: char| c.is_ascii_digit());

        // This section's count comes from the next part's digit prefix.
        let count = match parts.get(i + 1) {
            Some(next) => match leading_digits(next) {
                Some(digits) => {
                    explode = true;
                    parse_count(digits)?
                }
                None => default_count,
            },
            None => default_count,
        };

        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        segments.push(PlanSegment {
            count,
            text: text.to_owned(),
        });
    }

    Ok(GenerationPlan { segments, explode })
}

/// The run of ASCII digits at the start of `part` (after leading
/// whitespace), or `None` if it does not start with a digit.
fn leading_digits(part: &str) -> Option<&str> {
    let part = part.trim_start();
    let end = part
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(part.len());
    if end == 0 { None } else { Some(&part[..end]) }
}

fn parse_count(digits: &str) -> Result<usize, TemplateError> {
    let count: usize = digits
        .parse()
        .map_err(|_| TemplateError::InvalidCount(digits.to_owned()))?;
    if count == 0 {
        return Err(TemplateError::InvalidCount(digits.to_owned()));
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_separator_single_segment() {
        let plan = compile("  a painting of {prompt}  ", 5).expect("should compile");
        assert_eq!(plan.segments.len(), 1);
        assert_eq!(plan.segments[0].count, 5);
        assert_eq!(plan.segments[0].text, "a painting of {prompt}");
        assert!(!plan.explode);
    }

    #[test]
    fn whitespace_only_yields_empty_plan() {
        for template in ["", "   ", "::", " :: ", ":: :: ::"] {
            let plan = compile(template, 3).expect("should compile");
            assert!(plan.is_empty(), "template {template:?} should be empty");
        }
    }

    #[test]
    fn default_counts_without_prefixes() {
        let plan = compile("animals :: colors :: moods", 4).expect("should compile");
        assert_eq!(plan.segments.len(), 3);
        for seg in &plan.segments {
            assert_eq!(seg.count, 4);
        }
        assert!(!plan.explode);
        assert_eq!(plan.segments[0].text, "animals");
        assert_eq!(plan.segments[2].text, "moods");
    }

    #[test]
    fn prefix_binds_to_preceding_section() {
        // The "3" requests 3 answers for "animals", not "colors".
        let plan = compile("animals :: 3colors", 2).expect("should compile");
        assert_eq!(plan.segments.len(), 2);
        assert_eq!(plan.segments[0].count, 3);
        assert_eq!(plan.segments[0].text, "animals");
        assert_eq!(plan.segments[1].count, 2);
        assert_eq!(plan.segments[1].text, "colors");
        assert!(plan.explode);
    }

    #[test]
    fn prefix_with_whitespace_parses_identically() {
        let a = compile("cat :: 3 dog", 2).expect("should compile");
        let b = compile("cat ::3 dog", 2).expect("should compile");
        assert_eq!(a, b);
        assert_eq!(a.segments[0].count, 3);
        assert_eq!(a.segments[1].text, "dog");
    }

    #[test]
    fn multiple_prefixes() {
        let plan = compile("2a :: 3b :: 4c", 1).expect("should compile");
        // Leading "2" on the first part has no preceding boundary; it is
        // stripped from the text and otherwise ignored.
        assert_eq!(plan.segments.len(), 3);
        assert_eq!(plan.segments[0], PlanSegment { count: 3, text: "a".into() });
        assert_eq!(plan.segments[1], PlanSegment { count: 4, text: "b".into() });
        assert_eq!(plan.segments[2], PlanSegment { count: 1, text: "c".into() });
        assert!(plan.explode);
    }

    #[test]
    fn empty_sections_dropped() {
        let plan = compile("a :: :: b", 2).expect("should compile");
        assert_eq!(plan.segments.len(), 2);
        assert_eq!(plan.segments[0].text, "a");
        assert_eq!(plan.segments[1].text, "b");
    }

    #[test]
    fn zero_count_rejected() {
        let err = compile("a :: 0b", 2).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidCount(ref d) if d == "0"));
    }

    #[test]
    fn overflowing_count_rejected() {
        let err = compile("a :: 99999999999999999999b", 2).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidCount(_)));
    }

    #[test]
    fn digits_only_section_is_dropped() {
        // "3" is consumed as the prefix for "a"; nothing remains of the
        // second section.
        let plan = compile("a :: 3", 2).expect("should compile");
        assert_eq!(plan.segments.len(), 1);
        assert_eq!(plan.segments[0].count, 3);
        assert!(plan.explode);
    }

    #[test]
    fn no_separator_whole_template_preserved() {
        // A digit-leading template without separators is left alone.
        let plan = compile("3 wolves howling", 2).expect("should compile");
        assert_eq!(plan.segments[0].text, "3 wolves howling");
        assert_eq!(plan.segments[0].count, 2);
    }
}
