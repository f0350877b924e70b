//! Segment combiner: merges per-segment answer lists into the final prompt
//! strings.
//!
//! Two strategies, selected by the plan's `explode` flag:
//! - **explode** -- running cartesian join across segments; output length is
//!   the product of the segment counts.
//! - **append** -- positional zip folded into the first segment's list;
//!   output length equals the first segment's count.
//!
//! Both join with a punctuation-aware separator: a bare space when the
//! accumulated string already ends in `,` or `.`, otherwise `", "`.

use crate::template::GenerationPlan;

/// Merge per-segment results (`results[i]` belongs to `plan.segments[i]`)
/// into the final output strings.
pub fn combine(plan: &GenerationPlan, results: &[Vec<String>]) -> Vec<String> {
    let Some(first) = results.first() else {
        return Vec::new();
    };
    if results.len() == 1 {
        return first.clone();
    }

    if plan.explode {
        explode(results)
    } else {
        append(results)
    }
}

/// Separator for joining `right` onto the accumulated `left`.
fn separator(left: &str) -> &'static str {
    if left.ends_with(',') || left.ends_with('.') {
        " "
    } else {
        ", "
    }
}

fn join(left: &str, right: &str) -> String {
    format!("{left}{}{right}", separator(left))
}

/// Running cartesian product, seeded with the first segment's answers.
fn explode(results: &[Vec<String>]) -> Vec<String> {
    let mut acc = results[0].clone();
    for next in &results[1..] {
        acc = acc
            .iter()
            .flat_map(|left| next.iter().map(|right| join(left, right)))
            .collect();
    }
    acc
}

/// Positional zip: index `i` of every later segment folds into index `i`
/// of the first segment's list. Later segments shorter than the first
/// contribute nothing at the missing indices; extra entries beyond the
/// first list's length are ignored.
fn append(results: &[Vec<String>]) -> Vec<String> {
    let mut acc = results[0].clone();
    for (n, next) in results[1..].iter().enumerate() {
        if next.len() != acc.len() {
            // Inherited silent-skip behavior; surfaced in logs only.
            tracing::warn!(
                segment = n + 1,
                expected = acc.len(),
                got = next.len(),
                "segment result length mismatch in append mode, extra indices skipped"
            );
        }
        for (i, right) in next.iter().enumerate() {
            if i >= acc.len() {
                break;
            }
            acc[i] = join(&acc[i], right);
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::compile;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn single_segment_verbatim() {
        let plan = compile("animals", 2).unwrap();
        let out = combine(&plan, &[strings(&["A", "B"])]);
        assert_eq!(out, vec!["A", "B"]);
    }

    #[test]
    fn explode_cartesian_product() {
        let plan = compile("animals :: 2numbers", 2).unwrap();
        assert!(plan.explode);
        let out = combine(&plan, &[strings(&["A", "B"]), strings(&["1", "2"])]);
        assert_eq!(out, vec!["A, 1", "A, 2", "B, 1", "B, 2"]);
    }

    #[test]
    fn explode_three_segments() {
        let plan = compile("a :: 2b :: c", 2).unwrap();
        let out = combine(
            &plan,
            &[strings(&["A"]), strings(&["1", "2"]), strings(&["x"])],
        );
        assert_eq!(out, vec!["A, 1, x", "A, 2, x"]);
    }

    #[test]
    fn append_positional_zip() {
        let plan = compile("animals :: numbers", 2).unwrap();
        assert!(!plan.explode);
        let out = combine(&plan, &[strings(&["A", "B"]), strings(&["1", "2"])]);
        assert_eq!(out, vec!["A, 1", "B, 2"]);
    }

    #[test]
    fn separator_respects_trailing_punctuation() {
        let plan = compile("a :: b", 1).unwrap();
        let out = combine(&plan, &[strings(&["oil painting,"]), strings(&["moody"])]);
        assert_eq!(out, vec!["oil painting, moody"]);

        let out = combine(&plan, &[strings(&["A study."]), strings(&["watercolor"])]);
        assert_eq!(out, vec!["A study. watercolor"]);
    }

    #[test]
    fn append_shorter_later_segment_skipped() {
        let plan = compile("a :: b", 3).unwrap();
        let out = combine(&plan, &[strings(&["A", "B", "C"]), strings(&["1"])]);
        assert_eq!(out, vec!["A, 1", "B", "C"]);
    }

    #[test]
    fn append_longer_later_segment_truncated() {
        let plan = compile("a :: b", 1).unwrap();
        let out = combine(&plan, &[strings(&["A"]), strings(&["1", "2", "3"])]);
        assert_eq!(out, vec!["A, 1"]);
    }

    #[test]
    fn empty_results_empty_output() {
        let plan = compile("::", 1).unwrap();
        let out = combine(&plan, &[]);
        assert!(out.is_empty());
    }

    #[test]
    fn explode_length_is_product_of_counts() {
        let plan = compile("a :: 3b :: 2c", 2).unwrap();
        let out = combine(
            &plan,
            &[
                strings(&["A", "B", "C"]),
                strings(&["1", "2"]),
                strings(&["x", "y"]),
            ],
        );
        assert_eq!(out.len(), 3 * 2 * 2);
        assert_eq!(out[0], "A, 1, x");
        assert_eq!(out[11], "C, 2, y");
    }
}
