//! Mismatch Reports
//! ================
//!
//! A [`MismatchReport`] pinpoints the first divergence of a failed call:
//! the breadcrumb path from the root type through member names and element
//! indices, the truncated textual form of both sides, and a
//! [`MismatchKind`] classification tag.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker appended to text cut at the display cap.
pub const TRUNCATION_MARKER: &str = " ...";

/// Default display cap for rendered values, in characters.
pub const DEFAULT_MAX_DISPLAY_LENGTH: usize = 200;

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Why two graphs diverged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MismatchKind {
    /// Exactly one side is null
    NullMismatch,
    /// Runtime types differ
    TypeMismatch,
    /// Sequence lengths differ
    LengthMismatch,
    /// Primitive values differ
    ValueMismatch,
}

impl MismatchKind {
    pub fn name(&self) -> &'static str {
        match self {
            MismatchKind::NullMismatch => "NullMismatch",
            MismatchKind::TypeMismatch => "TypeMismatch",
            MismatchKind::LengthMismatch => "LengthMismatch",
            MismatchKind::ValueMismatch => "ValueMismatch",
        }
    }
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Side of the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Expected,
    Actual,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Expected => f.write_str("expected"),
            Side::Actual => f.write_str("actual"),
        }
    }
}

// =============================================================================
// BREADCRUMB PATH
// =============================================================================

/// One step of the route from the root to a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Member(&'static str),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Member(name) => write!(f, ".{}", name),
            PathSegment::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// Renders `Root.member[3].next` from a root type name and its segments.
pub fn render_path<'a>(root: &str, segments: impl IntoIterator<Item = &'a PathSegment>) -> String {
    let mut path = root.to_string();
    for segment in segments {
        path.push_str(&segment.to_string());
    }
    path
}

/// Caps `text` at `max_chars` characters, appending [`TRUNCATION_MARKER`]
/// when anything was cut. Counts characters, not bytes.
pub fn truncate_for_display(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// Location and cause of the first divergence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchReport {
    pub path: String,
    pub kind: MismatchKind,
    pub expected_text: String,
    pub actual_text: String,
    /// For `NullMismatch`, the side that was null
    pub null_side: Option<Side>,
}

impl fmt::Display for MismatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.path)?;
        match (self.kind, self.null_side) {
            (MismatchKind::NullMismatch, Some(side)) => write!(
                f,
                ": {} value is null ('{}' vs '{}')",
                side, self.expected_text, self.actual_text
            ),
            _ => write!(
                f,
                ": expected '{}', actual '{}'",
                self.expected_text, self.actual_text
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_path_rendering() {
        let segments = vec![
            PathSegment::Member("orders"),
            PathSegment::Index(3),
            PathSegment::Member("id"),
        ];
        assert_eq!(render_path("Customer", &segments), "Customer.orders[3].id");
        assert_eq!(render_path("Customer", std::iter::empty()), "Customer");
    }

    #[test]
    fn test_truncation_of_long_text() {
        let text = "a".repeat(500);
        let shown = truncate_for_display(&text, 200);
        assert_eq!(shown.len(), 200 + TRUNCATION_MARKER.len());
        assert!(shown.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(truncate_for_display("abc", 3), "abc");
        assert_eq!(truncate_for_display("", 0), "");
    }

    #[test]
    fn test_truncation_is_char_safe() {
        let shown = truncate_for_display("ééééé", 2);
        assert_eq!(shown, format!("éé{}", TRUNCATION_MARKER));
    }

    #[test]
    fn test_report_display() {
        let report = MismatchReport {
            path: "Node.value".into(),
            kind: MismatchKind::ValueMismatch,
            expected_text: "1".into(),
            actual_text: "2".into(),
            null_side: None,
        };
        assert_eq!(report.to_string(), "ValueMismatch at Node.value: expected '1', actual '2'");
    }

    proptest! {
        #[test]
        fn prop_truncated_text_never_exceeds_cap(text in ".{0,300}", cap in 0usize..250) {
            let shown = truncate_for_display(&text, cap);
            let body = shown.strip_suffix(TRUNCATION_MARKER).unwrap_or(&shown);
            prop_assert!(body.chars().count() <= cap);
            prop_assert!(text.starts_with(body));
        }
    }
}
