//! Equality Engine - comparison rules over the traversal.
//!
//! Rules, applied in order to every visited pair:
//! 1. both null is equal; exactly one null is a `NullMismatch`
//! 2. reference-equal pairs are equal without descent
//! 3. differing runtime types are a `TypeMismatch`
//! 4. primitives compare by value (`ValueMismatch`)
//! 5. sequences must have equal lengths (`LengthMismatch`) before elements
//!    are compared
//! 6. other composites are compared member by member
//!
//! The first mismatch ends the call.

use crate::error::ValidationError;
use crate::introspect::MemberDescriptor;
use crate::options::{MemberHook, MemberVisit, MismatchEvent, ValidationOptions};
use crate::report::{truncate_for_display, MismatchKind, MismatchReport, Side};
use crate::traversal::{Outcome, Step, Traversal, TraversalState, ValidationStats, Visit};
use crate::value::{Node, Value};
use tracing::{debug, warn};

/// How one pair of values compares before any descent.
enum Verdict {
    Equal,
    SameReference,
    Differ(MismatchKind, Option<Side>),
    Descend(Node, Node),
}

fn classify(expected: &Value, actual: &Value) -> Verdict {
    match (expected, actual) {
        (Value::Null, Value::Null) => Verdict::Equal,
        (Value::Null, _) => Verdict::Differ(MismatchKind::NullMismatch, Some(Side::Expected)),
        (_, Value::Null) => Verdict::Differ(MismatchKind::NullMismatch, Some(Side::Actual)),
        (Value::Object(e), Value::Object(a)) if e.ptr_eq(a) => Verdict::SameReference,
        (Value::Object(e), Value::Object(a)) => {
            if e.runtime_type() != a.runtime_type() {
                Verdict::Differ(MismatchKind::TypeMismatch, None)
            } else {
                Verdict::Descend(e.clone(), a.clone())
            }
        }
        (Value::Primitive(e), Value::Primitive(a)) => {
            if e.type_name() != a.type_name() {
                Verdict::Differ(MismatchKind::TypeMismatch, None)
            } else if e.value_eq(a) {
                Verdict::Equal
            } else {
                Verdict::Differ(MismatchKind::ValueMismatch, None)
            }
        }
        _ => Verdict::Differ(MismatchKind::TypeMismatch, None),
    }
}

fn fire(hook: &Option<MemberHook>, visit: &MemberVisit<'_>) {
    if let Some(hook) = hook {
        hook(visit);
    }
}

/// Synchronous structural validator. Every call owns fresh registries.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    options: ValidationOptions,
}

impl Validator {
    pub fn new(options: ValidationOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Validates that `expected` and `actual` are structurally equal.
    pub fn validate(
        &self,
        expected: &Value,
        actual: &Value,
    ) -> Result<ValidationStats, ValidationError> {
        let mut state = TraversalState::default();
        state.begin();

        let result = self.run(expected, actual);
        state.complete(match &result {
            Ok(_) => Outcome::Success,
            Err(ValidationError::Mismatch(_)) => Outcome::Mismatch,
            Err(ValidationError::Timeout { .. }) => Outcome::Timeout,
            Err(_) => Outcome::Fatal,
        });

        match &result {
            Ok(stats) => debug!(
                members = stats.members_visited,
                frames = stats.frames_pushed,
                max_depth = stats.max_depth,
                "Graphs are equal"
            ),
            Err(err) => warn!(error = %err, "Validation failed"),
        }
        result
    }

    fn run(&self, expected: &Value, actual: &Value) -> Result<ValidationStats, ValidationError> {
        let mut traversal = Traversal::new(
            self.options.ignore.clone(),
            self.options.dedup_policy,
            self.options.iteration_ceiling,
        );

        match classify(expected, actual) {
            Verdict::Equal => return Ok(traversal.finish()),
            Verdict::SameReference => {
                traversal.record_shortcut();
                return Ok(traversal.finish());
            }
            Verdict::Differ(kind, null_side) => {
                let root = match expected {
                    Value::Null => actual.type_name(),
                    _ => expected.type_name(),
                };
                let report = self.report(root.to_string(), kind, null_side, expected, actual);
                return Err(self.fail(expected, actual, report));
            }
            Verdict::Descend(e, a) => traversal.push_root(e, a),
        }

        while let Some(step) = traversal.next_step()? {
            match step {
                Step::Visit(visit) => self.visit(&mut traversal, visit)?,
                Step::LengthMismatch {
                    member,
                    expected: e,
                    actual: a,
                } => return Err(self.length_mismatch(&traversal, &member, e, a)),
                Step::Unreadable(member) => {
                    return Err(ValidationError::AccessorFailed {
                        path: traversal.path(None),
                        member,
                    });
                }
            }
        }

        Ok(traversal.finish())
    }

    fn visit(&self, traversal: &mut Traversal, visit: Visit) -> Result<(), ValidationError> {
        let (expected_parent, actual_parent) = match traversal.top() {
            Some(frame) => (frame.expected_id(), frame.actual_id()),
            None => return Ok(()),
        };
        let depth = traversal.depth();
        let member_visit = MemberVisit {
            member: &visit.member,
            depth,
            expected_parent,
            actual_parent,
            expected: &visit.expected,
            actual: &visit.actual,
            index: visit.index,
        };

        fire(&self.options.on_member_start, &member_visit);

        let result = match classify(&visit.expected, &visit.actual) {
            Verdict::Equal => Ok(()),
            Verdict::SameReference => {
                traversal.record_shortcut();
                Ok(())
            }
            Verdict::Differ(kind, null_side) => {
                let path = traversal.path(Some(visit.segment()));
                let report = self.report(path, kind, null_side, &visit.expected, &visit.actual);
                Err(self.fail(&visit.expected, &visit.actual, report))
            }
            Verdict::Descend(e, a) => {
                traversal.push_child(&visit, e, a);
                Ok(())
            }
        };

        fire(&self.options.on_member_done, &member_visit);
        result
    }

    /// The sequence member of the top frame has different lengths. The
    /// member hooks see the two lengths.
    fn length_mismatch(
        &self,
        traversal: &Traversal,
        member: &MemberDescriptor,
        expected: usize,
        actual: usize,
    ) -> ValidationError {
        let expected_len = Value::Primitive(expected.into());
        let actual_len = Value::Primitive(actual.into());
        let member_visit = traversal.top().map(|frame| MemberVisit {
            member,
            depth: traversal.depth(),
            expected_parent: frame.expected_id(),
            actual_parent: frame.actual_id(),
            expected: &expected_len,
            actual: &actual_len,
            index: None,
        });

        if let Some(member_visit) = &member_visit {
            fire(&self.options.on_member_start, member_visit);
        }
        let report = MismatchReport {
            path: traversal.path(None),
            kind: MismatchKind::LengthMismatch,
            expected_text: expected.to_string(),
            actual_text: actual.to_string(),
            null_side: None,
        };
        let err = self.fail(&expected_len, &actual_len, report);
        if let Some(member_visit) = &member_visit {
            fire(&self.options.on_member_done, member_visit);
        }
        err
    }

    fn report(
        &self,
        path: String,
        kind: MismatchKind,
        null_side: Option<Side>,
        expected: &Value,
        actual: &Value,
    ) -> MismatchReport {
        let render = |value: &Value| match kind {
            MismatchKind::TypeMismatch => value.type_name().to_string(),
            _ => value.render(),
        };
        let cap = self.options.max_display_length;
        MismatchReport {
            path,
            kind,
            expected_text: truncate_for_display(&render(expected), cap),
            actual_text: truncate_for_display(&render(actual), cap),
            null_side,
        }
    }

    fn fail(&self, expected: &Value, actual: &Value, report: MismatchReport) -> ValidationError {
        if let Some(hook) = &self.options.on_mismatch {
            hook(&MismatchEvent {
                expected,
                actual,
                report: &report,
            });
        }
        ValidationError::mismatch(report)
    }
}
