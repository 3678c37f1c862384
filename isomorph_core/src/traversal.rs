//! Traversal Engine - iterative lockstep walk over two graphs.
//!
//! The walk uses an explicit stack of [`Frame`]s instead of host recursion,
//! so arbitrarily deep or cyclic graphs never touch the call stack. Each
//! frame owns one expected/actual composite pair, a position in that pair's
//! member list, and, while a sequence is being compared, a cursor into its
//! elements.
//!
//! Frames are pushed once and popped once. Nothing outside the stack holds
//! a reference to a frame.

use crate::dedup::{DedupPolicy, DedupSet};
use crate::error::ValidationError;
use crate::identity::{Identity, IdentityRegistry};
use crate::introspect::{IgnorePredicate, Introspector, MemberDescriptor};
use crate::report::{render_path, PathSegment};
use crate::value::{Node, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

// =============================================================================
// CALL STATE MACHINE
// =============================================================================

/// Terminal outcome of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    Mismatch,
    Timeout,
    Fatal,
}

/// Lifecycle of one validation call.
///
/// `Idle -> Traversing -> Completed(_)`. No transition leaves `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalState {
    #[default]
    Idle,
    Traversing,
    Completed(Outcome),
}

impl TraversalState {
    pub fn begin(&mut self) {
        debug_assert_eq!(*self, TraversalState::Idle, "traversal already started");
        *self = TraversalState::Traversing;
    }

    pub fn complete(&mut self, outcome: Outcome) {
        debug_assert!(
            !self.is_completed(),
            "illegal transition out of {:?} to {:?}",
            self,
            outcome
        );
        *self = TraversalState::Completed(outcome);
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TraversalState::Completed(_))
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            TraversalState::Completed(outcome) => Some(*outcome),
            _ => None,
        }
    }
}

// =============================================================================
// STATISTICS
// =============================================================================

/// Counters describing one successful call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStats {
    pub members_visited: u64,
    pub frames_pushed: u64,
    pub frames_popped: u64,
    /// Deepest the explicit stack grew; bounded by graph depth
    pub max_depth: usize,
    pub identities_assigned: usize,
    pub dedup_skips: u64,
    pub reference_shortcuts: u64,
    pub frame_operations: u64,
}

// =============================================================================
// FRAMES
// =============================================================================

struct ElementCursor {
    member: MemberDescriptor,
    expected: Vec<Value>,
    actual: Vec<Value>,
    next: usize,
}

/// One level of traversal state.
pub struct Frame {
    expected: Node,
    actual: Node,
    expected_id: Identity,
    actual_id: Identity,
    members: Arc<[MemberDescriptor]>,
    next_member: usize,
    cursor: Option<ElementCursor>,
    /// How the parent reached this frame; `None` for the root
    segment: Option<PathSegment>,
}

/// A member (or element) pair produced by [`Frame::advance`].
pub struct Visit {
    pub member: MemberDescriptor,
    pub index: Option<usize>,
    pub expected: Value,
    pub actual: Value,
}

impl Visit {
    /// Segment naming this visit in a breadcrumb path.
    pub fn segment(&self) -> PathSegment {
        match self.index {
            Some(index) => PathSegment::Index(index),
            None => PathSegment::Member(self.member.name()),
        }
    }
}

/// Result of advancing the top frame by one position.
pub enum Step {
    Visit(Visit),
    /// The sequence owned by the frame has a different length on each side
    LengthMismatch {
        member: MemberDescriptor,
        expected: usize,
        actual: usize,
    },
    /// An accessor could not read its owner
    Unreadable(&'static str),
}

impl Frame {
    /// Next step of this frame; `None` once no member remains and the pair
    /// is proven equal.
    fn advance(&mut self) -> Option<Step> {
        loop {
            if let Some(cursor) = &mut self.cursor {
                if cursor.next < cursor.expected.len() {
                    let index = cursor.next;
                    cursor.next += 1;
                    return Some(Step::Visit(Visit {
                        member: cursor.member.clone(),
                        index: Some(index),
                        expected: std::mem::take(&mut cursor.expected[index]),
                        actual: std::mem::take(&mut cursor.actual[index]),
                    }));
                }
                self.cursor = None;
            }

            let member = self.members.get(self.next_member).cloned()?;
            self.next_member += 1;

            if member.is_elements() {
                let (Some(expected), Some(actual)) =
                    (self.expected.elements(), self.actual.elements())
                else {
                    return Some(Step::Unreadable(member.name()));
                };
                if expected.len() != actual.len() {
                    return Some(Step::LengthMismatch {
                        member,
                        expected: expected.len(),
                        actual: actual.len(),
                    });
                }
                self.cursor = Some(ElementCursor {
                    member,
                    expected,
                    actual,
                    next: 0,
                });
                continue;
            }

            let (Some(expected), Some(actual)) =
                (self.expected.read(&member), self.actual.read(&member))
            else {
                return Some(Step::Unreadable(member.name()));
            };
            return Some(Step::Visit(Visit {
                member,
                index: None,
                expected,
                actual,
            }));
        }
    }

    pub fn expected_id(&self) -> Identity {
        self.expected_id
    }

    pub fn actual_id(&self) -> Identity {
        self.actual_id
    }
}

// =============================================================================
// TRAVERSAL
// =============================================================================

/// Per-call traversal resources: the frame stack plus the private
/// Introspector, Identity Registry and Dedup Set.
pub struct Traversal {
    stack: Vec<Frame>,
    introspector: Introspector,
    registry: IdentityRegistry,
    dedup: DedupSet,
    ceiling: u64,
    stats: ValidationStats,
}

impl Traversal {
    pub fn new(ignore: Option<IgnorePredicate>, policy: DedupPolicy, ceiling: u64) -> Self {
        Self {
            stack: Vec::new(),
            introspector: Introspector::new(ignore),
            registry: IdentityRegistry::new(),
            dedup: DedupSet::new(policy),
            ceiling,
            stats: ValidationStats::default(),
        }
    }

    /// Pushes the root pair. The root is not subject to deduplication.
    pub fn push_root(&mut self, expected: Node, actual: Node) {
        self.push(expected, actual, None);
    }

    /// Pushes a child pair reached through `visit` unless the relationship
    /// was already seen. Returns false when the pair was skipped.
    pub fn push_child(&mut self, visit: &Visit, expected: Node, actual: Node) -> bool {
        let expected_id = self.registry.get_or_create(&expected);
        let actual_id = self.registry.get_or_create(&actual);
        let key = self.dedup.key(expected_id, actual_id, visit.member.name());
        if !self.dedup.insert(key) {
            self.stats.dedup_skips += 1;
            trace!(member = visit.member.name(), %expected_id, %actual_id, "Dedup skip");
            return false;
        }
        self.push(expected, actual, Some(visit.segment()));
        true
    }

    fn push(&mut self, expected: Node, actual: Node, segment: Option<PathSegment>) {
        let expected_id = self.registry.get_or_create(&expected);
        let actual_id = self.registry.get_or_create(&actual);
        let members = self.introspector.members_of(expected.introspect());

        trace!(
            type_name = expected.type_name(),
            depth = self.stack.len() + 1,
            %expected_id,
            %actual_id,
            "Push frame"
        );

        self.stack.push(Frame {
            expected,
            actual,
            expected_id,
            actual_id,
            members,
            next_member: 0,
            cursor: None,
            segment,
        });
        self.stats.frames_pushed += 1;
        self.stats.max_depth = self.stats.max_depth.max(self.stack.len());
    }

    /// Advances the top frame, popping it when exhausted. `Ok(None)` means
    /// the stack is empty and the graphs are equal.
    pub fn next_step(&mut self) -> Result<Option<Step>, ValidationError> {
        loop {
            self.stats.frame_operations += 1;
            if self.stats.frame_operations > self.ceiling {
                return Err(ValidationError::IterationCeilingExceeded {
                    ceiling: self.ceiling,
                });
            }

            let Some(top) = self.stack.last_mut() else {
                return Ok(None);
            };

            match top.advance() {
                None => {
                    self.stack.pop();
                    self.stats.frames_popped += 1;
                }
                Some(step) => {
                    if let Step::Visit(_) = step {
                        self.stats.members_visited += 1;
                    }
                    return Ok(Some(step));
                }
            }
        }
    }

    pub fn top(&self) -> Option<&Frame> {
        self.stack.last()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Breadcrumb path of the top frame, extended by `current` if given.
    pub fn path(&self, current: Option<PathSegment>) -> String {
        let root = self
            .stack
            .first()
            .map(|frame| frame.expected.type_name())
            .unwrap_or("<root>");
        let segments = self
            .stack
            .iter()
            .filter_map(|frame| frame.segment.as_ref())
            .chain(current.as_ref());
        render_path(root, segments)
    }

    pub fn record_shortcut(&mut self) {
        self.stats.reference_shortcuts += 1;
    }

    pub fn finish(self) -> ValidationStats {
        ValidationStats {
            identities_assigned: self.registry.len(),
            ..self.stats
        }
    }
}
