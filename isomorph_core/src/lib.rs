//! isomorph Core - Structural Equality Validation for Object Graphs
//!
//! Given two runtime object graphs of unknown, possibly cyclic shape, the
//! validator decides whether they are deeply equal and, if not, reports the
//! exact location and cause of the first divergence.
//!
//! Components, leaves first:
//! 1. **Introspector**: ordered member descriptors per runtime type
//! 2. **Identity Registry**: reference identities scoped to one call
//! 3. **Dedup Set**: relationships already validated, for cycle safety
//! 4. **Traversal Engine**: explicit-stack lockstep walk
//! 5. **Equality Engine**: comparison rules and mismatch reports
//! 6. **Cancellation Harness**: deadline race on the blocking pool
//!
//! ```ignore
//! use isomorph_core::{introspect, validate_objects_are_equal, ValidationOptions};
//!
//! #[derive(Clone)]
//! struct Order { id: u32, lines: Vec<String> }
//! introspect!(Order { id, lines });
//!
//! validate_objects_are_equal(&expected, &actual, ValidationOptions::default()).await?;
//! ```

pub mod assertions;
pub mod dedup;
pub mod equality;
pub mod error;
pub mod harness;
pub mod identity;
pub mod introspect;
pub mod json;
pub mod options;
pub mod report;
pub mod traversal;
pub mod value;

// Re-export key types for convenience
pub use assertions::{assert_graphs_equal, assert_graphs_equal_with, expect_error, expect_panic};
pub use dedup::{DedupKey, DedupPolicy, DedupSet};
pub use equality::Validator;
pub use error::{ErrorKind, ValidationError};
pub use harness::{validate_objects_are_equal, CancellationHarness};
pub use identity::{Identity, IdentityRegistry};
pub use introspect::{
    IgnorePredicate, Introspect, Introspector, MapEntry, MemberDescriptor, MemberKind,
    ELEMENTS_MEMBER,
};
pub use json::{JsonArray, JsonObject};
pub use options::{MemberHook, MemberVisit, MismatchEvent, MismatchHook, ValidationOptions};
pub use report::{MismatchKind, MismatchReport, PathSegment, Side};
pub use traversal::{Outcome, TraversalState, ValidationStats};
pub use value::{InlineRef, Node, Primitive, Reading, ToValue, Value};
