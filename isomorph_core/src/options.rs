//! Configuration and instrumentation hooks for one validation call.

use crate::dedup::DedupPolicy;
use crate::identity::Identity;
use crate::introspect::{IgnorePredicate, MemberDescriptor};
use crate::report::{MismatchReport, DEFAULT_MAX_DISPLAY_LENGTH};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default deadline enforced by the cancellation harness.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default ceiling on frame operations before a traversal is declared runaway.
pub const DEFAULT_ITERATION_CEILING: u64 = 10_000_000;

/// One member validation as seen by the start/done hooks.
#[derive(Debug)]
pub struct MemberVisit<'a> {
    pub member: &'a MemberDescriptor,
    /// Stack depth of the frame owning the member (root frame = 1)
    pub depth: usize,
    pub expected_parent: Identity,
    pub actual_parent: Identity,
    pub expected: &'a Value,
    pub actual: &'a Value,
    /// Element index when the member is the `elements` pseudo-member
    pub index: Option<usize>,
}

/// The first divergence, as seen by the mismatch hook.
#[derive(Debug)]
pub struct MismatchEvent<'a> {
    pub expected: &'a Value,
    pub actual: &'a Value,
    pub report: &'a MismatchReport,
}

pub type MemberHook = Arc<dyn Fn(&MemberVisit<'_>) + Send + Sync>;
pub type MismatchHook = Arc<dyn Fn(&MismatchEvent<'_>) + Send + Sync>;

/// Recognised options of a validation call.
#[derive(Clone)]
pub struct ValidationOptions {
    /// Members for which this returns true are never visited
    pub ignore: Option<IgnorePredicate>,
    /// Display cap for rendered values, in characters
    pub max_display_length: usize,
    /// Deadline applied by the cancellation harness
    pub timeout: Duration,
    pub iteration_ceiling: u64,
    pub dedup_policy: DedupPolicy,
    pub on_member_start: Option<MemberHook>,
    pub on_member_done: Option<MemberHook>,
    pub on_mismatch: Option<MismatchHook>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            ignore: None,
            max_display_length: DEFAULT_MAX_DISPLAY_LENGTH,
            timeout: DEFAULT_TIMEOUT,
            iteration_ceiling: DEFAULT_ITERATION_CEILING,
            dedup_policy: DedupPolicy::default(),
            on_member_start: None,
            on_member_done: None,
            on_mismatch: None,
        }
    }
}

impl ValidationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ignore<F>(mut self, ignore: F) -> Self
    where
        F: Fn(&MemberDescriptor) -> bool + Send + Sync + 'static,
    {
        self.ignore = Some(Arc::new(ignore));
        self
    }

    /// Ignores every member with one of the given names, on any type.
    pub fn ignoring_members(self, names: &[&'static str]) -> Self {
        let names = names.to_vec();
        self.with_ignore(move |member| names.contains(&member.name()))
    }

    pub fn with_max_display_length(mut self, max_display_length: usize) -> Self {
        self.max_display_length = max_display_length;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_timeout_ms(self, timeout_ms: u64) -> Self {
        self.with_timeout(Duration::from_millis(timeout_ms))
    }

    pub fn with_iteration_ceiling(mut self, ceiling: u64) -> Self {
        self.iteration_ceiling = ceiling;
        self
    }

    pub fn with_dedup_policy(mut self, policy: DedupPolicy) -> Self {
        self.dedup_policy = policy;
        self
    }

    pub fn on_member_start<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MemberVisit<'_>) + Send + Sync + 'static,
    {
        self.on_member_start = Some(Arc::new(hook));
        self
    }

    pub fn on_member_done<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MemberVisit<'_>) + Send + Sync + 'static,
    {
        self.on_member_done = Some(Arc::new(hook));
        self
    }

    pub fn on_mismatch<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MismatchEvent<'_>) + Send + Sync + 'static,
    {
        self.on_mismatch = Some(Arc::new(hook));
        self
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

impl fmt::Debug for ValidationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationOptions")
            .field("ignore", &self.ignore.is_some())
            .field("max_display_length", &self.max_display_length)
            .field("timeout", &self.timeout)
            .field("iteration_ceiling", &self.iteration_ceiling)
            .field("dedup_policy", &self.dedup_policy)
            .field("on_member_start", &self.on_member_start.is_some())
            .field("on_member_done", &self.on_member_done.is_some())
            .field("on_mismatch", &self.on_mismatch.is_some())
            .finish()
    }
}
