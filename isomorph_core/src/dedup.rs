//! Dedup Set - relationships already proven equal (or in progress).
//!
//! Membership of a key means the pair must not be visited again. This is
//! what makes cyclic and diamond-shaped graphs terminate.

use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How the dedup key is formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DedupPolicy {
    /// (expected identity, actual identity, member name)
    #[default]
    PerMember,
    /// (expected identity, actual identity); a pair reached through any
    /// member is visited once
    PerPair,
}

/// Key of one validated relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub expected: Identity,
    pub actual: Identity,
    pub member: Option<&'static str>,
}

/// Per-call set of seen keys.
#[derive(Debug, Default)]
pub struct DedupSet {
    policy: DedupPolicy,
    seen: HashSet<DedupKey>,
}

impl DedupSet {
    pub fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            seen: HashSet::new(),
        }
    }

    /// Builds the key for a pair reached through `member`, honouring the policy.
    pub fn key(&self, expected: Identity, actual: Identity, member: &'static str) -> DedupKey {
        let member = match self.policy {
            DedupPolicy::PerMember => Some(member),
            DedupPolicy::PerPair => None,
        };
        DedupKey {
            expected,
            actual,
            member,
        }
    }

    /// Marks the key as seen. Returns false if it was already present.
    pub fn insert(&mut self, key: DedupKey) -> bool {
        self.seen.insert(key)
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
