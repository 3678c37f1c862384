//! Identity Registry - stable per-call identities for object references.
//!
//! Identities follow reference semantics: the same object always maps to
//! the same identity, two objects never share one, regardless of content.
//! An object is its address plus its runtime type, since a struct and its
//! first field live at the same address. The registry pins every node it has
//! seen so an address cannot be freed and reused by another object mid-call.

use crate::value::Node;
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::collections::HashMap;

/// Opaque identity of one object reference within one validation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity(u64);

impl Identity {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Assigns identities in first-visit order. No eviction.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    by_address: HashMap<(usize, TypeId), Identity>,
    pinned: Vec<Node>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identity of `node`, assigning the next one on first sight.
    pub fn get_or_create(&mut self, node: &Node) -> Identity {
        let address = (node.address(), node.runtime_type());
        if let Some(identity) = self.by_address.get(&address) {
            return *identity;
        }

        let identity = Identity(self.pinned.len() as u64);
        self.by_address.insert(address, identity);
        self.pinned.push(node.clone());
        identity
    }

    /// Number of identities assigned so far.
    pub fn len(&self) -> usize {
        self.pinned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_same_reference_same_identity() {
        let shared = Arc::new(vec![1, 2]);
        let mut registry = IdentityRegistry::new();
        let a = registry.get_or_create(&Node::shared(&shared));
        let b = registry.get_or_create(&Node::shared(&shared));
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_equal_content_distinct_identity() {
        let mut registry = IdentityRegistry::new();
        let a = registry.get_or_create(&Node::new(vec![1, 2]));
        let b = registry.get_or_create(&Node::new(vec![1, 2]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_identities_are_monotonic() {
        let mut registry = IdentityRegistry::new();
        let ids: Vec<u64> = (0..5)
            .map(|i| registry.get_or_create(&Node::new(vec![i])).value())
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_struct_and_first_field_are_distinct() {
        #[derive(Debug, Clone)]
        struct Wrapper {
            inner: Vec<u8>,
        }
        crate::introspect!(Wrapper { inner });

        let outer = Node::new(Wrapper { inner: vec![1] });
        let member = outer.introspect().members().remove(0);
        let inner = match outer.read(&member) {
            Some(crate::value::Value::Object(node)) => node,
            other => panic!("expected the inline vector, got {:?}", other),
        };

        let mut registry = IdentityRegistry::new();
        let a = registry.get_or_create(&outer);
        let b = registry.get_or_create(&inner);
        assert_ne!(a, b);
        assert!(!outer.ptr_eq(&inner));
        assert_eq!(registry.get_or_create(&inner), b);
    }

    #[test]
    fn test_dropped_temporaries_do_not_alias() {
        // Without pinning, the allocator could hand the freed address of the
        // first temporary to the second one.
        let mut registry = IdentityRegistry::new();
        let first = registry.get_or_create(&Node::new(vec![0u8]));
        let second = registry.get_or_create(&Node::new(vec![0u8]));
        assert_ne!(first, second);
    }
}
