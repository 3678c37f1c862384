//! The Introspector - ordered member descriptors for runtime types.
//!
//! Rust has no runtime reflection, so comparable members are declared by
//! implementing [`Introspect`] (usually through the [`introspect!`] macro).
//! The [`Introspector`] registry caches each type's filtered descriptor list
//! for the duration of one validation call and appends the synthetic
//! `elements` pseudo-member for sequence-shaped types.
//!
//! # Contract
//!
//! - `members()` describes the *type*, not the instance: it must return the
//!   same names in the same (declaration) order every time.
//! - Accessors are typed: a descriptor only reads owners of the type that
//!   declared it.
//!
//! [`introspect!`]: crate::introspect!

use crate::value::{Reading, ToValue, Value};
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Name of the synthetic pseudo-member standing for ordered iteration.
pub const ELEMENTS_MEMBER: &str = "elements";

/// A runtime type whose comparable members can be enumerated.
pub trait Introspect: Any + Send + Sync {
    /// Runtime type name used in breadcrumb paths and type mismatch reports.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn as_any(&self) -> &dyn Any;

    /// Declared members in declaration order.
    fn members(&self) -> Vec<MemberDescriptor>;

    /// True when the type supports ordered iteration.
    fn is_sequence(&self) -> bool {
        false
    }

    /// Elements in iteration order, for sequence-shaped types.
    fn elements(&self) -> Option<Vec<Reading<'_>>> {
        None
    }
}

// =============================================================================
// MEMBER DESCRIPTORS
// =============================================================================

/// What a descriptor stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// A named attribute read through a typed accessor
    Field,
    /// The synthetic pseudo-member representing ordered iteration
    Elements,
}

type Accessor = Arc<dyn for<'a> Fn(&'a dyn Any) -> Option<Reading<'a>> + Send + Sync>;

fn accessor<F>(read: F) -> Accessor
where
    F: for<'a> Fn(&'a dyn Any) -> Option<Reading<'a>> + Send + Sync + 'static,
{
    Arc::new(read)
}

/// Name plus typed accessor for one comparable attribute of a type.
#[derive(Clone)]
pub struct MemberDescriptor {
    name: &'static str,
    declaring_type: &'static str,
    kind: MemberKind,
    accessor: Option<Accessor>,
}

impl MemberDescriptor {
    /// Declares a field of `T` whose value `read` produces.
    pub fn field<T, F>(name: &'static str, read: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        Self::borrowed::<T, _>(name, move |owner| Reading::Value(read(owner)))
    }

    /// Declares a field of `T` that may be borrowed from the owner in place.
    pub fn borrowed<T, F>(name: &'static str, read: F) -> Self
    where
        T: Any,
        F: for<'a> Fn(&'a T) -> Reading<'a> + Send + Sync + 'static,
    {
        Self {
            name,
            declaring_type: std::any::type_name::<T>(),
            kind: MemberKind::Field,
            accessor: Some(accessor(move |owner| owner.downcast_ref::<T>().map(&read))),
        }
    }

    pub(crate) fn elements(declaring_type: &'static str) -> Self {
        Self {
            name: ELEMENTS_MEMBER,
            declaring_type,
            kind: MemberKind::Elements,
            accessor: None,
        }
    }

    /// Re-targets this descriptor at a wrapper type `W` that exposes its
    /// inner value through `unwrap`. Used by the lock wrappers; whatever is
    /// read through the wrapper is copied out of it.
    pub fn through<W, F>(self, unwrap: F) -> Self
    where
        W: Any,
        F: Fn(&W, &dyn Fn(&dyn Any) -> Option<Value>) -> Option<Value> + Send + Sync + 'static,
    {
        let inner = match self.accessor {
            Some(inner) => inner,
            None => return self,
        };
        Self {
            name: self.name,
            declaring_type: std::any::type_name::<W>(),
            kind: self.kind,
            accessor: Some(accessor(move |owner| {
                let wrapper = owner.downcast_ref::<W>()?;
                let read = |value: &dyn Any| inner(value).map(Reading::into_value);
                unwrap(wrapper, &read).map(Reading::Value)
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn declaring_type(&self) -> &'static str {
        self.declaring_type
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn is_elements(&self) -> bool {
        self.kind == MemberKind::Elements
    }

    /// Reads the member from `owner`. `None` means the owner is not of the
    /// declaring type.
    pub fn read<'a>(&self, owner: &'a dyn Any) -> Option<Reading<'a>> {
        self.accessor.as_ref().and_then(|accessor| accessor(owner))
    }
}

impl fmt::Debug for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDescriptor")
            .field("name", &self.name)
            .field("declaring_type", &self.declaring_type)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Predicate deciding whether a member is excluded from comparison.
pub type IgnorePredicate = Arc<dyn Fn(&MemberDescriptor) -> bool + Send + Sync>;

// =============================================================================
// INTROSPECTOR REGISTRY
// =============================================================================

/// Per-call registry of filtered member lists, keyed by runtime type.
pub struct Introspector {
    cache: HashMap<TypeId, Arc<[MemberDescriptor]>>,
    ignore: Option<IgnorePredicate>,
}

impl Introspector {
    pub fn new(ignore: Option<IgnorePredicate>) -> Self {
        Self {
            cache: HashMap::new(),
            ignore,
        }
    }

    /// Ordered, filtered members of the node's runtime type.
    ///
    /// Ignored members never appear in the returned list.
    pub fn members_of(&mut self, node: &dyn Introspect) -> Arc<[MemberDescriptor]> {
        let type_id = node.as_any().type_id();
        if let Some(members) = self.cache.get(&type_id) {
            return Arc::clone(members);
        }

        let mut members = node.members();
        if node.is_sequence() {
            members.push(MemberDescriptor::elements(node.type_name()));
        }
        if let Some(ignore) = &self.ignore {
            members.retain(|member| !ignore(member));
        }

        let members: Arc<[MemberDescriptor]> = members.into();
        self.cache.insert(type_id, Arc::clone(&members));
        members
    }

    /// Number of distinct types described so far.
    pub fn described_types(&self) -> usize {
        self.cache.len()
    }
}

// =============================================================================
// STANDARD LIBRARY IMPLEMENTATIONS
// =============================================================================

macro_rules! sequence_introspect {
    ($($ty:ident),*) => {
        $(
            impl<T> Introspect for $ty<T>
            where
                T: ToValue + Clone + Send + Sync + 'static,
            {
                fn type_name(&self) -> &'static str {
                    stringify!($ty)
                }

                fn as_any(&self) -> &dyn Any {
                    self
                }

                fn members(&self) -> Vec<MemberDescriptor> {
                    Vec::new()
                }

                fn is_sequence(&self) -> bool {
                    true
                }

                fn elements(&self) -> Option<Vec<Reading<'_>>> {
                    Some(self.iter().map(ToValue::reading).collect())
                }
            }
        )*
    };
}

sequence_introspect!(Vec, VecDeque, BTreeSet);

impl<T, const N: usize> Introspect for [T; N]
where
    T: ToValue + Clone + Send + Sync + 'static,
{
    fn type_name(&self) -> &'static str {
        "Array"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn members(&self) -> Vec<MemberDescriptor> {
        Vec::new()
    }

    fn is_sequence(&self) -> bool {
        true
    }

    fn elements(&self) -> Option<Vec<Reading<'_>>> {
        Some(self.iter().map(ToValue::reading).collect())
    }
}

/// One key/value pair of an ordered map.
#[derive(Debug, Clone)]
pub struct MapEntry<K, V> {
    pub key: K,
    pub value: V,
}

impl<K, V> Introspect for MapEntry<K, V>
where
    K: ToValue + Send + Sync + 'static,
    V: ToValue + Send + Sync + 'static,
{
    fn type_name(&self) -> &'static str {
        "MapEntry"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn members(&self) -> Vec<MemberDescriptor> {
        vec![
            MemberDescriptor::borrowed::<Self, _>("key", |entry| entry.key.reading()),
            MemberDescriptor::borrowed::<Self, _>("value", |entry| entry.value.reading()),
        ]
    }
}

impl<K, V> Introspect for BTreeMap<K, V>
where
    K: ToValue + Clone + Send + Sync + 'static,
    V: ToValue + Clone + Send + Sync + 'static,
{
    fn type_name(&self) -> &'static str {
        "BTreeMap"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn members(&self) -> Vec<MemberDescriptor> {
        Vec::new()
    }

    fn is_sequence(&self) -> bool {
        true
    }

    fn elements(&self) -> Option<Vec<Reading<'_>>> {
        Some(
            self.iter()
                .map(|(key, value)| {
                    Reading::Value(Value::object(MapEntry {
                        key: key.clone(),
                        value: value.clone(),
                    }))
                })
                .collect(),
        )
    }
}

// Locks are transparent: each member read takes the lock for the duration
// of that read only. A poisoned lock still holds the last written value,
// which is what gets compared.

macro_rules! lock_introspect {
    ($($lock:ident => $acquire:ident),*) => {
        $(
            impl<T: Introspect> Introspect for $lock<T> {
                fn type_name(&self) -> &'static str {
                    stringify!($lock)
                }

                fn as_any(&self) -> &dyn Any {
                    self
                }

                fn members(&self) -> Vec<MemberDescriptor> {
                    let inner = self.$acquire().unwrap_or_else(PoisonError::into_inner);
                    inner
                        .members()
                        .into_iter()
                        .map(|member| {
                            member.through::<$lock<T>, _>(|lock, read| {
                                let guard = lock.$acquire().unwrap_or_else(PoisonError::into_inner);
                                let value = read(Introspect::as_any(&*guard));
                                value
                            })
                        })
                        .collect()
                }

                fn is_sequence(&self) -> bool {
                    self.$acquire().unwrap_or_else(PoisonError::into_inner).is_sequence()
                }

                fn elements(&self) -> Option<Vec<Reading<'_>>> {
                    let guard = self.$acquire().unwrap_or_else(PoisonError::into_inner);
                    let elements = guard
                        .elements()?
                        .into_iter()
                        .map(|reading| Reading::Value(reading.into_value()))
                        .collect();
                    Some(elements)
                }
            }
        )*
    };
}

lock_introspect!(Mutex => lock, RwLock => read);

// =============================================================================
// DERIVE MACRO
// =============================================================================

/// Implements [`Introspect`](crate::Introspect) for a struct from its field list.
///
/// The plain form also implements [`ToValue`](crate::ToValue) by cloning the
/// struct into a fresh node, so the type can be used as an inline field.
/// The `shared` form only implements `Introspect`, for types that are always
/// reached through `Arc` (and usually are not `Clone`).
///
/// ```ignore
/// #[derive(Clone)]
/// struct Order { id: u32, lines: Vec<Line> }
/// introspect!(Order { id, lines });
///
/// struct Link { value: i64, next: Mutex<Option<Arc<Link>>> }
/// introspect!(shared Link { value, next });
/// ```
#[macro_export]
macro_rules! introspect {
    (shared $ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::Introspect for $ty {
            fn type_name(&self) -> &'static str {
                ::std::stringify!($ty)
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn members(&self) -> ::std::vec::Vec<$crate::MemberDescriptor> {
                ::std::vec![
                    $(
                        $crate::MemberDescriptor::borrowed::<$ty, _>(
                            ::std::stringify!($field),
                            |owner| $crate::ToValue::reading(&owner.$field),
                        )
                    ),*
                ]
            }
        }
    };
    ($ty:ty { $($field:ident),* $(,)? }) => {
        $crate::introspect!(shared $ty { $($field),* });

        impl $crate::ToValue for $ty {
            fn to_value(&self) -> $crate::Value {
                $crate::Value::object(::std::clone::Clone::clone(self))
            }

            fn reading(&self) -> $crate::Reading<'_> {
                $crate::Reading::inline(self)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect;

    #[derive(Debug, Clone)]
    struct Sample {
        id: u32,
        name: String,
        counter: u64,
    }
    introspect!(Sample { id, name, counter });

    fn names(members: &[MemberDescriptor]) -> Vec<&'static str> {
        members.iter().map(|m| m.name()).collect()
    }

    #[test]
    fn test_members_follow_declaration_order() {
        let sample = Sample { id: 1, name: "a".into(), counter: 0 };
        let mut introspector = Introspector::new(None);
        let members = introspector.members_of(&sample);
        assert_eq!(names(&members), vec!["id", "name", "counter"]);
    }

    #[test]
    fn test_members_are_cached_per_type() {
        let a = Sample { id: 1, name: "a".into(), counter: 0 };
        let b = Sample { id: 2, name: "b".into(), counter: 9 };
        let mut introspector = Introspector::new(None);
        let first = introspector.members_of(&a);
        let second = introspector.members_of(&b);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(introspector.described_types(), 1);
    }

    #[test]
    fn test_ignore_predicate_removes_members() {
        let sample = Sample { id: 1, name: "a".into(), counter: 0 };
        let ignore: IgnorePredicate = Arc::new(|m: &MemberDescriptor| m.name() == "counter");
        let mut introspector = Introspector::new(Some(ignore));
        let members = introspector.members_of(&sample);
        assert_eq!(names(&members), vec!["id", "name"]);
    }

    #[test]
    fn test_sequence_gets_elements_member() {
        let list = vec![1u8, 2, 3];
        let mut introspector = Introspector::new(None);
        let members = introspector.members_of(&list);
        assert_eq!(names(&members), vec![ELEMENTS_MEMBER]);
        assert!(members[0].is_elements());
    }

    #[test]
    fn test_accessor_reads_typed_owner() {
        let sample = Sample { id: 7, name: "x".into(), counter: 0 };
        let members = sample.members();
        let value = members[0].read(&sample).unwrap().into_value();
        assert_eq!(value.render(), "7");

        // Wrong owner type is rejected
        assert!(members[0].read(&5u8).is_none());
    }

    #[test]
    fn test_mutex_members_read_through_lock() {
        let locked = Mutex::new(Sample { id: 3, name: "m".into(), counter: 1 });
        let members = locked.members();
        assert_eq!(names(&members), vec!["id", "name", "counter"]);
        assert_eq!(members[1].read(&locked).unwrap().into_value().render(), "m");
    }

    #[test]
    fn test_poisoned_mutex_still_describes_members() {
        let locked = Arc::new(Mutex::new(Sample { id: 4, name: "p".into(), counter: 0 }));
        let poisoner = Arc::clone(&locked);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(locked.is_poisoned());

        let members = locked.members();
        assert_eq!(names(&members), vec!["id", "name", "counter"]);
        assert_eq!(members[0].read(&*locked).unwrap().into_value().render(), "4");
    }

    #[test]
    fn test_inline_field_is_borrowed() {
        #[derive(Debug, Clone)]
        struct Outer {
            inner: Sample,
        }
        introspect!(Outer { inner });

        let outer = Outer {
            inner: Sample { id: 1, name: "i".into(), counter: 0 },
        };
        let members = outer.members();
        match members[0].read(&outer).unwrap() {
            Reading::Inline(inline) => {
                let target = inline.target.as_any().downcast_ref::<Sample>().unwrap();
                assert!(std::ptr::eq(target, &outer.inner));
            }
            other => panic!("expected an inline reading, got {:?}", other),
        }
    }

    #[test]
    fn test_type_names_are_short() {
        let sample = Sample { id: 1, name: "a".into(), counter: 0 };
        assert_eq!(Introspect::type_name(&sample), "Sample");
        assert_eq!(Introspect::type_name(&vec![1u8]), "Vec");
    }

    #[test]
    fn test_btree_map_elements_are_entries() {
        let mut map = BTreeMap::new();
        map.insert("b".to_string(), 2u8);
        map.insert("a".to_string(), 1u8);
        let elements: Vec<Value> = map
            .elements()
            .unwrap()
            .into_iter()
            .map(Reading::into_value)
            .collect();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].type_name(), "MapEntry");
    }
}
