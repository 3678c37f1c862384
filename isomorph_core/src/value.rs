//! Runtime Value Model
//! ===================
//!
//! Every node of a compared graph is seen through [`Value`]:
//! - **Null**: an absent reference (`None`, a dangling `Weak`, an unset `OnceLock`)
//! - **Primitive**: a string or value-like scalar, compared by value
//! - **Object**: a composite reached through a [`Node`] handle, compared by traversal
//!
//! A `Node` is either a shared `Arc<dyn Introspect>` or a composite stored
//! inline somewhere inside one, borrowed in place. Its address together with
//! its runtime type is the reference identity used for cycle breaking.

use crate::introspect::{Introspect, MemberDescriptor};
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex, OnceLock, RwLock, Weak};

// =============================================================================
// PRIMITIVES
// =============================================================================

/// A value-like scalar with its exact runtime type.
#[derive(Debug, Clone)]
pub enum Primitive {
    Unit,
    Bool(bool),
    Char(char),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    Isize(isize),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    Usize(usize),
    F32(f32),
    F64(f64),
    Str(String),
}

impl Primitive {
    /// Runtime type name; two primitives of different types never compare equal.
    pub fn type_name(&self) -> &'static str {
        match self {
            Primitive::Unit => "()",
            Primitive::Bool(_) => "bool",
            Primitive::Char(_) => "char",
            Primitive::I8(_) => "i8",
            Primitive::I16(_) => "i16",
            Primitive::I32(_) => "i32",
            Primitive::I64(_) => "i64",
            Primitive::I128(_) => "i128",
            Primitive::Isize(_) => "isize",
            Primitive::U8(_) => "u8",
            Primitive::U16(_) => "u16",
            Primitive::U32(_) => "u32",
            Primitive::U64(_) => "u64",
            Primitive::U128(_) => "u128",
            Primitive::Usize(_) => "usize",
            Primitive::F32(_) => "f32",
            Primitive::F64(_) => "f64",
            Primitive::Str(_) => "String",
        }
    }

    /// Value equality. NaN equals NaN, matching value semantics rather
    /// than IEEE comparison.
    pub fn value_eq(&self, other: &Primitive) -> bool {
        match (self, other) {
            (Primitive::Unit, Primitive::Unit) => true,
            (Primitive::Bool(a), Primitive::Bool(b)) => a == b,
            (Primitive::Char(a), Primitive::Char(b)) => a == b,
            (Primitive::I8(a), Primitive::I8(b)) => a == b,
            (Primitive::I16(a), Primitive::I16(b)) => a == b,
            (Primitive::I32(a), Primitive::I32(b)) => a == b,
            (Primitive::I64(a), Primitive::I64(b)) => a == b,
            (Primitive::I128(a), Primitive::I128(b)) => a == b,
            (Primitive::Isize(a), Primitive::Isize(b)) => a == b,
            (Primitive::U8(a), Primitive::U8(b)) => a == b,
            (Primitive::U16(a), Primitive::U16(b)) => a == b,
            (Primitive::U32(a), Primitive::U32(b)) => a == b,
            (Primitive::U64(a), Primitive::U64(b)) => a == b,
            (Primitive::U128(a), Primitive::U128(b)) => a == b,
            (Primitive::Usize(a), Primitive::Usize(b)) => a == b,
            (Primitive::F32(a), Primitive::F32(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Primitive::F64(a), Primitive::F64(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Primitive::Str(a), Primitive::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Unit => write!(f, "()"),
            Primitive::Bool(v) => write!(f, "{}", v),
            Primitive::Char(v) => write!(f, "{}", v),
            Primitive::I8(v) => write!(f, "{}", v),
            Primitive::I16(v) => write!(f, "{}", v),
            Primitive::I32(v) => write!(f, "{}", v),
            Primitive::I64(v) => write!(f, "{}", v),
            Primitive::I128(v) => write!(f, "{}", v),
            Primitive::Isize(v) => write!(f, "{}", v),
            Primitive::U8(v) => write!(f, "{}", v),
            Primitive::U16(v) => write!(f, "{}", v),
            Primitive::U32(v) => write!(f, "{}", v),
            Primitive::U64(v) => write!(f, "{}", v),
            Primitive::U128(v) => write!(f, "{}", v),
            Primitive::Usize(v) => write!(f, "{}", v),
            Primitive::F32(v) => write!(f, "{}", v),
            Primitive::F64(v) => write!(f, "{}", v),
            Primitive::Str(v) => f.write_str(v),
        }
    }
}

// =============================================================================
// NODES
// =============================================================================

/// Handle to a composite value.
///
/// `owner` is the allocation that keeps the composite alive; `target` is the
/// composite itself, either the owner's value or a value stored inline in it
/// (a struct field, a boxed link, a vector). Inline composites are borrowed
/// in place, so descending a deep inline chain copies nothing.
#[derive(Clone)]
pub struct Node {
    owner: Arc<dyn Introspect>,
    target: NonNull<dyn Introspect>,
}

// SAFETY: `target` points into `owner`, which is `Send + Sync` and kept
// alive by every handle that carries the pointer.
unsafe impl Send for Node {}
unsafe impl Sync for Node {}

impl Node {
    /// Wraps an owned composite in a fresh allocation (a new identity).
    pub fn new<T: Introspect>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Shares an existing allocation, keeping its reference identity.
    pub fn shared<T: Introspect>(value: &Arc<T>) -> Self {
        Self::from_arc(Arc::clone(value) as Arc<dyn Introspect>)
    }

    /// Wraps an already type-erased allocation.
    pub fn from_arc(owner: Arc<dyn Introspect>) -> Self {
        let target = NonNull::from(owner.as_ref());
        Self { owner, target }
    }

    /// Turns a reading taken from this node into a value. Inline composites
    /// become nodes sharing this node's owner.
    fn adopt(&self, reading: Reading<'_>) -> Value {
        match reading {
            Reading::Value(value) => value,
            Reading::Inline(inline) => Value::Object(Node {
                owner: Arc::clone(&self.owner),
                target: NonNull::from(inline.target),
            }),
        }
    }

    /// Address of the composite; with [`Node::runtime_type`] this is the
    /// reference identity of the node.
    pub fn address(&self) -> usize {
        self.target.as_ptr() as *const () as usize
    }

    /// True when both handles point at the same composite.
    ///
    /// A struct and its first field can share an address, so the runtime
    /// type takes part in the comparison.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        self.address() == other.address() && self.runtime_type() == other.runtime_type()
    }

    pub fn runtime_type(&self) -> TypeId {
        self.as_any().type_id()
    }

    pub fn type_name(&self) -> &'static str {
        self.introspect().type_name()
    }

    pub fn as_any(&self) -> &dyn Any {
        Introspect::as_any(self.introspect())
    }

    pub fn introspect(&self) -> &dyn Introspect {
        // SAFETY: `target` was borrowed from `owner`'s value through shared
        // references only (never through a lock guard, see `Reading`), and
        // `owner` is alive for as long as `self` is. No `&mut` to the value
        // can exist while this handle holds a strong count.
        unsafe { self.target.as_ref() }
    }

    pub fn is_sequence(&self) -> bool {
        self.introspect().is_sequence()
    }

    /// Reads `member` from this node. `None` when the node is not of the
    /// member's declaring type.
    pub fn read(&self, member: &MemberDescriptor) -> Option<Value> {
        let reading = member.read(self.as_any())?;
        Some(self.adopt(reading))
    }

    /// Elements in iteration order; `None` when the node is not a sequence.
    pub fn elements(&self) -> Option<Vec<Value>> {
        let readings = self.introspect().elements()?;
        Some(readings.into_iter().map(|reading| self.adopt(reading)).collect())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({} @ {:#x})", self.type_name(), self.address())
    }
}

// =============================================================================
// VALUES
// =============================================================================

/// A value observed at one position of a compared graph.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Primitive(Primitive),
    Object(Node),
}

impl Value {
    /// Wraps an owned composite as a new object.
    pub fn object<T: Introspect>(value: T) -> Self {
        Value::Object(Node::new(value))
    }

    /// Wraps a shared composite, keeping its reference identity.
    pub fn shared<T: Introspect>(value: &Arc<T>) -> Self {
        Value::Object(Node::shared(value))
    }

    /// Converts anything with a [`ToValue`] implementation.
    pub fn of<T: ToValue + ?Sized>(value: &T) -> Self {
        value.to_value()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Type name for messages; `null` for Null.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Primitive(p) => p.type_name(),
            Value::Object(node) => node.type_name(),
        }
    }

    /// Untruncated textual rendering used in mismatch reports.
    pub fn render(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Primitive(p) => p.to_string(),
            Value::Object(node) => format!("<{}>", node.type_name()),
        }
    }
}

// =============================================================================
// CONVERSION
// =============================================================================

/// Conversion of a Rust value into its comparable [`Value`] view.
pub trait ToValue {
    /// An owned view. Composites are copied into a fresh node.
    fn to_value(&self) -> Value;

    /// A view borrowed from `self`, used when reading members. Composites
    /// stored inline override this to return [`Reading::Inline`].
    fn reading(&self) -> Reading<'_> {
        Reading::Value(self.to_value())
    }
}

/// One member or element as read from its owner.
pub enum Reading<'a> {
    /// A value that does not borrow from the owner
    Value(Value),
    /// A composite stored inline in the owner, borrowed in place
    Inline(InlineRef<'a>),
}

/// Borrow of an inline composite, seen both as [`Introspect`] (to descend
/// in place) and as [`ToValue`] (to copy it when the borrow cannot outlive
/// a lock guard).
#[derive(Clone, Copy)]
pub struct InlineRef<'a> {
    pub(crate) target: &'a (dyn Introspect + 'static),
    copy: &'a dyn ToValue,
}

impl<'a> Reading<'a> {
    pub fn inline<T: Introspect + ToValue>(value: &'a T) -> Self {
        Reading::Inline(InlineRef {
            target: value,
            copy: value,
        })
    }

    /// Detaches the reading from its owner, copying an inline composite.
    pub fn into_value(self) -> Value {
        match self {
            Reading::Value(value) => value,
            Reading::Inline(inline) => inline.copy.to_value(),
        }
    }
}

impl fmt::Debug for Reading<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Reading::Inline(inline) => write!(f, "Inline({})", inline.target.type_name()),
        }
    }
}

macro_rules! primitive_to_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::Primitive(Primitive::$variant(*self))
                }
            }

            impl From<$ty> for Primitive {
                fn from(value: $ty) -> Self {
                    Primitive::$variant(value)
                }
            }
        )*
    };
}

primitive_to_value! {
    bool => Bool,
    char => Char,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    i128 => I128,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    u128 => U128,
    usize => Usize,
    f32 => F32,
    f64 => F64,
}

impl ToValue for () {
    fn to_value(&self) -> Value {
        Value::Primitive(Primitive::Unit)
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Primitive(Primitive::Str(self.clone()))
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Primitive(Primitive::Str(self.to_string()))
    }
}

impl ToValue for &'static str {
    fn to_value(&self) -> Value {
        Value::Primitive(Primitive::Str((*self).to_string()))
    }
}

impl From<String> for Primitive {
    fn from(value: String) -> Self {
        Primitive::Str(value)
    }
}

impl From<&str> for Primitive {
    fn from(value: &str) -> Self {
        Primitive::Str(value.to_string())
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn reading(&self) -> Reading<'_> {
        match self {
            Some(inner) => inner.reading(),
            None => Reading::Value(Value::Null),
        }
    }
}

impl<T: ToValue + ?Sized> ToValue for Box<T> {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }

    fn reading(&self) -> Reading<'_> {
        (**self).reading()
    }
}

impl<T: Introspect> ToValue for Arc<T> {
    fn to_value(&self) -> Value {
        Value::shared(self)
    }
}

impl<T: Introspect> ToValue for Weak<T> {
    fn to_value(&self) -> Value {
        match self.upgrade() {
            Some(strong) => Value::shared(&strong),
            None => Value::Null,
        }
    }
}

impl<T: ToValue> ToValue for OnceLock<T> {
    fn to_value(&self) -> Value {
        match self.get() {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn reading(&self) -> Reading<'_> {
        match self.get() {
            Some(inner) => inner.reading(),
            None => Reading::Value(Value::Null),
        }
    }
}

// Locked plain values are read under the lock and copied out, since a
// borrow cannot outlive the guard. A poisoned lock still holds the last
// written value, which is what gets compared.

impl<T: ToValue> ToValue for Mutex<T> {
    fn to_value(&self) -> Value {
        match self.lock() {
            Ok(guard) => guard.to_value(),
            Err(poisoned) => poisoned.into_inner().to_value(),
        }
    }
}

impl<T: ToValue> ToValue for RwLock<T> {
    fn to_value(&self) -> Value {
        match self.read() {
            Ok(guard) => guard.to_value(),
            Err(poisoned) => poisoned.into_inner().to_value(),
        }
    }
}

impl<T> ToValue for Vec<T>
where
    T: ToValue + Clone + Send + Sync + 'static,
{
    fn to_value(&self) -> Value {
        Value::object(self.clone())
    }

    fn reading(&self) -> Reading<'_> {
        Reading::inline(self)
    }
}

impl<T> ToValue for VecDeque<T>
where
    T: ToValue + Clone + Send + Sync + 'static,
{
    fn to_value(&self) -> Value {
        Value::object(self.clone())
    }

    fn reading(&self) -> Reading<'_> {
        Reading::inline(self)
    }
}

impl<T, const N: usize> ToValue for [T; N]
where
    T: ToValue + Clone + Send + Sync + 'static,
{
    fn to_value(&self) -> Value {
        Value::object(self.clone())
    }

    fn reading(&self) -> Reading<'_> {
        Reading::inline(self)
    }
}

impl<T> ToValue for BTreeSet<T>
where
    T: ToValue + Clone + Send + Sync + 'static,
{
    fn to_value(&self) -> Value {
        Value::object(self.clone())
    }

    fn reading(&self) -> Reading<'_> {
        Reading::inline(self)
    }
}

impl<K, V> ToValue for BTreeMap<K, V>
where
    K: ToValue + Clone + Send + Sync + 'static,
    V: ToValue + Clone + Send + Sync + 'static,
{
    fn to_value(&self) -> Value {
        Value::object(self.clone())
    }

    fn reading(&self) -> Reading<'_> {
        Reading::inline(self)
    }
}
