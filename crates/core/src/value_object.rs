//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. A
/// [`Specifier`](crate::Specifier) is one: two specifiers spelling the same
/// path are the same scope, whichever persisted entity happens to carry them.
///
/// To "modify" a value object, build a new one (e.g. `Specifier::child`).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
