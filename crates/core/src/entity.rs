//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Persisted rule records and specifier entities are entities: a record keeps
/// its identity while its specifier, role or polarity are edited.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
