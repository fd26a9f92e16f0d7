//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Carts are entities keyed by their owner; they change contents over time
/// but remain "the same cart".
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
