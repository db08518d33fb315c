//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects carry no identity: two with the same attributes are equal.
/// Quantities, money amounts and per-line validation outcomes are value
/// objects; catalog items and jobs are not (they are keyed by their ids).
///
/// To "modify" a value object, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
