//! Domain layer - Core relay types with no transport dependencies.

/// Bounded price history buffer.
pub mod history;

/// Downstream subscriber handles and registry.
pub mod subscriber;
