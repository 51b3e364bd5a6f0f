//! Hierarchical name resolution for variable and region names.
pub mod hierarchy;

pub use hierarchy::{depth, inferred_parent, validate_name, Depth, Namespace, SEPARATOR};
