//! Storefront domain: pure types and rules, no I/O.
pub mod aggregates;
pub mod value_objects;
