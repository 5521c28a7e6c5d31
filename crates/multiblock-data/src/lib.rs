//! Data-driven definitions for multiblock structures.
//!
//! Block types, structure kinds, part templates and reconcile settings are
//! read from RON, JSON or TOML files and resolved into a
//! [`multiblock_core::catalog::Catalog`].

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, Definitions, PartTemplate, load_definitions};
