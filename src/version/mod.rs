//! Semantic version handling.
//!
//! The update core only needs two questions answered about versions: how two
//! of them order, and whether the running one is behind the latest release.
//! Both live in [`comparison`].

pub mod comparison;

pub use comparison::{VersionComparator, parse_version, precedence};
