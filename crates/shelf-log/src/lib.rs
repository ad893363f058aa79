//! Node log for shelf storage.
//!
//! The node log is the authoritative index of the node graph: a text file
//! whose first line is a [`LogHeader`] and whose every following line is one
//! self-contained JSON node record. The log is never patched in place; every
//! [`NodeLog::write`] rewrites the whole file through a temporary file and an
//! atomic rename.
//!
//! # Design Rules
//!
//! 1. A malformed record line is skipped with a warning, never fatal.
//! 2. A missing or empty log reads as a fresh store holding only the default shelf.
//! 3. Parents are always written before their children ([`tree_sort`]).
//! 4. The log holds no locks; callers serialize read-modify-write cycles.

pub mod error;
pub mod header;
pub mod log;
pub mod tree;

pub use error::{LogError, LogResult};
pub use header::LogHeader;
pub use log::NodeLog;
pub use tree::{dangling_parents, tree_sort, DanglingParent, Hierarchical};
