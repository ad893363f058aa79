//! Foundation types for shelf storage.
//!
//! This crate provides the identity, record, and projection types shared by
//! the node log, the object store, and the sync engine. Every other shelf
//! crate depends on `shelf-types`.
//!
//! # Key Types
//!
//! - [`NodeUuid`]: Opaque, immutable node identity (with the reserved default shelf)
//! - [`NodeKind`]: Variant tag of a node (shelf, group, bookmark, archive, separator)
//! - [`Node`]: One item of the hierarchy, typed fields plus pass-through attributes
//! - [`NodePatch`]: Merge-patch applied by node updates
//! - [`SyncNode`]: Minimal projection of a node used for diffing
//! - [`SyncDirection`]: Whether storage accepts incoming changes during sync

pub mod clock;
pub mod error;
pub mod identity;
pub mod node;
pub mod sync;

pub use clock::now_millis;
pub use error::TypeError;
pub use identity::NodeUuid;
pub use node::{Node, NodeKind, NodePatch};
pub use sync::{SyncDirection, SyncNode};
