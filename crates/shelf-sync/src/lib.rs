//! Synchronization between a store and a client snapshot.
//!
//! The client sends the [`SyncNode`](shelf_types::SyncNode) projection of
//! every node it holds plus the time of the last successful sync. The
//! [`SyncEngine`] diffs that against the node log and answers with a
//! [`SyncPlan`]:
//!
//! - `push`: nodes storage must take from the client
//! - `pull`: nodes the client must take from storage, parents first
//! - `delete` / `delete_in_storage`: one-sided nodes older than the last
//!   sync, inferred to have been deleted on the other side
//!
//! Pulled nodes are then fetched as [`NodePayload`]s.

pub mod engine;
pub mod error;
pub mod payload;
pub mod plan;

pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use payload::NodePayload;
pub use plan::{classify, SyncPlan};
pub use shelf_types::SyncDirection;
