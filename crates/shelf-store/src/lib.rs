//! Object store for shelf storage.
//!
//! Each node may own an object directory, named by its uuid under the
//! configured object root, holding satellite content: a mirror of the node
//! itself (`item.json`), its icon, archive metadata and content, notes,
//! comments, and their search indices. The [`ObjectStore`] also owns the
//! read-modify-write cycle around the node log, including batch sessions
//! that defer the log rewrite across many writes.
//!
//! # Architecture
//!
//! - **StoreConfig**: data directory layout, loaded from TOML
//! - **ObjectStore**: node persistence, satellite objects, archive content, audit, rebuild
//! - **WriteSerializer**: one background worker running queued [`WriteOp`]s in order
//! - **WriteObserver**: async hook told the [`WriteOutcome`] of every queued op

pub mod config;
pub mod error;
pub mod hooks;
pub mod objects;
pub mod probe;
pub mod serializer;
pub mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use hooks::{TracingObserver, WriteObserver, WriteOutcome, WriteReport};
pub use objects::{ArchiveMeta, ObjectKind};
pub use probe::{ConsistencyReport, MetadataProbe, StoreStatus};
pub use serializer::{WriteOp, WriteSerializer};
pub use store::{ArchiveContent, Mutation, ObjectStore};
