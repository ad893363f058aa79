//! Bundles for archive content stored as a directory tree.
//!
//! A saved page may be a single blob or a whole directory (HTML plus its
//! assets). On the wire both travel as one opaque byte stream; for directory
//! content that stream is a ZIP archive, the same container the clients
//! produce and consume.
//!
//! - **BundleWriter**: packs a directory tree (or individual files) into a ZIP
//! - **BundleReader**: decodes a ZIP and unpacks it into a directory, refusing
//!   any entry whose path would escape the target

pub mod entry;
pub mod error;
pub mod reader;
pub mod writer;

pub use entry::BundleEntry;
pub use error::{PackError, PackResult};
pub use reader::BundleReader;
pub use writer::BundleWriter;
