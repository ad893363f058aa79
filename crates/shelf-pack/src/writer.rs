use std::io::{Cursor, Write};
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::entry::BundleEntry;
use crate::error::{PackError, PackResult};

/// Builds a deflate-compressed ZIP bundle from individual files or a whole
/// directory tree.
#[derive(Debug, Default)]
pub struct BundleWriter {
    entries: Vec<BundleEntry>,
}

impl BundleWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue every regular file under `root`, in a stable (name-sorted) order.
    /// Paths are recorded relative to `root`.
    pub fn from_directory(root: &Path) -> PackResult<Self> {
        let mut writer = Self::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| PackError::UnsafePath(entry.path().display().to_string()))?;
            let mut parts = Vec::new();
            for component in relative.components() {
                let part = component.as_os_str();
                let part = part
                    .to_str()
                    .ok_or_else(|| PackError::InvalidName(part.to_string_lossy().into_owned()))?;
                parts.push(part);
            }
            writer.add_file(parts.join("/"), std::fs::read(entry.path())?);
        }
        debug!(root = %root.display(), files = writer.len(), "directory queued for bundling");
        Ok(writer)
    }

    /// Queue a single file.
    pub fn add_file(&mut self, path: impl Into<String>, data: Vec<u8>) {
        self.entries.push(BundleEntry::new(path, data));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the bundle to `path`.
    pub fn finish(self, path: &Path) -> PackResult<usize> {
        let count = self.entries.len();
        let bytes = self.finish_to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(count)
    }

    /// Build the bundle in memory.
    pub fn finish_to_bytes(self) -> PackResult<Vec<u8>> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for entry in self.entries {
            zip.start_file(entry.path, options)?;
            zip.write_all(&entry.data)?;
        }
        Ok(zip.finish()?.into_inner())
    }
}
