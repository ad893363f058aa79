use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use tracing::debug;
use zip::ZipArchive;

use crate::entry::BundleEntry;
use crate::error::PackResult;

/// A fully decoded ZIP bundle.
///
/// Directory entries are dropped; only files are kept, in archive order.
/// Entry paths are not trusted until [`unpack_into`](Self::unpack_into)
/// checks them.
#[derive(Debug)]
pub struct BundleReader {
    entries: Vec<BundleEntry>,
}

impl BundleReader {
    /// Decode a ZIP archive held in memory. Every entry is decompressed and
    /// CRC-checked here.
    pub fn from_bytes(data: &[u8]) -> PackResult<Self> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let path = file.name().to_string();
            let mut data = Vec::with_capacity(file.size().min(1 << 20) as usize);
            file.read_to_end(&mut data)?;
            entries.push(BundleEntry::new(path, data));
        }
        Ok(Self { entries })
    }

    /// Read and decode a bundle file.
    pub fn open(path: &Path) -> PackResult<Self> {
        Self::from_bytes(&fs::read(path)?)
    }

    pub fn entries(&self) -> &[BundleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Materialize every entry as a file under `root`, creating directories
    /// as needed. All paths are checked before anything is written.
    pub fn unpack_into(&self, root: &Path) -> PackResult<usize> {
        let targets = self
            .entries
            .iter()
            .map(|e| e.target_under(root))
            .collect::<PackResult<Vec<_>>>()?;

        fs::create_dir_all(root)?;
        for (entry, target) in self.entries.iter().zip(&targets) {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(target, &entry.data)?;
        }
        debug!(root = %root.display(), files = targets.len(), "bundle unpacked");
        Ok(targets.len())
    }
}

