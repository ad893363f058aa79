use std::path::{Component, Path, PathBuf};

use crate::error::{PackError, PackResult};

/// One file of a bundled directory tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BundleEntry {
    /// Path relative to the bundle root, `/`-separated.
    pub path: String,
    pub data: Vec<u8>,
}

impl BundleEntry {
    pub fn new(path: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    /// Resolve this entry's path under `root`, rejecting anything that
    /// would land outside it.
    pub fn target_under(&self, root: &Path) -> PackResult<PathBuf> {
        if self.path.contains(['\\', '\0']) {
            return Err(PackError::UnsafePath(self.path.clone()));
        }
        let mut target = root.to_path_buf();
        let mut depth = 0;
        for component in Path::new(&self.path).components() {
            match component {
                Component::Normal(part) => {
                    target.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(PackError::UnsafePath(self.path.clone()));
                }
            }
        }
        if depth == 0 {
            return Err(PackError::UnsafePath(self.path.clone()));
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_stays_under_root() {
        let root = Path::new("/data/obj/A/archive");
        let entry = BundleEntry::new("css/site.css", vec![]);
        assert_eq!(entry.target_under(root).unwrap(), root.join("css").join("site.css"));

        let entry = BundleEntry::new("./index.html", vec![]);
        assert_eq!(entry.target_under(root).unwrap(), root.join("index.html"));
    }

    #[test]
    fn escaping_paths_rejected() {
        let root = Path::new("/data/obj/A/archive");
        for bad in ["../item.json", "/etc/passwd", "a/../../b", "", ".", "..\\up.txt"] {
            let entry = BundleEntry::new(bad, vec![]);
            assert!(
                matches!(entry.target_under(root), Err(PackError::UnsafePath(_))),
                "{bad} accepted"
            );
        }
    }
}
