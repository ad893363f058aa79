use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use shelf_types::SyncDirection;

use crate::error::{StoreError, StoreResult};

/// Default file name of the node log inside the data directory.
pub const DEFAULT_LOG_FILE: &str = "scrapbook.jsonl";
/// Default name of the object root inside the data directory.
pub const DEFAULT_OBJECTS_DIR: &str = "objects";

/// Where a store lives on disk and how it syncs.
///
/// ```toml
/// data_path = "~/.local/share/shelf"
/// log_file = "scrapbook.jsonl"   # optional
/// objects_dir = "objects"        # optional
/// sync_direction = "pull_only"   # optional, default "bidirectional"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub data_path: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default = "default_objects_dir")]
    pub objects_dir: String,
    #[serde(default)]
    pub sync_direction: SyncDirection,
}

fn default_log_file() -> String {
    DEFAULT_LOG_FILE.to_string()
}

fn default_objects_dir() -> String {
    DEFAULT_OBJECTS_DIR.to_string()
}

impl StoreConfig {
    /// Defaults rooted at `data_path`.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: expand_home(data_path.into()),
            log_file: default_log_file(),
            objects_dir: default_objects_dir(),
            sync_direction: SyncDirection::default(),
        }
    }

    /// Parse a TOML configuration.
    pub fn from_toml(text: &str) -> StoreResult<Self> {
        let mut config: Self = toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))?;
        config.data_path = expand_home(config.data_path);
        Ok(config)
    }

    /// Load a TOML configuration file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_path.join(&self.log_file)
    }

    pub fn objects_root(&self) -> PathBuf {
        self.data_path.join(&self.objects_dir)
    }

    pub fn object_dir(&self, uuid: &str) -> PathBuf {
        self.objects_root().join(uuid)
    }
}

/// Expand a leading `~` against `$HOME`. Paths without one are returned
/// unchanged, as is everything when `$HOME` is unset.
fn expand_home(path: PathBuf) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path;
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = StoreConfig::new("/data/shelf");
        assert_eq!(c.log_path(), PathBuf::from("/data/shelf/scrapbook.jsonl"));
        assert_eq!(c.objects_root(), PathBuf::from("/data/shelf/objects"));
        assert_eq!(c.object_dir("ABC"), PathBuf::from("/data/shelf/objects/ABC"));
        assert_eq!(c.sync_direction, SyncDirection::Bidirectional);
    }

    #[test]
    fn toml_with_only_data_path() {
        let c = StoreConfig::from_toml(r#"data_path = "/srv/shelf""#).unwrap();
        assert_eq!(c, StoreConfig::new("/srv/shelf"));
    }

    #[test]
    fn toml_overrides() {
        let c = StoreConfig::from_toml(
            r#"
            data_path = "/srv/shelf"
            log_file = "index.jsonl"
            objects_dir = "blobs"
            sync_direction = "pull_only"
            "#,
        )
        .unwrap();
        assert_eq!(c.log_path(), PathBuf::from("/srv/shelf/index.jsonl"));
        assert_eq!(c.objects_root(), PathBuf::from("/srv/shelf/blobs"));
        assert_eq!(c.sync_direction, SyncDirection::PullOnly);
    }

    #[test]
    fn toml_missing_data_path_rejected() {
        let err = StoreConfig::from_toml("log_file = \"x\"").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shelf.toml");
        std::fs::write(&path, "data_path = \"/tmp/shelf\"\n").unwrap();
        assert_eq!(StoreConfig::load(&path).unwrap().data_path, PathBuf::from("/tmp/shelf"));
    }

    #[test]
    fn tilde_is_expanded() {
        let Some(home) = std::env::var_os("HOME") else {
            return;
        };
        let c = StoreConfig::new("~/shelf");
        assert_eq!(c.data_path, PathBuf::from(home).join("shelf"));
        assert_eq!(StoreConfig::new("/abs/~x").data_path, PathBuf::from("/abs/~x"));
    }
}
