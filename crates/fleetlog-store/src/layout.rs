use crate::{write_atomic, StoreError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current store format version. Incremented on incompatible layout changes.
pub const STORE_FORMAT_VERSION: u32 = 1;
const VERSION_FILE: &str = "version";

/// Collections kept under `<root>/store/`, one file per record.
pub const COLLECTIONS: [&str; 5] = ["vehicles", "users", "purposes", "trips", "maintenance"];

/// Directory layout of a fleetlog store.
///
/// ```text
/// <root>/store/
///   version          format marker
///   .lock            fs2 lock for conditional writes
///   parameter        singleton configuration record
///   wal/             in-flight transactions
///   vehicles/ users/ purposes/ trips/ maintenance/
/// ```
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreVersion {
    format_version: u32,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn store_dir(&self) -> PathBuf {
        self.root.join("store")
    }

    #[inline]
    pub fn collection_dir(&self, collection: &str) -> PathBuf {
        self.store_dir().join(collection)
    }

    #[inline]
    pub fn record_path(&self, collection: &str, key: &str) -> PathBuf {
        self.collection_dir(collection).join(key)
    }

    #[inline]
    pub fn parameter_file(&self) -> PathBuf {
        self.store_dir().join("parameter")
    }

    #[inline]
    pub fn wal_dir(&self) -> PathBuf {
        self.store_dir().join("wal")
    }

    #[inline]
    pub fn lock_file(&self) -> PathBuf {
        self.store_dir().join(".lock")
    }

    #[inline]
    fn version_file(&self) -> PathBuf {
        self.store_dir().join(VERSION_FILE)
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        for collection in COLLECTIONS {
            fs::create_dir_all(self.collection_dir(collection))?;
        }
        fs::create_dir_all(self.wal_dir())?;

        if self.version_file().exists() {
            self.verify_version()?;
        } else {
            let ver = StoreVersion {
                format_version: STORE_FORMAT_VERSION,
            };
            let content = serde_json::to_string_pretty(&ver)?;
            write_atomic(&self.version_file(), content.as_bytes())?;
        }

        Ok(())
    }

    pub fn verify_version(&self) -> Result<(), StoreError> {
        let content = fs::read_to_string(self.version_file())?;
        let ver: StoreVersion = serde_json::from_str(&content)?;

        if ver.format_version != STORE_FORMAT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: STORE_FORMAT_VERSION,
                found: ver.format_version,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_are_correct() {
        let layout = StoreLayout::new("/tmp/fleetlog-test");
        assert_eq!(
            layout.collection_dir("trips"),
            PathBuf::from("/tmp/fleetlog-test/store/trips")
        );
        assert_eq!(
            layout.record_path("vehicles", "veh-1"),
            PathBuf::from("/tmp/fleetlog-test/store/vehicles/veh-1")
        );
        assert_eq!(
            layout.parameter_file(),
            PathBuf::from("/tmp/fleetlog-test/store/parameter")
        );
        assert_eq!(
            layout.wal_dir(),
            PathBuf::from("/tmp/fleetlog-test/store/wal")
        );
        assert_eq!(
            layout.lock_file(),
            PathBuf::from("/tmp/fleetlog-test/store/.lock")
        );
    }

    #[test]
    fn initialize_creates_collections_and_version() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        for collection in COLLECTIONS {
            assert!(layout.collection_dir(collection).is_dir());
        }
        assert!(layout.wal_dir().is_dir());
        layout.verify_version().unwrap();
    }

    #[test]
    fn initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        layout.initialize().unwrap();
    }

    #[test]
    fn version_mismatch_detected() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        fs::write(
            dir.path().join("store").join("version"),
            r#"{"format_version": 99}"#,
        )
        .unwrap();
        assert!(matches!(
            layout.initialize(),
            Err(StoreError::VersionMismatch {
                expected: STORE_FORMAT_VERSION,
                found: 99
            })
        ));
    }
}
