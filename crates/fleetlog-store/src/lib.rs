//! Persistent collections for fleetlog and the contract the trip engine uses
//! to reach them.
//!
//! `EntityStore` is the seam between the engine and storage. `FileStore`
//! implements it over one JSON file per record, with blake3 checksums, atomic
//! rename writes, a store-wide `fs2` lock for conditional updates, and a
//! write-ahead log that makes the trip + vehicle completion write a single
//! transaction. `MemoryStore` implements it in process for tests and embedding.

pub mod entity;
pub mod file;
pub mod ids;
pub mod integrity;
pub mod layout;
pub mod lock;
pub mod memory;
pub mod records;
pub mod wal;

pub use entity::{two_step_completion, CompletionFailure, EntityStore};
pub use file::{FileStore, DEFAULT_LOCK_TIMEOUT};
pub use ids::mint_id;
pub use integrity::{verify_store_integrity, IntegrityFailure, IntegrityReport};
pub use layout::{StoreLayout, STORE_FORMAT_VERSION};
pub use lock::StoreLock;
pub use memory::MemoryStore;
pub use records::{validate_key, Record, RecordStore};
pub use wal::{RollbackStep, WalOpKind, WriteAheadLog};

use fleetlog_schema::TripStatus;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

/// Write `content` to `dest` through a synced temp file in the same directory
/// followed by a rename, so readers never observe a torn file.
pub(crate) fn write_atomic(dest: &Path, content: &[u8]) -> Result<(), StoreError> {
    let dir = dest
        .parent()
        .ok_or_else(|| StoreError::InvalidKey(dest.display().to_string()))?;
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| StoreError::Io(e.error))?;
    fsync_dir(dir)?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("trip {trip_id} is {found}, expected {expected}")]
    StatusConflict {
        trip_id: String,
        expected: TripStatus,
        found: TripStatus,
    },
    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },
    #[error("integrity check failed for '{key}': expected {expected}, got {actual}")]
    IntegrityFailure {
        key: String,
        expected: String,
        actual: String,
    },
    #[error("odometer of {vehicle_id} not changed: {reason}")]
    OdometerRefused { vehicle_id: String, reason: String },
    #[error("invalid record key: {0}")]
    InvalidKey(String),
    #[error("store lock not acquired within {0} ms")]
    LockTimeout(u128),
    #[error("store format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

impl StoreError {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            id: id.into(),
        }
    }
}
