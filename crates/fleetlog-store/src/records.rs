use crate::layout::StoreLayout;
use crate::{write_atomic, StoreError};
use fleetlog_schema::{Maintenance, Purpose, TripRequest, User, Vehicle};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;

/// A record kept one-per-file in a store collection.
pub trait Record: Serialize + DeserializeOwned + Clone {
    /// Directory name under `<root>/store/`.
    const COLLECTION: &'static str;
    /// Human label used in not-found errors.
    const KIND: &'static str;

    fn key(&self) -> &str;
}

impl Record for Vehicle {
    const COLLECTION: &'static str = "vehicles";
    const KIND: &'static str = "vehicle";
    fn key(&self) -> &str {
        &self.id
    }
}

impl Record for User {
    const COLLECTION: &'static str = "users";
    const KIND: &'static str = "user";
    fn key(&self) -> &str {
        &self.id
    }
}

impl Record for Purpose {
    const COLLECTION: &'static str = "purposes";
    const KIND: &'static str = "purpose";
    fn key(&self) -> &str {
        &self.id
    }
}

impl Record for Maintenance {
    const COLLECTION: &'static str = "maintenance";
    const KIND: &'static str = "maintenance record";
    fn key(&self) -> &str {
        &self.id
    }
}

impl Record for TripRequest {
    const COLLECTION: &'static str = "trips";
    const KIND: &'static str = "trip";
    fn key(&self) -> &str {
        &self.id
    }
}

/// Record keys double as file names.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key.len() > 64 {
        return Err(StoreError::InvalidKey(format!(
            "'{key}': must be 1-64 characters"
        )));
    }
    if !key
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(StoreError::InvalidKey(format!(
            "'{key}': must match [a-zA-Z0-9_-]"
        )));
    }
    Ok(())
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    checksum: &'a str,
    record: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    /// blake3 over the pretty-printed record. `None` for hand-written files.
    #[serde(default)]
    checksum: Option<String>,
    record: T,
}

pub(crate) fn checksum_of<T: Serialize>(record: &T) -> Result<String, StoreError> {
    let json = serde_json::to_string_pretty(record)?;
    Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
}

/// Serialize `record` with its embedded checksum.
pub(crate) fn encode<T: Serialize>(record: &T) -> Result<String, StoreError> {
    let checksum = checksum_of(record)?;
    Ok(serde_json::to_string_pretty(&EnvelopeRef {
        checksum: &checksum,
        record,
    })?)
}

/// Parse an envelope and verify its checksum when one is present.
pub(crate) fn decode<T: Serialize + DeserializeOwned>(
    key: &str,
    content: &str,
) -> Result<T, StoreError> {
    let envelope: Envelope<T> = serde_json::from_str(content)?;
    if let Some(expected) = envelope.checksum {
        let actual = checksum_of(&envelope.record)?;
        if actual != expected {
            return Err(StoreError::IntegrityFailure {
                key: key.to_owned(),
                expected,
                actual,
            });
        }
    }
    Ok(envelope.record)
}

/// Checksummed JSON files for one collection.
///
/// Writes go through a temp file and an atomic rename. Reads verify the
/// embedded blake3 checksum. This type does no locking: callers that need a
/// read-check-write must hold the [`StoreLock`](crate::StoreLock).
pub struct RecordStore<T> {
    layout: StoreLayout,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> RecordStore<T> {
    pub fn new(layout: StoreLayout) -> Self {
        Self {
            layout,
            _record: PhantomData,
        }
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.layout.record_path(T::COLLECTION, key)
    }

    pub fn put(&self, record: &T) -> Result<(), StoreError> {
        let key = record.key();
        validate_key(key)?;
        let content = encode(record)?;
        write_atomic(&self.path(key), content.as_bytes())
    }

    pub fn get(&self, key: &str) -> Result<T, StoreError> {
        validate_key(key).map_err(|_| StoreError::not_found(T::KIND, key))?;
        let content = self.read_raw(key)?;
        decode(key, &content)
    }

    /// Exact file contents, used for WAL before-images.
    pub fn read_raw(&self, key: &str) -> Result<String, StoreError> {
        let path = self.path(key);
        if !path.exists() {
            return Err(StoreError::not_found(T::KIND, key));
        }
        Ok(fs::read_to_string(&path)?)
    }

    pub fn exists(&self, key: &str) -> bool {
        validate_key(key).is_ok() && self.path(key).exists()
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        let path = self.path(key);
        if !path.exists() {
            return Err(StoreError::not_found(T::KIND, key));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    /// All readable records sorted by key. Corrupt entries are skipped with a
    /// warning; use [`list_with_errors`](Self::list_with_errors) to see them.
    pub fn list(&self) -> Result<Vec<T>, StoreError> {
        let mut results = Vec::new();
        for entry in self.list_with_errors()? {
            match entry {
                Ok(record) => results.push(record),
                Err((key, e)) => {
                    tracing::warn!("skipping corrupted {} entry '{key}': {e}", T::KIND);
                }
            }
        }
        Ok(results)
    }

    /// Like `list()`, but returns per-entry `Result`s so `verify-store` can
    /// surface individual corruption errors.
    #[allow(clippy::type_complexity)]
    pub fn list_with_errors(&self) -> Result<Vec<Result<T, (String, StoreError)>>, StoreError> {
        let dir = self.layout.collection_dir(T::COLLECTION);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let name = entry.file_name();
                let name_str = name.to_str().unwrap_or("").to_owned();
                if !name_str.is_empty() && !name_str.starts_with('.') {
                    names.push(name_str);
                }
            }
        }
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| self.get(&name).map_err(|e| (name, e)))
            .collect())
    }
}
