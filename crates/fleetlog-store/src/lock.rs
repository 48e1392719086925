use crate::StoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::{Duration, Instant};

const RETRY_INTERVAL: Duration = Duration::from_millis(5);

/// Exclusive advisory lock on `<store>/.lock`.
///
/// Held for the duration of every conditional write so that the
/// read-check-write of a status transition is serialized across threads and
/// processes sharing the same store directory. Released on drop.
pub struct StoreLock {
    lock_file: File,
}

fn open_lock_file(lock_path: &Path) -> Result<File, StoreError> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?)
}

impl StoreLock {
    /// Poll for the lock until `timeout` elapses.
    pub fn acquire_timeout(lock_path: &Path, timeout: Duration) -> Result<Self, StoreError> {
        let file = open_lock_file(lock_path)?;
        let deadline = Instant::now() + timeout;
        loop {
            if file.try_lock_exclusive().is_ok() {
                return Ok(Self { lock_file: file });
            }
            if Instant::now() >= deadline {
                return Err(StoreError::LockTimeout(timeout.as_millis()));
            }
            std::thread::sleep(RETRY_INTERVAL);
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}
