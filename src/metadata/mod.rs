use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::{AutopublishError, Result};
use crate::hashing::Fingerprint;
use crate::logging::Logger;
use crate::state::{ModuleStatus, STATUS_FORMAT_VERSION, StateStore, StatusRecord};

mod legacy;

pub use legacy::{IMPORTED_VERSION, LEGACY_STATUS_FILE, legacy_status_path};


/// Loads the status record from disk using zero-copy deserialization.
///
/// A missing or empty file yields an empty record, unless a legacy
/// `modules-statuses.properties` file sits next to it, in which case its
/// fingerprints are imported. A record in an incompatible layout is reported
/// and replaced by an empty record, which makes every module republish once.
///
/// # Errors
///
/// Returns an error if:
/// - The file exists but cannot be read due to I/O issues
/// - The record was written by a newer format version
pub fn load_status(status_path: &Path, log: Logger) -> Result<StatusRecord> {
    if !status_path.exists() {
        return Ok(legacy::load_legacy_statuses(status_path, log)?.unwrap_or_default());
    }

    match load_status_inner(status_path) {
        Ok(record) => Ok(record),
        Err(AutopublishError::DeserializationError(err)) => {
            log.warn(format!(
                "Ignoring unreadable status record at {} ({err}); every module will be \
                 republished.",
                status_path.display()
            ));
            Ok(StatusRecord::new())
        }
        Err(other) => Err(other),
    }
}

fn load_status_inner(status_path: &Path) -> Result<StatusRecord> {
    if !status_path.exists() {
        return Ok(StatusRecord::new());
    }

    let file = File::open(status_path).map_err(|source| AutopublishError::IoError {
        path: status_path.to_path_buf(),
        source,
    })?;

    let file_metadata = file.metadata().map_err(|source| AutopublishError::IoError {
        path: status_path.to_path_buf(),
        source,
    })?;

    if file_metadata.len() == 0 {
        return Ok(StatusRecord::new());
    }

    // SAFETY: the record is only written through an atomic rename, so the
    // mapped file is never modified in place while it is mapped.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| AutopublishError::IoError {
        path: status_path.to_path_buf(),
        source,
    })?;

    let record = rkyv::from_bytes::<StatusRecord, rkyv::rancor::BoxedError>(&mmap[..])
        .map_err(AutopublishError::DeserializationError)?;

    if record.version > STATUS_FORMAT_VERSION {
        return Err(AutopublishError::ConfigError(format!(
            "Status record version {} is newer than supported version {}. Please update \
             autopublish.",
            record.version, STATUS_FORMAT_VERSION
        )));
    }

    Ok(record)
}

/// Saves the status record to disk atomically and durably.
///
/// The bytes are written to a temporary file and synced, then renamed over
/// the final location. On unix the parent directory is synced as well so the
/// rename itself survives a crash.
///
/// # Errors
///
/// Returns an error if:
/// - The parent directory cannot be created
/// - The record cannot be serialized
/// - The file cannot be written to disk
pub fn save_status(record: &StatusRecord, status_path: &Path) -> Result<()> {
    let bytes = rkyv::to_bytes::<rkyv::rancor::BoxedError>(record)
        .map_err(|e| AutopublishError::SerializationError(Box::new(e)))?;

    write_atomic(status_path, &bytes)
}

/// Replace `path` with `bytes` through a synced temporary file and a rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent).map_err(|source| AutopublishError::IoError {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let temp_path = temp_path_for(path);

    let mut temp_file = File::create(&temp_path).map_err(|source| AutopublishError::IoError {
        path: temp_path.clone(),
        source,
    })?;

    temp_file
        .write_all(bytes)
        .map_err(|source| AutopublishError::IoError {
            path: temp_path.clone(),
            source,
        })?;

    temp_file.sync_all().map_err(|source| AutopublishError::IoError {
        path: temp_path.clone(),
        source,
    })?;

    fs::rename(&temp_path, path).map_err(|source| AutopublishError::IoError {
        path: path.to_path_buf(),
        source,
    })?;

    #[cfg(unix)]
    {
        if let Some(parent) = parent {
            File::open(parent)
                .and_then(|dir| dir.sync_all())
                .map_err(|source| AutopublishError::IoError {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
    }

    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Removes the status record from disk, together with any legacy status
/// file that would otherwise be imported again.
///
/// This function is idempotent - it succeeds even if the record doesn't
/// exist.
pub fn clean_status(status_path: &Path) -> Result<()> {
    for path in [status_path.to_path_buf(), legacy_status_path(status_path)] {
        if path.exists() {
            fs::remove_file(&path).map_err(|source| AutopublishError::IoError { path, source })?;
        }
    }
    Ok(())
}

/// Whether a status record, current or legacy, exists for `status_path`.
pub fn status_exists(status_path: &Path) -> bool {
    status_path.exists() || legacy_status_path(status_path).exists()
}

/// [`StateStore`] persisted as an rkyv archive on the local file system.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    record: StatusRecord,
    log: Logger,
}

impl FileStateStore {
    /// Open the store at `path`, reading the current record.
    pub fn open(path: impl Into<PathBuf>, log: Logger) -> Result<Self> {
        let path = path.into();
        let record = load_status(&path, log)?;
        Ok(Self { path, record, log })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self) -> &StatusRecord {
        &self.record
    }
}

impl StateStore for FileStateStore {
    fn load_all(&mut self) -> Result<HashMap<String, Fingerprint>> {
        self.record = load_status(&self.path, self.log)?;
        Ok(self.record.fingerprints())
    }

    fn max_version(&self) -> Option<u64> {
        self.record.max_version()
    }

    fn upsert(&mut self, local_path: &str, status: ModuleStatus) -> Result<()> {
        let mut updated = self.record.clone();
        updated.upsert(local_path, status);
        save_status(&updated, &self.path)?;
        // Only reflect the entry in memory once it is on disk.
        self.record = updated;
        Ok(())
    }
}
