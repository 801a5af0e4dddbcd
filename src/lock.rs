use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{AutopublishError, Result};

/// RAII guard for the run-level lock file.
///
/// The file is created exclusively, so a second run against the same status
/// record fails fast instead of racing on it. It is removed on drop. A lock
/// left behind by a killed run has to be deleted by hand; the error message
/// names the file.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Take the lock at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AutopublishError::RunLocked`] if the file already exists and
    /// [`AutopublishError::IoError`] if it cannot be created.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| AutopublishError::IoError {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(AutopublishError::RunLocked(path));
            }
            Err(source) => return Err(AutopublishError::IoError { path, source }),
        };

        // The pid is informational only.
        let _ = writeln!(file, "{}", std::process::id());

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_lock_is_exclusive_and_released_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("autopublish/modules-status.metadata.lock");

        let lock = RunLock::acquire(&path).unwrap();
        assert!(path.exists());
        assert_eq!(lock.path(), path);

        let err = RunLock::acquire(&path).unwrap_err();
        assert!(matches!(err, AutopublishError::RunLocked(ref locked) if *locked == path));

        drop(lock);
        assert!(!path.exists());

        // Can be taken again once released
        let _again = RunLock::acquire(&path).unwrap();
    }

    #[test]
    fn test_lock_records_pid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.lock");

        let _lock = RunLock::acquire(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }
}
