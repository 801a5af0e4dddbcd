//! Reset command implementation.

use crate::config::Settings;
use crate::error::Result;
use crate::lock::RunLock;
use crate::logging::Logger;
use crate::metadata::{clean_status, status_exists};

/// Executes the reset command (remove the status record).
pub fn reset(settings: &Settings, log: Logger) -> Result<()> {
    if !status_exists(&settings.status_path) {
        log.info("No status record to remove.");
        return Ok(());
    }

    let _lock = RunLock::acquire(settings.lock_path())?;
    log.verbose(1, format!("Removing status record at {}", settings.status_path.display()));

    clean_status(&settings.status_path)?;

    log.info("Status record removed. Every module is republished on the next run.");
    Ok(())
}
