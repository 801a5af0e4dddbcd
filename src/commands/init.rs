//! Init command implementation.

use crate::config::{Settings, write_starter_template};
use crate::error::Result;
use crate::logging::Logger;

/// Executes the init command (write the modules file template).
pub fn init(settings: &Settings, log: Logger) -> Result<()> {
    let path = &settings.modules_config;
    if write_starter_template(path)? {
        log.info(format!("Created a modules template at {}", path.display()));
    } else {
        log.info(format!("{} already exists; leaving it untouched", path.display()));
    }
    Ok(())
}
