//! Status command implementation.

use crate::config::{ModulesConfig, Settings};
use crate::detector::ChangeDetector;
use crate::error::Result;
use crate::logging::Logger;
use crate::metadata::{IMPORTED_VERSION, load_status};
use crate::process::ProcessRunner;
use crate::state::ModuleState;

/// Executes the status command.
///
/// Reports for each module whether it changed since its last publish.
/// Nothing is published and nothing is recorded, so no run lock is taken.
pub fn status(settings: &Settings, log: Logger) -> Result<()> {
    let modules = match ModulesConfig::load(&settings.modules_config, &settings.project_dir)? {
        ModulesConfig::Missing => {
            log.info("Autopublish disabled. Missing modules.properties file.");
            return Ok(());
        }
        ModulesConfig::Empty => {
            log.info("Autopublish disabled. No modules set for autopublishing.");
            return Ok(());
        }
        ModulesConfig::Modules(modules) => modules,
    };

    let record = load_status(&settings.status_path, log)?;
    let fingerprints = record.fingerprints();
    let runner = ProcessRunner::new().with_timeout(settings.command_timeout);
    let detector = ChangeDetector::new(&runner);

    for module in &modules {
        let state = ModuleState {
            module,
            last_fingerprint: fingerprints.get(&module.local_path).cloned(),
        };
        match detector.get_updated_status(&state) {
            Ok(None) => {
                // Entries imported from the legacy file carry no version.
                match record
                    .get(&module.local_path)
                    .map(|status| status.version)
                    .filter(|&version| version != IMPORTED_VERSION)
                {
                    Some(version) => {
                        log.info(format!("[{}] unchanged (version {version})", module.name))
                    }
                    None => log.info(format!("[{}] unchanged", module.name)),
                }
            }
            Ok(Some(fingerprint)) if state.last_fingerprint.is_none() => {
                log.info(format!("[{}] never published", module.name));
                log.verbose(1, format!("[{}] fingerprint {}", module.name, fingerprint.short()));
            }
            Ok(Some(fingerprint)) => {
                log.info(format!("[{}] changed", module.name));
                log.verbose(1, format!("[{}] fingerprint {}", module.name, fingerprint.short()));
            }
            Err(err) => log.warn(format!("[{}] {err}", module.name)),
        }
    }

    Ok(())
}
