//! Publish command implementation.

use crate::config::{Coordinate, ModulesConfig, Settings, write_starter_template};
use crate::error::{AutopublishError, Result};
use crate::lock::RunLock;
use crate::logging::Logger;
use crate::metadata::FileStateStore;
use crate::orchestrator::Orchestrator;
use crate::process::ProcessRunner;
use crate::publisher::CommandPublisher;
use crate::rewriter::{GradleInitScript, LocalRepository};
use crate::state::StateStore;
use crate::timestamp::VersionClock;

/// Executes the publish command.
///
/// A missing or empty modules file disables the run without error. Module
/// failures are reported once every module was evaluated and the init script
/// was regenerated.
pub fn publish(settings: &Settings, generate_template: bool, log: Logger) -> Result<()> {
    let modules = match ModulesConfig::load(&settings.modules_config, &settings.project_dir)? {
        ModulesConfig::Missing => {
            log.info(format!(
                "Autopublish disabled. Missing modules.properties file.\nCreate {} or run \
                 'autopublish init' to list the modules to autopublish.",
                settings.modules_config.display()
            ));
            if generate_template && write_starter_template(&settings.modules_config)? {
                log.info(format!(
                    "Created a modules template at {}",
                    settings.modules_config.display()
                ));
            }
            return Ok(());
        }
        ModulesConfig::Empty => {
            log.info("Autopublish disabled. No modules set for autopublishing.");
            return Ok(());
        }
        ModulesConfig::Modules(modules) => modules,
    };
    log.verbose(1, "Auto publication of local modules is enabled.");

    let _lock = RunLock::acquire(settings.lock_path())?;
    let mut store = FileStateStore::open(&settings.status_path, log)?;

    let runner = ProcessRunner::new().with_timeout(settings.command_timeout);
    let publisher = CommandPublisher::new(
        &runner,
        settings.publish_command.clone(),
        VersionClock::new(store.max_version()),
        log,
    );

    // Modules published by earlier runs keep resolving locally.
    let retained: Vec<Coordinate> = modules
        .iter()
        .filter(|module| store.record().get(&module.local_path).is_some())
        .map(|module| module.name.clone())
        .collect();
    let mut rewriter = GradleInitScript::new(&settings.init_script, log).retain(retained);
    let repository = LocalRepository::new(&settings.local_repository);

    let report = Orchestrator::builder()
        .runner(&runner)
        .publisher(&publisher)
        .local_repository(Some(&repository))
        .log(log)
        .build()?
        .run(&modules, &mut store, &mut rewriter)?;

    log.verbose(
        1,
        format!(
            "{} published, {} unchanged, {} failed",
            report.published().count(),
            report.skipped().count(),
            report.failed().count()
        ),
    );

    let failed: Vec<String> = report
        .failed()
        .map(|(module, _)| module.module.name.to_string())
        .collect();
    if !failed.is_empty() {
        return Err(AutopublishError::ModulesFailed {
            count: failed.len(),
            modules: failed.join(", "),
        });
    }

    Ok(())
}
