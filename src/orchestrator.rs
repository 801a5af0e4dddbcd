//! The incremental publish pipeline.
//!
//! Every module moves through
//! `Configured → StatusChecked → {Unchanged | Publishing → {Published | Failed}}`
//! without ever going back. A failure stays with its module. Once all modules
//! are done the dependency rewriter runs exactly once with the modules that
//! were published and recorded.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::config::{Coordinate, ModuleConfig};
use crate::detector::ChangeDetector;
use crate::error::{AutopublishError, Result};
use crate::hashing::Fingerprint;
use crate::logging::Logger;
use crate::process::CommandRunner;
use crate::publisher::Publisher;
use crate::rewriter::{DependencyRewriter, LocalRepository};
use crate::state::{ModuleState, ModuleStatus, StateStore};

#[cfg(test)]
mod tests;

/// Terminal state of one module in a run.
#[derive(Debug)]
pub enum PublishOutcome {
    /// The working tree matches the last published fingerprint.
    Skipped,
    /// Published and recorded.
    Published { fingerprint: Fingerprint, version: u64 },
    /// Detection, the build or recording the new state failed.
    Failed(AutopublishError),
}

#[derive(Debug)]
pub struct ModuleReport {
    pub module: ModuleConfig,
    pub outcome: PublishOutcome,
    pub elapsed: Duration,
}

/// What happened to every configured module, in configuration order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub modules: Vec<ModuleReport>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn published(&self) -> impl Iterator<Item = &ModuleReport> {
        self.modules
            .iter()
            .filter(|report| matches!(report.outcome, PublishOutcome::Published { .. }))
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ModuleReport> {
        self.modules
            .iter()
            .filter(|report| matches!(report.outcome, PublishOutcome::Skipped))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&ModuleReport, &AutopublishError)> {
        self.modules.iter().filter_map(|report| match &report.outcome {
            PublishOutcome::Failed(err) => Some((report, err)),
            _ => None,
        })
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    /// Coordinates that reached the published state.
    pub fn published_coordinates(&self) -> BTreeSet<Coordinate> {
        self.published().map(|report| report.module.name.clone()).collect()
    }
}

pub struct Orchestrator<'a> {
    runner: &'a dyn CommandRunner,
    publisher: &'a dyn Publisher,
    local_repository: Option<&'a LocalRepository>,
    log: Logger,
}

pub struct OrchestratorBuilder<'a> {
    runner: Option<&'a dyn CommandRunner>,
    publisher: Option<&'a dyn Publisher>,
    local_repository: Option<&'a LocalRepository>,
    log: Logger,
}

impl Default for OrchestratorBuilder<'_> {
    fn default() -> Self {
        Self {
            runner: None,
            publisher: None,
            local_repository: None,
            log: Logger::new(0, false),
        }
    }
}

impl<'a> OrchestratorBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner used for the git queries.
    pub fn runner(mut self, runner: &'a dyn CommandRunner) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn publisher(mut self, publisher: &'a dyn Publisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Repository used to report the version each published module now
    /// resolves to.
    pub fn local_repository(mut self, repository: Option<&'a LocalRepository>) -> Self {
        self.local_repository = repository;
        self
    }

    pub fn log(mut self, log: Logger) -> Self {
        self.log = log;
        self
    }

    pub fn build(self) -> Result<Orchestrator<'a>> {
        Ok(Orchestrator {
            runner: self
                .runner
                .ok_or_else(|| AutopublishError::ConfigError("runner is required".to_string()))?,
            publisher: self
                .publisher
                .ok_or_else(|| AutopublishError::ConfigError("publisher is required".to_string()))?,
            local_repository: self.local_repository,
            log: self.log,
        })
    }
}

impl<'a> Orchestrator<'a> {
    pub fn builder() -> OrchestratorBuilder<'a> {
        OrchestratorBuilder::new()
    }

    /// Evaluate every module, publish the changed ones and point the
    /// consuming project at what was published.
    ///
    /// With no modules nothing runs: no command, no state access and no
    /// rewriter call.
    ///
    /// # Errors
    ///
    /// Module failures are recorded in the report, never returned. An error
    /// is only returned when the recorded state cannot be loaded or the
    /// rewriter fails.
    pub fn run(
        &self,
        modules: &[ModuleConfig],
        store: &mut dyn StateStore,
        rewriter: &mut dyn DependencyRewriter,
    ) -> Result<RunReport> {
        if modules.is_empty() {
            self.log.verbose(1, "No modules to evaluate.");
            return Ok(RunReport::default());
        }

        let started = Instant::now();
        let recorded = store.load_all()?;
        let detector = ChangeDetector::new(self.runner);

        let mut report = RunReport::default();
        for module in modules {
            let module_started = Instant::now();
            let state = ModuleState {
                module,
                last_fingerprint: recorded.get(&module.local_path).cloned(),
            };
            let outcome = self.evaluate(&detector, &state, store);
            let elapsed = module_started.elapsed();

            if let PublishOutcome::Failed(err) = &outcome {
                self.log.warn(format!("Project [{}] was not autopublished: {err}", module.name));
            }
            self.log.info(format!(
                "Project [{}] took {} seconds to be evaluated.",
                module.name,
                elapsed.as_secs()
            ));

            report.modules.push(ModuleReport {
                module: module.clone(),
                outcome,
                elapsed,
            });
        }

        rewriter.use_latest_local_artifacts(&report.published_coordinates())?;
        self.log_applied(&report);

        report.elapsed = started.elapsed();
        self.log
            .info(format!("Total execution time: {} seconds.", report.elapsed.as_secs()));

        Ok(report)
    }

    fn evaluate(
        &self,
        detector: &ChangeDetector<'_>,
        state: &ModuleState<'_>,
        store: &mut dyn StateStore,
    ) -> PublishOutcome {
        let module = state.module;
        let location = module.location.display();

        let fingerprint = match detector.get_updated_status(state) {
            Ok(Some(fingerprint)) => fingerprint,
            Ok(None) => {
                self.log
                    .info(format!("Project at: {location} has no recent changes."));
                return PublishOutcome::Skipped;
            }
            Err(err) => return PublishOutcome::Failed(err),
        };

        self.log
            .info(format!("Project at: {location} has changes. Publishing now."));
        self.log.verbose(2, format!("[{}] fingerprint {}", module.name, fingerprint.short()));

        let version = match self.publisher.publish(module) {
            Ok(version) => version,
            Err(err) => return PublishOutcome::Failed(err),
        };

        let status = ModuleStatus {
            fingerprint: fingerprint.as_str().to_string(),
            version,
        };
        if let Err(source) = store.upsert(&module.local_path, status) {
            return PublishOutcome::Failed(AutopublishError::PersistFailure {
                module: module.name.to_string(),
                source: Box::new(source),
            });
        }

        self.log.info(format!(
            "Current project is set to use a new local build of [{}]",
            module.name
        ));
        PublishOutcome::Published {
            fingerprint,
            version,
        }
    }

    fn log_applied(&self, report: &RunReport) {
        let lines: Vec<String> = report
            .published()
            .map(|published| {
                let module = &published.module;
                let mut line = format!("[{}] from {}", module.name, module.location.display());
                if let Some(version) = self.resolved_version(&module.name) {
                    line.push_str(&format!(" (version {version})"));
                }
                line
            })
            .collect();

        if lines.is_empty() {
            self.log.info("No new local builds to apply.");
        } else {
            self.log.info(format!(
                "Project will use the following dependencies from locally autopublished builds:\n\t{}",
                lines.join("\n\t")
            ));
        }
    }

    fn resolved_version(&self, coordinate: &Coordinate) -> Option<String> {
        let repository = self.local_repository?;
        match repository.latest_version(coordinate) {
            Ok(version) => version,
            Err(err) => {
                self.log.verbose(1, format!("Could not inspect local repository: {err}"));
                None
            }
        }
    }
}
