use crate::config::{ModuleConfig, PublishCommand};
use crate::error::{AutopublishError, Result};
use crate::logging::Logger;
use crate::process::{CommandRunner, OutputSinks};
use crate::timestamp::VersionClock;

/// Most stderr lines kept in a build failure.
const MAX_STDERR_LINES: usize = 20;

/// Publishes a module into the local artifact cache.
pub trait Publisher {
    /// Build and publish `module`, returning the version marker it was
    /// published under.
    ///
    /// # Errors
    ///
    /// Returns [`AutopublishError::BuildFailure`] when the build signalled
    /// failure, or [`AutopublishError::SpawnError`] when it could not start.
    fn publish(&self, module: &ModuleConfig) -> Result<u64>;
}

/// [`Publisher`] that runs the configured publish command in the module
/// directory.
///
/// The build counts as failed if it writes anything to stderr, exits with a
/// non-zero code or exceeds the runner timeout. It is killed at its first
/// stderr line so a failing build cannot go on to publish an artifact.
pub struct CommandPublisher<'a> {
    runner: &'a dyn CommandRunner,
    command: PublishCommand,
    clock: VersionClock,
    log: Logger,
}

impl<'a> CommandPublisher<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        command: PublishCommand,
        clock: VersionClock,
        log: Logger,
    ) -> Self {
        Self {
            runner,
            command,
            clock,
            log,
        }
    }
}

impl Publisher for CommandPublisher<'_> {
    fn publish(&self, module: &ModuleConfig) -> Result<u64> {
        let version = self.clock.next();
        let argv = self.command.render(version);
        let name = module.name.to_string();
        self.log.verbose(1, format!("[{name}] {}", argv.join(" ")));

        let log = self.log;
        let mut stderr = StderrCapture::default();
        let result = self.runner.run(
            &argv,
            &module.location,
            OutputSinks::none()
                .stdout(|lines| {
                    for line in lines {
                        log.verbose(2, format!("[{name}] {line}"));
                    }
                    Ok(())
                })
                .stderr(|lines| {
                    lines.for_each(|line| stderr.push(line));
                    Ok(())
                })
                .stop_on_stderr(),
        );

        let code = match result {
            Ok(code) => code,
            Err(err @ AutopublishError::CommandTimedOut { .. }) => {
                return Err(AutopublishError::BuildFailure {
                    module: name,
                    message: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        };

        // The build is stopped at its first stderr line, so its exit code
        // says nothing more once stderr was seen.
        if !stderr.is_empty() {
            return Err(AutopublishError::BuildFailure {
                module: name,
                message: stderr.render(),
            });
        }
        if code != 0 {
            return Err(AutopublishError::BuildFailure {
                module: name,
                message: format!("`{}` exited with code {code}", self.command.program()),
            });
        }

        Ok(version)
    }
}

/// First lines of a stderr stream plus a count of the rest.
#[derive(Debug, Default)]
struct StderrCapture {
    lines: Vec<String>,
    omitted: usize,
}

impl StderrCapture {
    fn push(&mut self, line: String) {
        if self.lines.len() < MAX_STDERR_LINES {
            self.lines.push(line);
        } else {
            self.omitted += 1;
        }
    }

    fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn render(&self) -> String {
        let mut rendered = self.lines.join("\n");
        if self.omitted > 0 {
            rendered.push_str(&format!("\n... {} more line(s)", self.omitted));
        }
        rendered
    }
}
