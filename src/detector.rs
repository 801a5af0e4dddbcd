//! Working-tree change detection.
//!
//! A module's fingerprint covers its committed state and every pending
//! change git would stage:
//!
//! 1. the first line of `git rev-parse HEAD`
//! 2. for each `add '<path>'` line of `git add --all -n`, the first line of
//!    `git hash-object <path>`
//! 3. each `remove '<path>'` line of the same listing, verbatim
//!
//! Everything is fed in that order into one SHA-256 digest. Paths reported by
//! the dry run are relative to the repository root, so blob ids are computed
//! from the top level of the working tree.

use std::path::{Path, PathBuf};

use crate::config::ModuleConfig;
use crate::error::{AutopublishError, Result};
use crate::hashing::{Fingerprint, FingerprintHasher};
use crate::process::{CommandRunner, OutputSinks};
use crate::state::ModuleState;


/// Most stderr lines quoted in a VCS failure message.
const MAX_QUOTED_STDERR: usize = 10;

/// One line of the `git add --all -n` listing.
#[derive(Debug, PartialEq, Eq)]
enum PendingChange<'a> {
    Added(&'a str),
    Removed,
}

impl<'a> PendingChange<'a> {
    fn parse(line: &'a str) -> Option<Self> {
        if let Some(path) = line.strip_prefix("add '").and_then(|rest| rest.strip_suffix('\'')) {
            return Some(Self::Added(path));
        }
        if line.starts_with("remove '") {
            return Some(Self::Removed);
        }
        None
    }
}

/// Computes module fingerprints through git and compares them with the last
/// recorded ones.
pub struct ChangeDetector<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Fingerprint the current working tree of `module`.
    ///
    /// # Errors
    ///
    /// Returns [`AutopublishError::VcsQueryFailed`] if any git query cannot be
    /// started, exits non-zero or produces no output where one is required.
    pub fn fingerprint(&self, module: &ModuleConfig) -> Result<Fingerprint> {
        let dir = module.location.as_path();
        let top_level = self.first_line(module, dir, &["rev-parse", "--show-toplevel"])?;
        let top_level = PathBuf::from(top_level);

        let mut hasher = FingerprintHasher::new();
        hasher.update(&self.first_line(module, dir, &["rev-parse", "HEAD"])?);

        let listing = git(&["add", "--all", "-n"]);
        let mut errors = Vec::new();
        let code = self
            .runner
            .run(
                &listing,
                dir,
                OutputSinks::none()
                    .stdout(|lines| {
                        for line in lines {
                            match PendingChange::parse(&line) {
                                Some(PendingChange::Added(path)) => {
                                    let args = ["hash-object", "--", path];
                                    let blob = self.first_line(module, &top_level, &args)?;
                                    hasher.update(&blob);
                                }
                                Some(PendingChange::Removed) => hasher.update(&line),
                                None => {}
                            }
                        }
                        Ok(())
                    })
                    .stderr(|lines| capture(lines, &mut errors)),
            )
            .map_err(|err| into_vcs_failure(err, module))?;

        if code != 0 {
            return Err(exit_failure(module, &listing, code, &errors));
        }

        Ok(hasher.finalize())
    }

    /// The new fingerprint when the module changed since it was last
    /// published, `None` when it is unchanged.
    ///
    /// A module without a recorded fingerprint always counts as changed.
    pub fn get_updated_status(&self, state: &ModuleState<'_>) -> Result<Option<Fingerprint>> {
        let current = self.fingerprint(state.module)?;
        if state.last_fingerprint.as_ref() == Some(&current) {
            Ok(None)
        } else {
            Ok(Some(current))
        }
    }

    /// Run `git <args>` in `dir` and return the first line it prints.
    fn first_line(&self, module: &ModuleConfig, dir: &Path, args: &[&str]) -> Result<String> {
        let command = git(args);
        let mut first = None;
        let mut errors = Vec::new();

        let code = self
            .runner
            .run(
                &command,
                dir,
                OutputSinks::none()
                    .stdout(|lines| {
                        first = lines.next();
                        Ok(())
                    })
                    .stderr(|lines| capture(lines, &mut errors)),
            )
            .map_err(|err| into_vcs_failure(err, module))?;

        if code != 0 {
            return Err(exit_failure(module, &command, code, &errors));
        }

        first.ok_or_else(|| vcs_failure(module, format!("`{}` printed nothing", command.join(" "))))
    }
}

fn git(args: &[&str]) -> Vec<String> {
    std::iter::once("git")
        .chain(args.iter().copied())
        .map(String::from)
        .collect()
}

fn capture(lines: &mut dyn Iterator<Item = String>, into: &mut Vec<String>) -> Result<()> {
    for line in lines {
        if into.len() < MAX_QUOTED_STDERR {
            into.push(line);
        }
    }
    Ok(())
}

fn vcs_failure(module: &ModuleConfig, message: String) -> AutopublishError {
    AutopublishError::VcsQueryFailed {
        module: module.name.to_string(),
        path: module.location.clone(),
        message,
    }
}

fn exit_failure(
    module: &ModuleConfig,
    command: &[String],
    code: i32,
    errors: &[String],
) -> AutopublishError {
    let mut message = format!("`{}` exited with code {code}", command.join(" "));
    if !errors.is_empty() {
        message.push_str(": ");
        message.push_str(&errors.join("\n"));
    }
    vcs_failure(module, message)
}

/// Nested queries already report module failures; anything else (spawn
/// errors, timeouts) is wrapped.
fn into_vcs_failure(err: AutopublishError, module: &ModuleConfig) -> AutopublishError {
    match err {
        err @ AutopublishError::VcsQueryFailed { .. } => err,
        other => vcs_failure(module, other.to_string()),
    }
}
