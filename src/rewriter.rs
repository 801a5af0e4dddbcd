//! Redirects the consuming project's dependency resolution to freshly
//! published local artifacts.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::config::Coordinate;
use crate::error::{AutopublishError, Result};
use crate::logging::Logger;
use crate::metadata::write_atomic;

/// Reason attached to every substitution.
const SUBSTITUTION_REASON: &str = "Use the latest available local version.";

/// Changes how the consuming project resolves a set of coordinates.
///
/// Implementations only change resolution policy. Calling them repeatedly,
/// or with an empty set, is safe.
pub trait DependencyRewriter {
    /// Make the local artifact cache the first resolution source and
    /// resolve each of `modules` to its newest local version.
    fn use_latest_local_artifacts(&mut self, modules: &BTreeSet<Coordinate>) -> Result<()>;
}

/// [`DependencyRewriter`] that generates a Gradle init script.
///
/// The consuming build picks the script up with `--init-script <path>` or by
/// placing it under `~/.gradle/init.d`.
///
/// The script is regenerated on every run. Modules published by an earlier
/// run are passed through [`GradleInitScript::retain`] so they keep resolving
/// locally while unchanged.
#[derive(Debug)]
pub struct GradleInitScript {
    path: PathBuf,
    retained: BTreeSet<Coordinate>,
    log: Logger,
}

impl GradleInitScript {
    pub fn new(path: impl Into<PathBuf>, log: Logger) -> Self {
        Self {
            path: path.into(),
            retained: BTreeSet::new(),
            log,
        }
    }

    /// Keep substituting `modules` in addition to each run's fresh ones.
    pub fn retain(mut self, modules: impl IntoIterator<Item = Coordinate>) -> Self {
        self.retained.extend(modules);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Script contents for `modules`. Equal input always renders equal text.
    pub fn render(modules: &BTreeSet<Coordinate>) -> String {
        let mut script = String::new();
        script.push_str("// Generated by autopublish. Changes are overwritten on the next run.\n");
        script.push_str("allprojects {\n");
        script.push_str(
            "    val local = repositories.findByName(\"MavenLocal\") ?: repositories.mavenLocal()\n",
        );
        script.push_str("    repositories.remove(local)\n");
        script.push_str("    repositories.addFirst(local)\n");

        if !modules.is_empty() {
            script.push('\n');
            script.push_str("    configurations.all {\n");
            script.push_str("        resolutionStrategy.dependencySubstitution {\n");
            for module in modules {
                // Writing into a String cannot fail.
                let _ = write!(
                    script,
                    "            substitute(module(\"{module}\"))\n\
                     \x20               .using(module(\"{module}:latest.release\"))\n\
                     \x20               .because(\"{SUBSTITUTION_REASON}\")\n"
                );
            }
            script.push_str("        }\n");
            script.push_str("    }\n");
        }

        script.push_str("}\n");
        script
    }
}

impl DependencyRewriter for GradleInitScript {
    fn use_latest_local_artifacts(&mut self, modules: &BTreeSet<Coordinate>) -> Result<()> {
        let substituted: BTreeSet<Coordinate> = self.retained.union(modules).cloned().collect();
        let script = Self::render(&substituted);
        write_atomic(&self.path, script.as_bytes())?;

        self.log.verbose(
            1,
            format!(
                "Wrote {} substitution(s) to {}",
                substituted.len(),
                self.path.display()
            ),
        );
        Ok(())
    }
}

/// A Maven-layout local artifact repository such as `~/.m2/repository`.
#[derive(Clone, Debug)]
pub struct LocalRepository {
    root: PathBuf,
}

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every published version of `coordinate`.
    pub fn artifact_dir(&self, coordinate: &Coordinate) -> PathBuf {
        let mut dir = self.root.clone();
        dir.extend(coordinate.group().split('.'));
        dir.push(coordinate.artifact());
        dir
    }

    /// The newest published version of `coordinate`, if any.
    ///
    /// Versions that are all numeric, such as the millisecond markers used by
    /// autopublish, compare numerically. Anything else compares as text.
    pub fn latest_version(&self, coordinate: &Coordinate) -> Result<Option<String>> {
        let dir = self.artifact_dir(coordinate);
        if !dir.is_dir() {
            return Ok(None);
        }

        let mut latest: Option<String> = None;
        for entry in walkdir::WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|err| AutopublishError::IoError {
                path: dir.clone(),
                source: err.into(),
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let Some(version) = entry.file_name().to_str() else {
                continue;
            };
            let newer = latest
                .as_deref()
                .is_none_or(|current| compare_versions(version, current) == Ordering::Greater);
            if newer {
                latest = Some(version.to_string());
            }
        }

        Ok(latest)
    }
}

fn compare_versions(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}
