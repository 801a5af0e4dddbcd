//! Test doubles shared by the unit tests.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::{Coordinate, ModuleConfig};
use crate::error::{AutopublishError, Result};
use crate::hashing::{Fingerprint, FingerprintHasher};
use crate::process::{CommandRunner, OutputSinks};
use crate::publisher::Publisher;
use crate::rewriter::DependencyRewriter;
use crate::state::{ModuleStatus, StateStore};

#[derive(Clone, Debug, Default)]
pub struct Response {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub code: i32,
}

impl Response {
    pub fn ok(stdout: &[&str]) -> Self {
        Self {
            stdout: stdout.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failed(code: i32, stderr: &[&str]) -> Self {
        Self {
            stderr: stderr.iter().map(|s| s.to_string()).collect(),
            code,
            ..Self::default()
        }
    }
}

/// [`CommandRunner`] answering from a script keyed by directory and argv.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Mutex<HashMap<(PathBuf, Vec<String>), Response>>,
    calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, dir: &Path, command: &[&str], response: Response) {
        let key = (
            dir.to_path_buf(),
            command.iter().map(|s| s.to_string()).collect(),
        );
        self.responses.lock().unwrap().insert(key, response);
    }

    /// Script the git queries of a repository rooted at `dir` whose HEAD is
    /// `head` and whose dry-run listing reports `changes` as
    /// `(path, blob id)`.
    pub fn git_repo(&self, dir: &Path, head: &str, changes: &[(&str, &str)]) {
        let root = dir.display().to_string();
        self.respond(dir, &["git", "rev-parse", "--show-toplevel"], Response::ok(&[root.as_str()]));
        self.respond(dir, &["git", "rev-parse", "HEAD"], Response::ok(&[head]));

        let listing: Vec<String> = changes.iter().map(|(path, _)| format!("add '{path}'")).collect();
        let listing: Vec<&str> = listing.iter().map(String::as_str).collect();
        self.respond(dir, &["git", "add", "--all", "-n"], Response::ok(&listing));

        for (path, blob) in changes {
            self.respond(dir, &["git", "hash-object", "--", *path], Response::ok(&[*blob]));
        }
    }

    pub fn calls(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_in(&self, dir: &Path) -> usize {
        self.calls().iter().filter(|(d, _)| d == dir).count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &[String], working_dir: &Path, sinks: OutputSinks<'_>) -> Result<i32> {
        let key = (working_dir.to_path_buf(), command.to_vec());
        self.calls.lock().unwrap().push(key.clone());

        let response = self
            .responses
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Response::failed(127, &[format!("unscripted command {command:?}").as_str()]));

        let (stdout, stderr) = sinks.into_parts();
        if let Some(sink) = stdout {
            sink(&mut response.stdout.clone().into_iter())?;
        }
        if let Some(sink) = stderr {
            sink(&mut response.stderr.clone().into_iter())?;
        }
        Ok(response.code)
    }
}

/// The fingerprint the detector must produce for a scripted repository.
pub fn expected_fingerprint(head: &str, blobs: &[&str]) -> Fingerprint {
    let mut hasher = FingerprintHasher::new();
    hasher.update(head);
    for blob in blobs {
        hasher.update(blob);
    }
    hasher.finalize()
}

pub fn module(name: &str, location: &str) -> ModuleConfig {
    ModuleConfig {
        name: name.parse::<Coordinate>().unwrap(),
        local_path: location.to_string(),
        location: PathBuf::from(location),
    }
}

/// [`Publisher`] that records calls and fails for selected modules.
#[derive(Default)]
pub struct RecordingPublisher {
    failing: Vec<String>,
    published: Mutex<Vec<String>>,
    next_version: Mutex<u64>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(names: &[&str]) -> Self {
        Self {
            failing: names.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, module: &ModuleConfig) -> Result<u64> {
        let name = module.name.to_string();
        if self.failing.contains(&name) {
            return Err(AutopublishError::BuildFailure {
                module: name,
                message: "compilation failed".to_string(),
            });
        }
        self.published.lock().unwrap().push(name);
        let mut version = self.next_version.lock().unwrap();
        *version += 1;
        Ok(*version)
    }
}

/// In-memory [`StateStore`] that can be told to fail writes.
#[derive(Default)]
pub struct MemoryStore {
    pub entries: HashMap<String, ModuleStatus>,
    pub fail_writes: bool,
    pub loads: usize,
}

impl MemoryStore {
    pub fn with_fingerprint(mut self, local_path: &str, fingerprint: &Fingerprint) -> Self {
        self.entries.insert(
            local_path.to_string(),
            ModuleStatus {
                fingerprint: fingerprint.as_str().to_string(),
                version: 1,
            },
        );
        self
    }
}

impl StateStore for MemoryStore {
    fn load_all(&mut self) -> Result<HashMap<String, Fingerprint>> {
        self.loads += 1;
        Ok(self
            .entries
            .iter()
            .map(|(path, status)| (path.clone(), Fingerprint::from_stored(&status.fingerprint)))
            .collect())
    }

    fn max_version(&self) -> Option<u64> {
        self.entries.values().map(|status| status.version).max()
    }

    fn upsert(&mut self, local_path: &str, status: ModuleStatus) -> Result<()> {
        if self.fail_writes {
            return Err(AutopublishError::IoError {
                path: PathBuf::from(local_path),
                source: std::io::Error::other("disk full"),
            });
        }
        self.entries.insert(local_path.to_string(), status);
        Ok(())
    }
}

/// [`DependencyRewriter`] remembering every invocation.
#[derive(Default)]
pub struct RecordingRewriter {
    pub invocations: Vec<BTreeSet<String>>,
}

impl DependencyRewriter for RecordingRewriter {
    fn use_latest_local_artifacts(&mut self, modules: &BTreeSet<Coordinate>) -> Result<()> {
        self.invocations
            .push(modules.iter().map(ToString::to_string).collect());
        Ok(())
    }
}
