use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{LazyLock, Mutex, MutexGuard};
use std::env;

use git2::{IndexAddOption, Repository, Signature};
use tempfile::TempDir;

/// Global mutex to ensure only one test manipulates HOME at a time.
static HOME_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// RAII guard that redirects HOME to a temporary directory.
///
/// While the guard is alive the default local repository
/// (`~/.m2/repository`) resolves inside the sandbox, so tests never touch the
/// developer's real artifact cache.
pub struct TempHomeGuard {
    _lock: MutexGuard<'static, ()>,
    temp_home: TempDir,
    prev_home: Option<OsString>,
    #[cfg(windows)]
    prev_userprofile: Option<OsString>,
}

impl TempHomeGuard {
    /// Create a new guard with a fresh temporary home directory.
    pub fn new() -> Self {
        let lock = HOME_MUTEX
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let temp_home = TempDir::new().expect("failed to create temporary HOME");
        let home_path = temp_home.path();

        let prev_home = env::var_os("HOME");
        #[cfg(windows)]
        let prev_userprofile = env::var_os("USERPROFILE");

        // SAFETY: we hold HOME_MUTEX, ensuring no other test thread mutates
        // the environment while HOME is redirected.
        unsafe {
            env::set_var("HOME", home_path);
            #[cfg(windows)]
            env::set_var("USERPROFILE", home_path);
        }

        Self {
            _lock: lock,
            temp_home,
            prev_home,
            #[cfg(windows)]
            prev_userprofile,
        }
    }

    /// Path to the temporary HOME directory.
    pub fn home(&self) -> &Path {
        self.temp_home.path()
    }

    /// The local Maven repository under the temporary HOME.
    pub fn local_repository(&self) -> PathBuf {
        self.home().join(".m2").join("repository")
    }
}

impl Drop for TempHomeGuard {
    fn drop(&mut self) {
        // SAFETY: guarded by HOME_MUTEX; we restore the environment to its
        // previous state before releasing the lock.
        unsafe {
            if let Some(prev) = self.prev_home.as_ref() {
                env::set_var("HOME", prev);
            } else {
                env::remove_var("HOME");
            }
            #[cfg(windows)]
            {
                if let Some(prev) = self.prev_userprofile.as_ref() {
                    env::set_var("USERPROFILE", prev);
                } else {
                    env::remove_var("USERPROFILE");
                }
            }
        }
    }
}

/// Whether the `git` and `sh` binaries the end-to-end tests drive exist.
pub fn tools_available() -> bool {
    let works = |program: &str, args: &[&str]| {
        Command::new(program)
            .args(args)
            .output()
            .is_ok_and(|output| output.status.success())
    };
    works("git", &["--version"]) && works("sh", &["-c", "true"])
}

/// Stage everything in the working tree and commit it.
pub fn commit_all(repo: &Repository, message: &str) {
    let mut index = repo.index().unwrap();
    index.add_all(["*"], IndexAddOption::DEFAULT, None).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let signature = Signature::now("Test", "test@example.com").unwrap();
    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<_> = parent.iter().collect();
    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .unwrap();
}

/// Publish script that records `$1` as a version directory of
/// `group:artifact` inside `repository`, laid out the way Maven does.
pub fn publish_script(repository: &Path, group: &str, artifact: &str) -> String {
    let mut dir = repository.to_path_buf();
    dir.extend(group.split('.'));
    dir.push(artifact);
    format!("mkdir -p '{}/'\"$1\"\n", dir.display())
}

/// Create a committed git module at `path` with a `publish.sh` script.
pub fn create_module(path: &Path, script: &str) -> Repository {
    fs::create_dir_all(path.join("src")).unwrap();
    let repo = Repository::init(path).unwrap();
    fs::write(path.join("build.gradle.kts"), "plugins { `maven-publish` }\n").unwrap();
    fs::write(path.join("src/Lib.kt"), "class Lib\n").unwrap();
    fs::write(path.join("publish.sh"), script).unwrap();
    commit_all(&repo, "initial");
    repo
}

/// Version directories published for an artifact, oldest first.
pub fn published_versions(artifact_dir: &Path) -> Vec<u64> {
    let mut versions: Vec<u64> = fs::read_dir(artifact_dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
                .collect()
        })
        .unwrap_or_default();
    versions.sort_unstable();
    versions
}
