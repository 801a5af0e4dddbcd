//! Typed configuration: the modules file and the run settings.
//!
//! Everything is validated once at load time. Later stages only see
//! well-formed [`ModuleConfig`] values and a complete [`Settings`].

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::error::{AutopublishError, Result};


/// Placeholder substituted with the version marker in the publish command.
pub const VERSION_PLACEHOLDER: &str = "{version}";

pub const DEFAULT_PUBLISH_COMMAND: &str =
    "./gradlew publishToMavenLocal -PlocalVersion={version}";

pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30 * 60;

/// Commented modules file written by `init` and `publish --generate-template`.
pub const STARTER_TEMPLATE: &str = "\
# Configuration for what modules should be autopublished.
# The expected structure is <dependency>=<local path>, eg:
# com.sample\\:example=../anotherProject
# The path can be relative to this project or an absolute path.
";

static COORDINATE_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$").expect("coordinate pattern is valid")
});

/// A dependency coordinate without version: `group:artifact`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    group: String,
    artifact: String,
}

impl Coordinate {
    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }
}

impl FromStr for Coordinate {
    type Err = AutopublishError;

    fn from_str(value: &str) -> Result<Self> {
        let invalid = || AutopublishError::InvalidCoordinate(value.to_string());
        let (group, artifact) = value.trim().split_once(':').ok_or_else(invalid)?;

        if !COORDINATE_PART.is_match(group) || !COORDINATE_PART.is_match(artifact) {
            return Err(invalid());
        }

        Ok(Self {
            group: group.to_string(),
            artifact: artifact.to_string(),
        })
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)
    }
}

/// One module to autopublish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleConfig {
    /// Coordinate of the artifact the module produces.
    pub name: Coordinate,
    /// Path exactly as configured. Used as the key of the status record.
    pub local_path: String,
    /// `local_path` resolved against the consuming project directory.
    pub location: PathBuf,
}

impl ModuleConfig {
    pub fn new(name: Coordinate, local_path: impl Into<String>, project_dir: &Path) -> Self {
        let local_path = local_path.into();
        let location = normalize_path(project_dir.join(&local_path));
        Self {
            name,
            local_path,
            location,
        }
    }
}

/// Outcome of reading the modules configuration.
#[derive(Debug)]
pub enum ModulesConfig {
    /// The configuration file does not exist.
    Missing,
    /// The file exists but declares no module.
    Empty,
    /// At least one module is configured.
    Modules(Vec<ModuleConfig>),
}

impl ModulesConfig {
    /// Load and validate the modules file at `path`.
    ///
    /// Relative module paths are resolved against `project_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a line is malformed, a
    /// coordinate is invalid, or a name or path is declared twice.
    pub fn load(path: &Path, project_dir: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::Missing);
        }

        let contents = fs::read_to_string(path).map_err(|source| AutopublishError::IoError {
            path: path.to_path_buf(),
            source,
        })?;

        let modules = parse_modules(&contents, path, project_dir)?;
        if modules.is_empty() {
            Ok(Self::Empty)
        } else {
            Ok(Self::Modules(modules))
        }
    }

    /// Configured modules, empty unless [`ModulesConfig::Modules`].
    pub fn modules(&self) -> &[ModuleConfig] {
        match self {
            Self::Modules(modules) => modules,
            Self::Missing | Self::Empty => &[],
        }
    }
}

/// Parse properties-style `name=localPath` entries.
pub fn parse_modules(contents: &str, path: &Path, project_dir: &Path) -> Result<Vec<ModuleConfig>> {
    let mut modules: Vec<ModuleConfig> = Vec::new();
    let mut names = HashSet::new();
    let mut paths = HashSet::new();

    for (index, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let malformed = |message: &str| AutopublishError::MalformedModuleEntry {
            path: path.to_path_buf(),
            line: index + 1,
            message: message.to_string(),
        };

        let (key, value) = split_entry(line).ok_or_else(|| malformed("missing '='"))?;
        if key.is_empty() {
            return Err(malformed("missing dependency coordinate"));
        }
        if value.is_empty() {
            return Err(malformed("missing local path"));
        }

        let name: Coordinate = key
            .parse()
            .map_err(|err: AutopublishError| malformed(&err.to_string()))?;

        if !names.insert(name.clone()) {
            return Err(AutopublishError::DuplicateModule {
                path: path.to_path_buf(),
                kind: "name",
                value: name.to_string(),
            });
        }
        if !paths.insert(value.clone()) {
            return Err(AutopublishError::DuplicateModule {
                path: path.to_path_buf(),
                kind: "path",
                value,
            });
        }

        modules.push(ModuleConfig::new(name, value, project_dir));
    }

    Ok(modules)
}

/// Split a properties line on its first unescaped `=` and unescape both
/// halves.
fn split_entry(line: &str) -> Option<(String, String)> {
    let mut key = String::new();
    let mut chars = line.chars();

    loop {
        match chars.next()? {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    key.push(unescape(escaped));
                }
            }
            '=' => break,
            c => key.push(c),
        }
    }

    let mut value = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    value.push(unescape(escaped));
                }
            }
            c => value.push(c),
        }
    }

    Some((key.trim().to_string(), value.trim().to_string()))
}

fn unescape(c: char) -> char {
    match c {
        't' => '\t',
        'n' => '\n',
        'r' => '\r',
        other => other,
    }
}

/// Write the commented starter template if no file exists at `path`.
///
/// Returns `true` when a file was created.
pub fn write_starter_template(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| AutopublishError::IoError {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, STARTER_TEMPLATE).map_err(|source| AutopublishError::IoError {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(true)
}

/// The module build command, with a `{version}` placeholder.
///
/// The command is split into arguments the way a POSIX shell splits words,
/// without any expansion: single quotes keep their content literally, double
/// quotes honor `\"` and `\\`, and a backslash outside quotes escapes the
/// next character.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishCommand {
    argv: Vec<String>,
}

impl PublishCommand {
    /// Arguments with the placeholder replaced by `version`.
    pub fn render(&self, version: u64) -> Vec<String> {
        let version = version.to_string();
        self.argv
            .iter()
            .map(|arg| arg.replace(VERSION_PLACEHOLDER, &version))
            .collect()
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }
}

impl FromStr for PublishCommand {
    type Err = AutopublishError;

    fn from_str(command: &str) -> Result<Self> {
        let invalid = |message: &str| AutopublishError::InvalidPublishCommand {
            command: command.to_string(),
            message: message.to_string(),
        };

        let argv = split_arguments(command).ok_or_else(|| invalid("unterminated quote"))?;
        if argv.is_empty() {
            return Err(invalid("the command is empty"));
        }
        if argv[0].contains(VERSION_PLACEHOLDER) {
            return Err(invalid("the program itself cannot contain the version"));
        }
        if !argv.iter().any(|arg| arg.contains(VERSION_PLACEHOLDER)) {
            return Err(invalid("no {version} placeholder"));
        }

        Ok(Self { argv })
    }
}

impl Default for PublishCommand {
    fn default() -> Self {
        Self {
            argv: DEFAULT_PUBLISH_COMMAND
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        }
    }
}

impl fmt::Display for PublishCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quoted: Vec<String> = self.argv.iter().map(|arg| quote_argument(arg)).collect();
        f.write_str(&quoted.join(" "))
    }
}

/// Split `command` into shell words. `None` when a quote is left open.
fn split_arguments(command: &str) -> Option<Vec<String>> {
    let mut argv = Vec::new();
    let mut current: Option<String> = None;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if let Some(word) = current.take() {
                    argv.push(word);
                }
            }
            '\\' => {
                let word = current.get_or_insert_with(String::new);
                if let Some(escaped) = chars.next() {
                    word.push(escaped);
                }
            }
            '\'' => {
                let word = current.get_or_insert_with(String::new);
                loop {
                    match chars.next()? {
                        '\'' => break,
                        other => word.push(other),
                    }
                }
            }
            '"' => {
                let word = current.get_or_insert_with(String::new);
                loop {
                    match chars.next()? {
                        '"' => break,
                        '\\' => match chars.next()? {
                            escaped @ ('"' | '\\') => word.push(escaped),
                            other => {
                                word.push('\\');
                                word.push(other);
                            }
                        },
                        other => word.push(other),
                    }
                }
            }
            other => current.get_or_insert_with(String::new).push(other),
        }
    }

    argv.extend(current);
    Some(argv)
}

fn quote_argument(arg: &str) -> String {
    let plain = !arg.is_empty()
        && !arg
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '\'' | '"' | '\\'));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

/// Resolved settings for one invocation.
///
/// Built once at startup and passed by reference to every stage.
#[derive(Clone, Debug)]
pub struct Settings {
    pub project_dir: PathBuf,
    pub modules_config: PathBuf,
    pub status_path: PathBuf,
    pub init_script: PathBuf,
    pub local_repository: PathBuf,
    pub publish_command: PublishCommand,
    pub command_timeout: Option<Duration>,
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Location of the run lock guarding the status record.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .status_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.status_path.with_file_name(name)
    }
}

/// Builder for [`Settings`]; unset paths fall back to the project layout.
#[derive(Debug, Default)]
pub struct SettingsBuilder {
    project_dir: Option<PathBuf>,
    modules_config: Option<PathBuf>,
    status_path: Option<PathBuf>,
    init_script: Option<PathBuf>,
    local_repository: Option<PathBuf>,
    publish_command: Option<String>,
    command_timeout_secs: Option<u64>,
}

impl SettingsBuilder {
    pub fn project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(dir.into());
        self
    }

    pub fn modules_config(mut self, path: Option<impl Into<PathBuf>>) -> Self {
        self.modules_config = path.map(Into::into);
        self
    }

    pub fn status_path(mut self, path: Option<impl Into<PathBuf>>) -> Self {
        self.status_path = path.map(Into::into);
        self
    }

    pub fn init_script(mut self, path: Option<impl Into<PathBuf>>) -> Self {
        self.init_script = path.map(Into::into);
        self
    }

    pub fn local_repository(mut self, path: Option<impl Into<PathBuf>>) -> Self {
        self.local_repository = path.map(Into::into);
        self
    }

    pub fn publish_command(mut self, command: Option<impl Into<String>>) -> Self {
        self.publish_command = command.map(Into::into);
        self
    }

    /// Timeout per external command in seconds; `0` disables it.
    pub fn command_timeout_secs(mut self, secs: u64) -> Self {
        self.command_timeout_secs = Some(secs);
        self
    }

    /// Validate and resolve the settings.
    ///
    /// Relative paths are resolved against the project directory, which is
    /// itself resolved against the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the publish command is invalid or no local
    /// repository was given and the home directory cannot be determined.
    pub fn build(self) -> Result<Settings> {
        let project_dir = normalize_path(self.project_dir.unwrap_or_else(|| PathBuf::from(".")));
        let in_project = |path: PathBuf| normalize_path(project_dir.join(path));

        let modules_config = in_project(
            self.modules_config
                .unwrap_or_else(|| Path::new("autopublish").join("modules.properties")),
        );
        let status_path = in_project(
            self.status_path
                .unwrap_or_else(|| Path::new("autopublish").join("modules-status.metadata")),
        );
        let init_script = in_project(self.init_script.unwrap_or_else(|| {
            Path::new("build")
                .join("autopublish")
                .join("autopublish.init.gradle.kts")
        }));

        let local_repository = match self.local_repository {
            Some(path) => in_project(path),
            None => home::home_dir()
                .map(|home| home.join(".m2").join("repository"))
                .ok_or_else(|| {
                    AutopublishError::ConfigError(
                        "Cannot determine the home directory; pass --local-repository".to_string(),
                    )
                })?,
        };

        let publish_command = match self.publish_command {
            Some(command) => command.parse()?,
            None => PublishCommand::default(),
        };

        let timeout_secs = self
            .command_timeout_secs
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS);
        let command_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

        Ok(Settings {
            project_dir,
            modules_config,
            status_path,
            init_script,
            local_repository,
            publish_command,
            command_timeout,
        })
    }
}

/// Normalize a path to be absolute and clean, without requiring it to exist.
///
/// This function:
/// - Converts relative paths to absolute using the current directory
/// - Removes `.` and `..` components where possible
/// - Does NOT resolve symlinks (preserves user intent)
pub(crate) fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();

    let absolute = if path.is_relative() {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    } else {
        path.to_path_buf()
    };

    let mut components = Vec::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                // `..` above the root stays at the root.
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            Component::CurDir => continue,
            _ => components.push(component),
        }
    }

    components.iter().collect()
}
