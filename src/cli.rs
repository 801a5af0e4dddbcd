//! Command-line interface definitions for autopublish.
//!
//! This module defines the CLI structure using clap, including all subcommands
//! and their arguments. The main entry point is the [`Cli`] struct.
//!
//! # Example
//!
//! ```no_run
//! use autopublish::cli::{Cli, Commands};
//! use clap::Parser;
//!
//! let cli = Cli::parse();
//!
//! match cli.command() {
//!     Commands::Publish { generate_template } => {
//!         println!("Publishing (template: {generate_template})");
//!     }
//!     _ => {}
//! }
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::config::{DEFAULT_COMMAND_TIMEOUT_SECS, Settings};
use crate::error::{AutopublishError, Result};


/// Main command-line interface for autopublish.
///
/// This struct represents the top-level CLI configuration, containing both
/// global options that apply to all commands and the specific subcommand
/// to execute.
#[derive(Parser)]
#[command(
    name = "autopublish",
    bin_name = "autopublish",
    author,
    version,
    about = "Republish changed local library modules and point a project at the fresh builds",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    global_opts: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

/// Global options that apply to all autopublish commands.
///
/// Relative paths are resolved against the project directory.
#[derive(Parser)]
pub struct GlobalOpts {
    /// Directory of the consuming project
    #[arg(long, global = true, default_value = ".", env = "AUTOPUBLISH_PROJECT_DIR")]
    project_dir: PathBuf,

    /// Modules file (defaults to `<project-dir>/autopublish/modules.properties`)
    #[arg(long, global = true, env = "AUTOPUBLISH_MODULES_CONFIG")]
    modules_config: Option<PathBuf>,

    /// Status record (defaults to
    /// `<project-dir>/autopublish/modules-status.metadata`)
    #[arg(long, global = true, env = "AUTOPUBLISH_STATUS_PATH")]
    status_path: Option<PathBuf>,

    /// Generated Gradle init script (defaults to
    /// `<project-dir>/build/autopublish/autopublish.init.gradle.kts`)
    #[arg(long, global = true, env = "AUTOPUBLISH_INIT_SCRIPT")]
    init_script: Option<PathBuf>,

    /// Local Maven repository (defaults to ~/.m2/repository)
    #[arg(long, global = true, env = "AUTOPUBLISH_LOCAL_REPOSITORY")]
    local_repository: Option<PathBuf>,

    /// Command publishing a module, run in the module directory. Must contain
    /// a `{version}` placeholder. Arguments are split on whitespace; use
    /// single or double quotes (or `\`) to keep spaces in one argument. No
    /// shell expansion happens.
    #[arg(long, global = true, env = "AUTOPUBLISH_PUBLISH_COMMAND")]
    publish_command: Option<String>,

    /// Seconds any single external command may run (0 disables the limit)
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_COMMAND_TIMEOUT_SECS,
        env = "AUTOPUBLISH_COMMAND_TIMEOUT"
    )]
    command_timeout: u64,

    /// Enable verbose output (use multiple times for more verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count, env = "AUTOPUBLISH_VERBOSE")]
    verbose: u8,

    /// Silence all output except for errors
    #[arg(
        short,
        long,
        global = true,
        conflicts_with = "verbose",
        env = "AUTOPUBLISH_QUIET"
    )]
    quiet: bool,
}

impl GlobalOpts {
    /// Create a new builder for constructing `GlobalOpts` programmatically.
    pub fn builder() -> GlobalOptsBuilder {
        GlobalOptsBuilder::default()
    }

    /// Resolve the options into [`Settings`], with a relative project
    /// directory taken relative to `working_dir`.
    pub fn to_settings(&self, working_dir: &Path) -> Result<Settings> {
        Settings::builder()
            .project_dir(working_dir.join(&self.project_dir))
            .modules_config(self.modules_config.clone())
            .status_path(self.status_path.clone())
            .init_script(self.init_script.clone())
            .local_repository(self.local_repository.clone())
            .publish_command(self.publish_command.clone())
            .command_timeout_secs(self.command_timeout)
            .build()
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn modules_config(&self) -> Option<&Path> {
        self.modules_config.as_deref()
    }

    pub fn status_path(&self) -> Option<&Path> {
        self.status_path.as_deref()
    }

    pub fn publish_command(&self) -> Option<&str> {
        self.publish_command.as_deref()
    }

    pub fn command_timeout(&self) -> u64 {
        self.command_timeout
    }

    /// Get the verbose level
    pub fn verbose(&self) -> u8 {
        self.verbose
    }

    /// Check if quiet mode is enabled
    pub fn quiet(&self) -> bool {
        self.quiet
    }
}

/// Builder for constructing `GlobalOpts` programmatically.
///
/// This builder provides a fluent API for creating `GlobalOpts` instances
/// without going through command-line parsing. Useful for testing and
/// programmatic usage.
#[derive(Debug, Default)]
pub struct GlobalOptsBuilder {
    project_dir: Option<PathBuf>,
    modules_config: Option<PathBuf>,
    status_path: Option<PathBuf>,
    init_script: Option<PathBuf>,
    local_repository: Option<PathBuf>,
    publish_command: Option<String>,
    command_timeout: Option<u64>,
    verbose: u8,
    quiet: bool,
}

impl GlobalOptsBuilder {
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

    pub fn command_timeout(mut self, secs: u64) -> Self {
        self.command_timeout = Some(secs);
        self
    }

    /// Set the verbosity level (0 = normal, 1+ = verbose).
    pub fn verbose(mut self, level: u8) -> Self {
        self.verbose = level;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Build the `GlobalOpts` instance with the configured values.
    pub fn build(self) -> GlobalOpts {
        GlobalOpts {
            project_dir: self.project_dir.unwrap_or_else(|| PathBuf::from(".")),
            modules_config: self.modules_config,
            status_path: self.status_path,
            init_script: self.init_script,
            local_repository: self.local_repository,
            publish_command: self.publish_command,
            command_timeout: self.command_timeout.unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS),
            verbose: self.verbose,
            quiet: self.quiet,
        }
    }
}

impl Cli {
    /// Get the global options
    pub fn global_opts(&self) -> &GlobalOpts {
        &self.global_opts
    }

    /// Get the command
    pub fn command(&self) -> &Commands {
        &self.command
    }

    /// Create a builder for programmatic construction
    pub fn builder() -> CliBuilder {
        CliBuilder::default()
    }
}

/// Builder for [`Cli`]
#[derive(Debug, Default)]
pub struct CliBuilder {
    global_opts: GlobalOptsBuilder,
    command: Option<Commands>,
}

impl CliBuilder {
    pub fn project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.global_opts = self.global_opts.project_dir(dir);
        self
    }

    pub fn modules_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_opts = self.global_opts.modules_config(Some(path));
        self
    }

    pub fn status_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_opts = self.global_opts.status_path(Some(path));
        self
    }

    pub fn init_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_opts = self.global_opts.init_script(Some(path));
        self
    }

    pub fn local_repository(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_opts = self.global_opts.local_repository(Some(path));
        self
    }

    pub fn publish_command(mut self, command: impl Into<String>) -> Self {
        self.global_opts = self.global_opts.publish_command(Some(command));
        self
    }

    pub fn command_timeout(mut self, secs: u64) -> Self {
        self.global_opts = self.global_opts.command_timeout(secs);
        self
    }

    /// Set the verbose level
    pub fn verbose(mut self, level: u8) -> Self {
        self.global_opts = self.global_opts.verbose(level);
        self
    }

    /// Enable quiet mode
    pub fn quiet(mut self, enabled: bool) -> Self {
        self.global_opts = self.global_opts.quiet(enabled);
        self
    }

    /// Set the command
    pub fn command(mut self, command: Commands) -> Self {
        self.command = Some(command);
        self
    }

    /// Build the Cli instance
    pub fn build(self) -> Result<Cli> {
        let command = self
            .command
            .ok_or_else(|| AutopublishError::ConfigError("Command is required".to_string()))?;

        Ok(Cli {
            global_opts: self.global_opts.build(),
            command,
        })
    }
}

/// Available autopublish subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Publish every changed module and update the init script
    ///
    /// For each configured module:
    /// 1. Fingerprints the module's git working tree
    /// 2. Skips it when the fingerprint matches the last published one
    /// 3. Otherwise runs the publish command and records the new fingerprint
    ///
    /// Afterwards the Gradle init script is regenerated so the consuming
    /// project resolves the published modules from the local repository.
    /// A failing module never stops the others; the command exits non-zero
    /// if any module failed.
    Publish {
        /// Write a commented modules file template if none exists
        #[arg(long, env = "AUTOPUBLISH_GENERATE_TEMPLATE")]
        generate_template: bool,
    },

    /// Report which modules changed since they were last published
    ///
    /// Runs change detection only. Nothing is published or recorded.
    Status,

    /// Write a commented modules file template
    ///
    /// Leaves an existing modules file untouched.
    Init,

    /// Remove the status record
    ///
    /// Every module is republished on the next run.
    Reset,
}
