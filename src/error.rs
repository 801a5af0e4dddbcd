//! Error types for autopublish.
//!
//! This module defines all error types used throughout autopublish, using
//! a combination of `thiserror` for ergonomic error definitions and `miette`
//! for rich diagnostic output.
//!
//! # Error Handling Strategy
//!
//! - All errors derive from [`AutopublishError`]
//! - Module-local failures ([`AutopublishError::VcsQueryFailed`],
//!   [`AutopublishError::BuildFailure`], [`AutopublishError::PersistFailure`])
//!   are recorded per module by the orchestrator and never abort siblings
//! - Everything else aborts the run it occurs in
//!
//! # Example
//!
//! ```no_run
//! use autopublish::error::{AutopublishError, Result};
//!
//! fn require_modules(count: usize) -> Result<()> {
//!     if count == 0 {
//!         return Err(AutopublishError::ConfigError(
//!             "no modules configured".to_string(),
//!         ));
//!     }
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Error types that can occur in autopublish operations
#[derive(Error, Debug, Diagnostic)]
pub enum AutopublishError {
    /// The external process could not be started at all.
    ///
    /// Distinct from a process that started and exited with a non-zero code.
    /// Usually the program is missing from `PATH` or the working directory
    /// does not exist.
    #[error("Failed to start '{program}' in '{dir}'")]
    #[diagnostic(
        code(autopublish::process::spawn_error),
        help("Check that the program is installed and the module path exists.")
    )]
    SpawnError {
        /// The program that failed to start
        program: String,
        /// The working directory it was started in
        dir: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The external process exceeded the configured timeout and was killed.
    #[error("'{program}' in '{dir}' did not finish within {timeout:?} and was killed")]
    #[diagnostic(
        code(autopublish::process::timeout),
        help("Raise --command-timeout, or pass 0 to disable it.")
    )]
    CommandTimedOut {
        /// The program that timed out
        program: String,
        /// The working directory it was started in
        dir: PathBuf,
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// The change detector could not compute a fingerprint for a module.
    ///
    /// Raised when any git query fails, typically because the module path is
    /// not a git working tree or the repository has no commits yet.
    #[error("Could not determine the state of module [{module}] at '{path}': {message}")]
    #[diagnostic(
        code(autopublish::vcs::query_failed),
        help("Each module path must be a git working tree with at least one commit.")
    )]
    VcsQueryFailed {
        /// Coordinate of the module
        module: String,
        /// Location of the module working tree
        path: PathBuf,
        /// What went wrong, including any git error output
        message: String,
    },

    /// The module's own publish command signalled failure.
    ///
    /// Any output on the error stream, a non-zero exit code or a timeout all
    /// count. The module state is not advanced, so the next run retries.
    #[error("Could not publish module [{module}]:\n{message}")]
    #[diagnostic(
        code(autopublish::publish::build_failure),
        help(
            "Investigate and fix the errors in the module build, then run autopublish again."
        )
    )]
    BuildFailure {
        /// Coordinate of the module
        module: String,
        /// Captured error output or exit description
        message: String,
    },

    /// The module was published but its new state could not be recorded.
    ///
    /// The fresh artifact is live. The next run will republish it.
    #[error("Published module [{module}] but failed to record its state")]
    #[diagnostic(
        code(autopublish::state::persist_failure),
        help("The module will be republished on the next run.")
    )]
    PersistFailure {
        /// Coordinate of the module
        module: String,
        /// The storage error
        #[source]
        source: Box<AutopublishError>,
    },

    /// A line of the modules configuration could not be parsed.
    #[error("Malformed entry in '{path}' at line {line}: {message}")]
    #[diagnostic(
        code(autopublish::config::malformed_entry),
        help("Entries use the form <group>:<artifact>=<local path>.")
    )]
    MalformedModuleEntry {
        /// The configuration file
        path: PathBuf,
        /// One-based line number
        line: usize,
        /// Description of the problem
        message: String,
    },

    /// A dependency coordinate is not of the form `group:artifact`.
    #[error("Invalid dependency coordinate '{0}'")]
    #[diagnostic(
        code(autopublish::config::invalid_coordinate),
        help("Use <group>:<artifact> without a version, e.g. com.sample:example.")
    )]
    InvalidCoordinate(
        /// The rejected coordinate
        String,
    ),

    /// Two configured modules share a name or a local path.
    #[error("Duplicate module {kind} '{value}' in '{path}'")]
    #[diagnostic(
        code(autopublish::config::duplicate_module),
        help("Each module needs a unique coordinate and a unique local path.")
    )]
    DuplicateModule {
        /// The configuration file
        path: PathBuf,
        /// Either "name" or "path"
        kind: &'static str,
        /// The duplicated value
        value: String,
    },

    /// The publish command template cannot produce increasing versions.
    #[error("Invalid publish command '{command}': {message}")]
    #[diagnostic(
        code(autopublish::config::invalid_publish_command),
        help("The command must contain the {{version}} placeholder, e.g. \
              './gradlew publishToMavenLocal -PlocalVersion={{version}}'.")
    )]
    InvalidPublishCommand {
        /// The rejected command
        command: String,
        /// Why it was rejected
        message: String,
    },

    /// File system I/O error during autopublish operations.
    #[error("I/O error accessing '{path}'")]
    #[diagnostic(code(autopublish::io_error))]
    IoError {
        /// The path that caused the I/O error
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize the status record to rkyv format.
    #[error("Failed to serialize the status record")]
    #[diagnostic(
        code(autopublish::state::serialization_error),
        help(
            "An internal error occurred while saving module state. Try running 'autopublish \
             reset'."
        )
    )]
    SerializationError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Failed to deserialize the status record.
    ///
    /// The loader recovers from this automatically by starting from an empty
    /// record, which republishes every module once.
    #[error("Failed to deserialize the status record: {0}")]
    #[diagnostic(
        code(autopublish::state::deserialization_error),
        help("The status record may be corrupted. Run 'autopublish reset' to clear it.")
    )]
    DeserializationError(
        /// The underlying deserialization error
        #[source]
        rkyv::rancor::BoxedError,
    ),

    /// A path cannot be represented as UTF-8.
    #[error("Invalid UTF-8 in path: {0}")]
    #[diagnostic(
        code(autopublish::path::invalid_utf8),
        help("Module paths and generated file paths must be valid UTF-8.")
    )]
    InvalidUtf8Path(
        /// The offending path
        PathBuf,
    ),

    /// Invalid or incompatible configuration.
    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(autopublish::config::error),
        help("Check the required configuration parameters.")
    )]
    ConfigError(
        /// Description of the configuration error
        String,
    ),

    /// Another run holds the lock for this status record.
    #[error("Another autopublish run is active (lock file '{0}' exists)")]
    #[diagnostic(
        code(autopublish::lock::held),
        help("Wait for the other run to finish. Remove the lock file if no run is active.")
    )]
    RunLocked(
        /// The lock file path
        PathBuf,
    ),

    /// The run completed but some modules failed.
    #[error("{count} module(s) failed to autopublish: {modules}")]
    #[diagnostic(
        code(autopublish::run::modules_failed),
        help("See the per-module errors above. Failed modules are retried on the next run.")
    )]
    ModulesFailed {
        /// Number of failed modules
        count: usize,
        /// Comma-separated coordinates of the failed modules
        modules: String,
    },
}

/// Type alias for Results in this crate
pub type Result<T> = std::result::Result<T, AutopublishError>;
