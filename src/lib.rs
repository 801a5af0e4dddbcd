//! # autopublish
//!
//! Incrementally republishes locally developed library modules and points a
//! consuming project at the fresh builds.
//!
//! ## Overview
//!
//! Each configured module is a git working tree. autopublish fingerprints the
//! committed state plus every pending change, compares it with the
//! fingerprint recorded at the module's last successful publish, and runs the
//! module's publish command only when they differ. Modules that were
//! published are then substituted in the consuming project's dependency
//! resolution through a generated Gradle init script.
//!
//! ## Architecture
//!
//! - [`cli`]: Command-line interface definitions using clap
//! - [`commands`]: Implementation of the autopublish subcommands
//! - [`config`]: Modules file parsing and resolved [`config::Settings`]
//! - [`error`]: Error types and handling with thiserror + miette
//! - [`process`]: External command execution behind [`process::CommandRunner`]
//! - [`detector`]: Working-tree fingerprints through git
//! - [`publisher`]: Running the module publish command
//! - [`state`] and [`metadata`]: The durable per-module status record
//! - [`rewriter`]: Dependency substitution for the consuming project
//! - [`orchestrator`]: The per-module pipeline tying it all together
//!
//! Internal modules (not part of the public API):
//! - `hashing`: SHA-256 fingerprint accumulation
//! - `lock`: Run-level lock file
//! - `logging`: Prefixed stderr output
//! - `timestamp`: Strictly increasing version markers
//!
//! ## Library Usage
//!
//! ```no_run
//! use autopublish::cli::{Cli, Commands};
//! use autopublish::commands;
//!
//! let cli = Cli::builder()
//!     .project_dir("app")
//!     .verbose(1)
//!     .command(Commands::Publish {
//!         generate_template: false,
//!     })
//!     .build()?;
//!
//! commands::execute(&cli)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! The crate uses a combination of:
//! - `thiserror` for strongly-typed errors
//! - `miette` for rich diagnostic output in CLI
//!
//! A failing module never aborts its siblings; it is reported in the
//! [`orchestrator::RunReport`].

pub mod cli;
pub mod commands;
pub mod config;
pub mod detector;
pub mod error;
pub mod metadata;
pub mod orchestrator;
pub mod process;
pub mod publisher;
pub mod rewriter;
pub mod state;

// Internal modules
mod hashing;
mod lock;
mod logging;
mod timestamp;

#[cfg(test)]
mod testing;

pub use hashing::{Fingerprint, FingerprintHasher};
pub use logging::Logger;
pub use timestamp::VersionClock;
