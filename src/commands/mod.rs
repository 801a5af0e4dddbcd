//! Implementation of autopublish subcommands.
//!
//! `mod.rs` serves as a thin dispatcher; command logic lives in dedicated
//! modules.

use std::path::{Path, PathBuf};

use crate::cli::{Cli, Commands};
use crate::error::{AutopublishError, Result};
use crate::logging::Logger;

pub(crate) mod init;
pub(crate) mod publish;
pub(crate) mod reset;
pub(crate) mod status;

pub use init::init;
pub use publish::publish;
pub use reset::reset;
pub use status::status;


/// Execute commands based on the parsed CLI arguments.
pub fn execute(cli: &Cli) -> Result<()> {
    execute_with_dir(cli, None)
}

/// Execute commands with an explicit working directory.
pub fn execute_with_dir(cli: &Cli, working_dir: Option<&Path>) -> Result<()> {
    let quiet = cli.global_opts().quiet();
    let verbose = if quiet {
        0
    } else {
        cli.global_opts().verbose()
    };
    let log = Logger::new(verbose, quiet);

    let current_dir = if let Some(dir) = working_dir {
        dir.to_path_buf()
    } else {
        std::env::current_dir().map_err(|source| AutopublishError::IoError {
            path: PathBuf::from("."),
            source,
        })?
    };

    let settings = cli.global_opts().to_settings(&current_dir)?;

    match cli.command() {
        Commands::Publish { generate_template } => publish(&settings, *generate_template, log),
        Commands::Status => status(&settings, log),
        Commands::Init => init(&settings, log),
        Commands::Reset => reset(&settings, log),
    }
}
