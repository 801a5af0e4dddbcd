//! # autopublish CLI
//!
//! Keeps a consuming Gradle project on fresh local builds of the library
//! modules it depends on. Only modules whose git working tree changed since
//! their last publish are rebuilt.
//!
//! ## Commands
//!
//! - **publish**: Publish changed modules and regenerate the init script
//! - **status**: Report which modules changed, without publishing
//! - **init**: Write a commented modules file template
//! - **reset**: Remove the status record, forcing a full republish
//!
//! ## Quick Start
//!
//! ```bash
//! autopublish init
//! # list modules in autopublish/modules.properties, then:
//! autopublish publish
//! ./gradlew build --init-script build/autopublish/autopublish.init.gradle.kts
//! ```
//!
//! ## Environment Variables
//!
//! - `AUTOPUBLISH_PROJECT_DIR`: Consuming project directory (default: .)
//! - `AUTOPUBLISH_PUBLISH_COMMAND`: Command publishing one module
//! - `AUTOPUBLISH_VERBOSE`: Enable verbose output
//! - `AUTOPUBLISH_QUIET`: Silence all output except errors
//!
//! See `autopublish --help` for every option.

use std::io::IsTerminal;

use autopublish::cli::Cli;
use clap::Parser;

fn main() -> miette::Result<()> {
    // Install miette's fancy panic and error report handler
    miette::set_panic_hook();

    // Configure miette handler based on terminal capabilities
    if std::io::stderr().is_terminal() {
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::unicode_nocolor())
                    .with_context_lines(3),
            )
        }))?;
    } else {
        // Use a simpler handler for non-TTY environments (CI, build logs)
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::none())
                    .with_context_lines(0),
            )
        }))?;
    }

    let cli = Cli::parse();

    autopublish::commands::execute(&cli).map_err(Into::into)
}
