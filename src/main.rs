//! picstage - configuration-driven build staging for microcontroller projects
//!
//! Reads a declarative stage list from `picstage_config.json` in the base
//! directory, validates every stage up front, stages input files into an
//! isolated temporary workspace, and invokes the vendor toolchain with an
//! assembled argument string.
//!
//! ## Usage
//!
//! ```bash
//! # Run the pipeline in the current directory
//! picstage
//!
//! # Run the pipeline rooted at a project directory
//! picstage ~/projects/blinky
//! ```
//!
//! On first use, a missing configuration file is created empty so a project
//! can be bootstrapped in place.

use std::process::ExitCode;

mod cli;

fn main() -> ExitCode {
    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            if std::env::var("PICSTAGE_VERBOSE").is_ok() {
                eprintln!("{e:?}");
            }
            ExitCode::FAILURE
        }
    }
}
