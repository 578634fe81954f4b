//! Command-line entry point
//!
//! Bootstraps a pipeline run: resolves the base directory, reads the stage
//! document (creating an empty one on first use), and hands the decoded
//! stages to the processor.

use anyhow::{Context, Result};
use clap::Parser;
use picstage::{decode_stages, init_logging, StageProcessor, CONFIG_FILE_NAME};
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

/// CLI arguments for picstage
#[derive(Parser, Debug)]
#[command(name = "picstage")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base directory of the project (defaults to the current directory)
    base_dir: Option<PathBuf>,

    /// Default tracing filter, e.g. `info` or `picstage=debug`
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Seconds to pause before exiting after a successful run
    #[arg(long, default_value_t = 0)]
    shutdown_delay: u64,
}

/// Parse arguments and run the pipeline
pub fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let base_dir = match args.base_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("could not resolve the current directory")?,
    };
    fs::create_dir_all(&base_dir)
        .with_context(|| format!("could not create base directory '{}'", base_dir.display()))?;

    tracing::info!(dir = %base_dir.display(), "starting picstage");

    let config_path = base_dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        tracing::warn!(
            path = %config_path.display(),
            "no configuration file found, creating an empty one"
        );
        fs::write(&config_path, "[]\n")
            .with_context(|| format!("could not write '{}'", config_path.display()))?;
        return Ok(());
    }

    tracing::info!(path = %config_path.display(), "reading config");
    let document = fs::read_to_string(&config_path)
        .with_context(|| format!("could not read '{}'", config_path.display()))?;
    let stages = decode_stages(&document)
        .with_context(|| format!("could not decode '{}'", config_path.display()))?;

    StageProcessor::new(stages).run(&base_dir)?;

    if args.shutdown_delay > 0 {
        tracing::info!(
            seconds = args.shutdown_delay,
            "finished, waiting before shutting down"
        );
        thread::sleep(Duration::from_secs(args.shutdown_delay));
    }

    Ok(())
}
