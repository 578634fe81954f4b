//! # Picstage - configuration-driven build staging
//!
//! Picstage automates repetitive microcontroller build workflows: it reads a
//! declarative list of stages from a JSON document, validates every stage's
//! configuration before anything runs, copies the selected input files into
//! an isolated temporary workspace, and invokes the vendor toolchain with a
//! token-substituted argument string.
//!
//! ## Stage kinds
//!
//! - [`FileProcessingStage`] selects input files (explicit list or extension
//!   scan), renders the toolchain command from per-category templates, and
//!   stages the files into the workspace.
//! - [`CommandExecutionStage`] launches the external toolchain using the
//!   command the previous stage published.
//!
//! Stages communicate through [`StageProperties`], a small typed bag of
//! intermediate results created fresh for each run. [`StageProcessor`] drives
//! the two-phase protocol: validate everything, then execute everything, with
//! the workspace removed on every exit path.
//!
//! ## Configuration
//!
//! The document is a JSON object whose member keys name the stage kind:
//!
//! ```json
//! {
//!     "FileProcessingStage": {
//!         "fileName": "/opt/microchip/xc8/bin/xc8",
//!         "includedFileTypes": ["c"],
//!         "includedFileFormat": "{File}",
//!         "includedFileTerminationTrim": 1,
//!         "commandArgumentsFormat": "{IncludedFileList} --chip {Chip}",
//!         "commandValues": [{"key": "{Chip}", "value": "pic16f628a"}]
//!     },
//!     "CommandExecutionStage": {
//!         "workingDirectory": "output",
//!         "waitForEnd": true
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod infrastructure;
pub mod pipeline;

pub use infrastructure::init_logging;
pub use pipeline::{
    decode_stages, CommandExecutionStage, FileProcessingStage, KeyValue, PipelineError,
    RunContext, Stage, StageKind, StageProcessor, StageProperties, ValidationError,
    CONFIG_FILE_NAME,
};

/// Version of the picstage crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
