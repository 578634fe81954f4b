//! Shared stage properties
//!
//! A small typed bag of intermediate results carried between stages within
//! one pipeline run. Fields are set by one stage and read by a later one;
//! absence is a distinct, checkable state rather than an empty string. The
//! `require_*` accessors fail with [`PipelineError::PropertyMissing`] naming
//! the field's wire-level key (`temp`, `working`, `cmdArgs`, `cmdFile`).

use super::errors::PipelineError;
use std::path::{Path, PathBuf};

/// Intermediate results shared across one pipeline run
#[derive(Debug, Clone, Default)]
pub struct StageProperties {
    /// Temporary workspace directory, set by the processor before execution.
    pub temp_dir: Option<PathBuf>,

    /// Working directory published for a later command-execution stage.
    pub working_dir: Option<PathBuf>,

    /// Assembled toolchain argument string.
    pub command_args: Option<String>,

    /// Resolved toolchain executable path.
    pub command_file: Option<String>,
}

impl StageProperties {
    /// Creates an empty property bag for a fresh run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the temp workspace directory.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::PropertyMissing`] if the processor has not
    /// published the workspace yet.
    pub fn require_temp_dir(&self) -> Result<&Path, PipelineError> {
        self.temp_dir
            .as_deref()
            .ok_or(PipelineError::PropertyMissing { key: "temp" })
    }

    /// Returns the published working directory.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::PropertyMissing`] if no earlier stage
    /// published one.
    pub fn require_working_dir(&self) -> Result<&Path, PipelineError> {
        self.working_dir
            .as_deref()
            .ok_or(PipelineError::PropertyMissing { key: "working" })
    }

    /// Returns the assembled command argument string.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::PropertyMissing`] if no earlier stage
    /// published one.
    pub fn require_command_args(&self) -> Result<&str, PipelineError> {
        self.command_args
            .as_deref()
            .ok_or(PipelineError::PropertyMissing { key: "cmdArgs" })
    }

    /// Returns the resolved executable path.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::PropertyMissing`] if no earlier stage
    /// published one.
    pub fn require_command_file(&self) -> Result<&str, PipelineError> {
        self.command_file
            .as_deref()
            .ok_or(PipelineError::PropertyMissing { key: "cmdFile" })
    }
}
