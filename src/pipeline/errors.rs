//! Error types for the stage pipeline
//!
//! Two tiers: configuration problems are collected as [`ValidationError`]
//! values during the validate phase and only surface in aggregate through
//! [`PipelineError::StageValidation`]; execution-time failures propagate
//! immediately as [`PipelineError`] and abort the remaining stages.

use thiserror::Error;

/// Errors that can occur while running a stage pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A stage failed validation; carries every problem found in that stage
    #[error("stage '{stage}' failed validation: {}", format_errors(.errors))]
    StageValidation {
        /// Label of the offending stage.
        stage: String,
        /// Every configuration problem collected for the stage.
        errors: Vec<ValidationError>,
    },

    /// A stage read a property-bag field that no earlier stage published
    #[error("required property '{key}' has not been set by any earlier stage")]
    PropertyMissing {
        /// Wire-level name of the missing field.
        key: &'static str,
    },

    /// Launching the external process failed
    #[error("failed to launch '{program}': {source}")]
    Launch {
        /// Program the pipeline tried to start.
        program: String,
        /// Underlying launch failure.
        #[source]
        source: std::io::Error,
    },

    /// The assembled command line could not be split into arguments
    #[error("invalid command arguments: {0}")]
    InvalidArguments(#[from] shell_words::ParseError),

    /// IO error during staging or workspace management
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The stage document names a type outside the known variant set
    #[error("unknown stage type '{name}'")]
    UnknownStageType {
        /// The unresolved member key.
        name: String,
    },

    /// The stage document could not be decoded
    #[error("invalid stage document: {0}")]
    Decode(#[from] serde_json::Error),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Configuration problems found while validating a single stage
///
/// These are collected, never raised one at a time: a stage's `validate`
/// appends every problem it finds so the user sees all of them in one pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `fileName` absent or blank
    #[error("fileName must not be empty or only whitespace")]
    MissingFileName,

    /// Neither selection input supplied
    #[error("includedFiles and includedFileTypes cannot both be absent")]
    MissingSelection,

    /// A category has items but the master template is absent or blank
    #[error("commandArgumentsFormat cannot be empty or only whitespace if {category} has elements")]
    MissingArgumentsFormat {
        /// Field name of the non-empty category.
        category: &'static str,
    },

    /// A category has items but its own format template is absent or blank
    #[error("{format_field} cannot be empty or only whitespace if {category} has elements")]
    MissingCategoryFormat {
        /// Field name of the non-empty category.
        category: &'static str,
        /// Field name of the absent format template.
        format_field: &'static str,
    },

    /// A category format template does not contain the `{File}` token
    #[error("{format_field} ('{format}') must contain {token}")]
    FormatMissingFileToken {
        /// Field name of the offending format template.
        format_field: &'static str,
        /// The offending template text.
        format: String,
        /// The required per-item token.
        token: &'static str,
    },

    /// The master template lacks a non-empty category's list placeholder
    #[error("commandArgumentsFormat must contain {token} if {category} has elements")]
    ArgumentsFormatMissingListToken {
        /// Field name of the non-empty category.
        category: &'static str,
        /// The required list placeholder.
        token: &'static str,
    },

    /// Duplicate `commandValues` key
    #[error("commandValues has repeat key: {key}")]
    DuplicateCommandValue {
        /// The repeated key.
        key: String,
    },

    /// A `commandValues` key is not wrapped in braces
    #[error("commandValues key '{key}' must start with '{{' and end with '}}'")]
    CommandValueNotBraced {
        /// The offending key.
        key: String,
    },

    /// A `commandValues` key does not appear in the master template
    #[error("commandArgumentsFormat does not contain a placeholder for commandValues key '{key}'")]
    CommandValueNotInFormat {
        /// The absent key.
        key: String,
    },

    /// A `commandValues` key or value contains a reserved token
    #[error("commandValues {part} for key '{key}' must not contain reserved token {token}")]
    ReservedTokenCollision {
        /// The offending entry's key.
        key: String,
        /// Which side collided ("key" or "value").
        part: &'static str,
        /// The reserved token that was found.
        token: &'static str,
    },
}
