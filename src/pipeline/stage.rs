//! Stage contract and document decoding
//!
//! A stage is one unit of the pipeline's sequential work: validated first,
//! executed only after every stage in the run passed validation. The variant
//! set is closed: adding a stage kind is a compile-time addition to
//! [`StageKind`] and the decoder's match, not a runtime discovery.

use super::command_execution::CommandExecutionStage;
use super::errors::{PipelineError, ValidationError};
use super::file_processing::FileProcessingStage;
use super::processor::RunContext;
use super::properties::StageProperties;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// One unit of pipeline work with an optional diagnostic label
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    /// Human-readable label, for diagnostics only.
    pub name: Option<String>,

    /// The stage's kind and configuration.
    pub kind: StageKind,
}

/// The closed set of stage variants
#[derive(Debug, Clone, PartialEq)]
pub enum StageKind {
    /// Selects and stages files, and builds the toolchain command.
    FileProcessing(FileProcessingStage),

    /// Launches the external toolchain process.
    CommandExecution(CommandExecutionStage),
}

impl StageKind {
    /// Wire-level type name, as used for the document member key.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::FileProcessing(_) => "FileProcessingStage",
            Self::CommandExecution(_) => "CommandExecutionStage",
        }
    }
}

impl Stage {
    /// Inspects configuration only, appending every discovered problem to
    /// `errors`. Expected configuration problems never abort the check.
    pub fn validate(&self, errors: &mut Vec<ValidationError>) {
        match &self.kind {
            StageKind::FileProcessing(stage) => stage.validate(errors),
            StageKind::CommandExecution(stage) => stage.validate(errors),
        }
    }

    /// Performs the stage's real work. Runs only after all stages in the
    /// pipeline passed validation.
    ///
    /// # Errors
    ///
    /// Propagates the stage's [`PipelineError`]; the first failure aborts
    /// the remaining stages.
    pub fn execute(
        &self,
        ctx: &RunContext,
        props: &mut StageProperties,
    ) -> Result<(), PipelineError> {
        match &self.kind {
            StageKind::FileProcessing(stage) => stage.execute(ctx, props),
            StageKind::CommandExecution(stage) => stage.execute(ctx, props),
        }
    }

    /// Diagnostic label: the type name, with the user label appended when
    /// one was configured.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{}({name})", self.kind.type_name()),
            None => self.kind.type_name().to_string(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// A stage's field object plus the shared diagnostic label.
#[derive(Deserialize)]
struct Fields<T> {
    name: Option<String>,
    #[serde(flatten)]
    config: T,
}

/// Decodes an ordered stage list from a configuration document.
///
/// The document is a JSON object whose member keys are stage type names and
/// whose values are the stages' field objects; member order is preserved. An
/// empty array document (the bootstrap writes one) decodes to an empty
/// pipeline.
///
/// # Errors
///
/// Returns [`PipelineError::Decode`] for malformed JSON or field objects and
/// [`PipelineError::UnknownStageType`] for a member key outside the variant
/// set.
pub fn decode_stages(document: &str) -> Result<Vec<Stage>, PipelineError> {
    let root: Value = serde_json::from_str(document)?;

    let entries = match root {
        Value::Array(items) if items.is_empty() => return Ok(Vec::new()),
        Value::Object(map) => map,
        other => {
            return Err(PipelineError::Decode(serde::de::Error::custom(format!(
                "expected an object of stages, got {}",
                json_type_name(&other)
            ))))
        }
    };

    let mut stages = Vec::with_capacity(entries.len());
    for (type_name, value) in entries {
        let stage = match type_name.as_str() {
            "FileProcessingStage" => {
                let fields: Fields<FileProcessingStage> = serde_json::from_value(value)?;
                Stage {
                    name: fields.name,
                    kind: StageKind::FileProcessing(fields.config),
                }
            }
            "CommandExecutionStage" => {
                let fields: Fields<CommandExecutionStage> = serde_json::from_value(value)?;
                Stage {
                    name: fields.name,
                    kind: StageKind::CommandExecution(fields.config),
                }
            }
            _ => return Err(PipelineError::UnknownStageType { name: type_name }),
        };
        stages.push(stage);
    }
    Ok(stages)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
