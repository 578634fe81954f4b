//! Stage pipeline domain: stage kinds, shared properties, orchestration

pub mod command_execution;
pub mod errors;
pub mod file_processing;
pub mod processor;
pub mod properties;
pub mod stage;
pub mod tokens;

use serde::{Deserialize, Serialize};

pub use command_execution::CommandExecutionStage;
pub use errors::{PipelineError, ValidationError};
pub use file_processing::FileProcessingStage;
pub use processor::{RunContext, StageProcessor, CONFIG_FILE_NAME};
pub use properties::StageProperties;
pub use stage::{decode_stages, Stage, StageKind};

/// An ordered key/value entry, used for user command substitutions and
/// child-process environment overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    /// Entry key.
    pub key: String,
    /// Entry value.
    pub value: String,
}

impl KeyValue {
    /// Creates an entry.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
