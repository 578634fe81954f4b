//! Command-execution stage
//!
//! Launches the external toolchain using the command a file-processing stage
//! published into the shared properties. The working directory comes from a
//! stage-local override or from the `working` property; it can be cleared and
//! recreated before the run. The launch either blocks until the child exits
//! (child inherits the console, separated by visual rules) or returns
//! immediately with the child's stdout redirected into a pipe.

use super::errors::PipelineError;
use super::processor::RunContext;
use super::properties::StageProperties;
use super::KeyValue;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Width of the separator rule printed around a blocking child's output.
const SEPARATOR_WIDTH: usize = 80;

/// Configuration for a command-execution stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandExecutionStage {
    /// Environment overrides for the child process, applied in order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Vec<KeyValue>>,

    /// Run the whole command line through `sh -c` instead of spawning the
    /// executable directly.
    #[serde(default)]
    pub use_shell_execute: bool,

    /// Delete and recreate the working directory before launching.
    #[serde(default)]
    pub clear_working_directory: bool,

    /// Block until the child exits, with its output on the console.
    #[serde(default)]
    pub wait_for_end: bool,

    /// Working directory relative to the base directory; takes precedence
    /// over the `working` property.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}

impl CommandExecutionStage {
    /// No cross-field rules; field types are checked at decode time.
    pub fn validate(&self, _errors: &mut Vec<super::errors::ValidationError>) {}

    /// Launches the published command.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::PropertyMissing`] when neither a stage-local
    /// working directory nor a published one is available, or when no command
    /// has been published; launch and filesystem failures propagate as
    /// [`PipelineError::Launch`] / [`PipelineError::Io`].
    pub fn execute(
        &self,
        ctx: &RunContext,
        props: &mut StageProperties,
    ) -> Result<(), PipelineError> {
        let working = self.resolve_working_dir(ctx, props)?;

        if self.clear_working_directory && working.exists() {
            tracing::debug!(dir = %working.display(), "clearing working directory");
            fs::remove_dir_all(&working)?;
        }
        fs::create_dir_all(&working)?;

        let program = props.require_command_file()?.to_string();
        let args = props.command_args.clone().unwrap_or_default();

        let mut command = if self.use_shell_execute {
            let mut sh = Command::new("sh");
            sh.arg("-c").arg(format!("{program} {args}"));
            sh
        } else {
            let mut direct = Command::new(&program);
            direct.args(shell_words::split(&args)?);
            direct
        };
        command.current_dir(&working);
        if let Some(environment) = &self.environment {
            for kv in environment {
                command.env(&kv.key, &kv.value);
            }
        }

        tracing::info!(%program, %args, dir = %working.display(), "launching command");

        if self.wait_for_end {
            // Child inherits the console; fence its output off from ours.
            println!("{}", "=".repeat(SEPARATOR_WIDTH));
            println!();

            let status = command
                .spawn()
                .map_err(|source| PipelineError::Launch {
                    program: program.clone(),
                    source,
                })?
                .wait()?;

            println!();
            println!("{}", "=".repeat(SEPARATOR_WIDTH));
            tracing::info!(%program, code = ?status.code(), "command finished");
        } else {
            // Fire and forget: stdout is captured, never displayed, and the
            // child may outlive the pipeline run.
            command.stdout(Stdio::piped());
            let child = command.spawn().map_err(|source| PipelineError::Launch {
                program: program.clone(),
                source,
            })?;
            tracing::info!(%program, pid = child.id(), "command launched without waiting");
            drop(child);
        }

        Ok(())
    }

    /// Stage-local override (joined to the base directory) wins; otherwise
    /// the `working` property must have been published by an earlier stage.
    fn resolve_working_dir(
        &self,
        ctx: &RunContext,
        props: &StageProperties,
    ) -> Result<PathBuf, PipelineError> {
        match &self.working_directory {
            Some(dir) => Ok(ctx.base_dir.join(dir)),
            None => props.require_working_dir().map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::{Duration, Instant};

    #[test]
    fn test_validate_has_no_rules() {
        let mut errors = Vec::new();
        CommandExecutionStage::default().validate(&mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_stage_local_working_directory_takes_precedence() {
        let stage = CommandExecutionStage {
            working_directory: Some("output".to_string()),
            ..Default::default()
        };
        let ctx = RunContext::new("/project");
        let mut props = StageProperties::new();
        props.working_dir = Some(PathBuf::from("/elsewhere"));

        let working = stage.resolve_working_dir(&ctx, &props).unwrap();
        assert_eq!(working, PathBuf::from("/project/output"));
    }

    #[test]
    fn test_missing_working_directory_is_a_configuration_error() {
        let stage = CommandExecutionStage::default();
        let ctx = RunContext::new("/project");
        let props = StageProperties::new();

        let err = stage.resolve_working_dir(&ctx, &props).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::PropertyMissing { key: "working" }
        ));
    }

    #[test]
    fn test_clear_working_directory_recreates_it_empty() {
        let base = tempfile::tempdir().unwrap();
        let working = base.path().join("out");
        fs::create_dir(&working).unwrap();
        fs::write(working.join("stale.o"), "x").unwrap();

        let stage = CommandExecutionStage {
            working_directory: Some("out".to_string()),
            clear_working_directory: true,
            wait_for_end: true,
            ..Default::default()
        };
        let ctx = RunContext::new(base.path());
        let mut props = StageProperties::new();
        props.command_file = Some("true".to_string());

        stage.execute(&ctx, &mut props).unwrap();
        assert!(working.exists());
        assert!(!working.join("stale.o").exists());
    }

    #[test]
    fn test_wait_for_end_runs_to_completion() {
        let base = tempfile::tempdir().unwrap();
        let stage = CommandExecutionStage {
            working_directory: Some("out".to_string()),
            wait_for_end: true,
            ..Default::default()
        };
        let ctx = RunContext::new(base.path());
        let mut props = StageProperties::new();
        props.command_file = Some("sh".to_string());
        props.command_args = Some("-c \"echo built > result.txt\"".to_string());

        stage.execute(&ctx, &mut props).unwrap();
        assert!(base.path().join("out/result.txt").exists());
    }

    #[test]
    fn test_fire_and_forget_returns_without_blocking() {
        let base = tempfile::tempdir().unwrap();
        let stage = CommandExecutionStage {
            working_directory: Some("out".to_string()),
            ..Default::default()
        };
        let ctx = RunContext::new(base.path());
        let mut props = StageProperties::new();
        props.command_file = Some("sleep".to_string());
        props.command_args = Some("30".to_string());

        let start = Instant::now();
        stage.execute(&ctx, &mut props).unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_environment_overrides_reach_the_child() {
        let base = tempfile::tempdir().unwrap();
        let stage = CommandExecutionStage {
            working_directory: Some("out".to_string()),
            wait_for_end: true,
            use_shell_execute: true,
            environment: Some(vec![KeyValue::new("CHIP", "pic16f628a")]),
            ..Default::default()
        };
        let ctx = RunContext::new(base.path());
        let mut props = StageProperties::new();
        props.command_file = Some("sh".to_string());
        props.command_args = Some("-c 'echo $CHIP > chip.txt'".to_string());

        stage.execute(&ctx, &mut props).unwrap();
        let chip = fs::read_to_string(base.path().join("out/chip.txt")).unwrap();
        assert_eq!(chip.trim(), "pic16f628a");
    }

    #[test]
    fn test_missing_command_file_is_property_missing() {
        let base = tempfile::tempdir().unwrap();
        let stage = CommandExecutionStage {
            working_directory: Some("out".to_string()),
            ..Default::default()
        };
        let ctx = RunContext::new(base.path());
        let mut props = StageProperties::new();

        let err = stage.execute(&ctx, &mut props).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::PropertyMissing { key: "cmdFile" }
        ));
    }

    #[test]
    fn test_deserializes_with_defaults() {
        let stage: CommandExecutionStage = serde_json::from_str("{}").unwrap();
        assert!(!stage.use_shell_execute);
        assert!(!stage.clear_working_directory);
        assert!(!stage.wait_for_end);
        assert!(stage.environment.is_none());
        assert!(stage.working_directory.is_none());
    }
}
