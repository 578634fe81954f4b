//! Two-phase stage orchestration
//!
//! The processor owns an ordered, immutable stage list and runs it in two
//! strictly separated phases: validate everything, then execute everything.
//! No stage executes if any stage fails validation. The temp workspace is
//! created only once validation has passed and is removed on every exit path
//! of the execute phase.

use super::errors::PipelineError;
use super::properties::StageProperties;
use super::stage::Stage;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File name of the pipeline's own configuration document, excluded from
/// extension scans.
pub const CONFIG_FILE_NAME: &str = "picstage_config.json";

/// Per-run execution context shared by every stage
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Base directory all relative paths resolve against.
    pub base_dir: PathBuf,

    /// The running executable, excluded from extension scans.
    pub current_exe: Option<PathBuf>,
}

impl RunContext {
    /// Creates a context rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            current_exe: env::current_exe().ok(),
        }
    }

    /// Resolves a possibly-relative path against the base directory.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Extension scans must never pick up the pipeline's own configuration
    /// file or the running executable.
    #[must_use]
    pub fn is_scan_excluded(&self, path: &Path) -> bool {
        let own_config = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.eq_ignore_ascii_case(CONFIG_FILE_NAME));
        let own_exe = self.current_exe.as_deref() == Some(path);
        own_config || own_exe
    }
}

/// Orchestrates the two-phase run over an ordered stage list
#[derive(Debug)]
pub struct StageProcessor {
    stages: Vec<Stage>,
}

impl StageProcessor {
    /// Creates a processor over an ordered stage list.
    #[must_use]
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// The ordered stage list.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Runs the full pipeline rooted at `base_dir`.
    ///
    /// Validation is all-or-nothing across the whole pipeline: every stage is
    /// checked before any stage executes, and the first stage with a
    /// non-empty error collector aborts the run with the full list of its
    /// problems. The temp workspace is created after validation and removed
    /// regardless of the execute phase's outcome.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StageValidation`] for the first failing
    /// stage, or the first execution-phase error.
    pub fn run(&self, base_dir: impl Into<PathBuf>) -> Result<(), PipelineError> {
        let ctx = RunContext::new(base_dir);

        tracing::info!("validating stages");
        for stage in &self.stages {
            tracing::info!(stage = %stage.label(), "validating");
            let mut errors = Vec::new();
            stage.validate(&mut errors);
            if !errors.is_empty() {
                return Err(PipelineError::StageValidation {
                    stage: stage.label(),
                    errors,
                });
            }
        }

        let temp = create_workspace()?;
        let mut props = StageProperties::new();
        props.temp_dir = Some(temp.clone());

        let result = self.execute_all(&ctx, &mut props);

        tracing::info!(workspace = %temp.display(), "cleaning up");
        if let Err(err) = fs::remove_dir_all(&temp) {
            // The run's outcome matters more than the cleanup's.
            tracing::warn!(workspace = %temp.display(), error = %err, "workspace cleanup failed");
        }

        result
    }

    fn execute_all(
        &self,
        ctx: &RunContext,
        props: &mut StageProperties,
    ) -> Result<(), PipelineError> {
        tracing::info!("commencing stages");
        for stage in &self.stages {
            tracing::info!(stage = %stage.label(), "commencing");
            stage.execute(ctx, props)?;
        }
        Ok(())
    }
}

/// Creates a uniquely named workspace under the OS temp root.
fn create_workspace() -> Result<PathBuf, PipelineError> {
    let temp = env::temp_dir().join(format!("{{{}-{}}}", Uuid::new_v4(), Uuid::new_v4()));
    fs::create_dir_all(&temp)?;
    Ok(temp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::command_execution::CommandExecutionStage;
    use crate::pipeline::file_processing::FileProcessingStage;
    use crate::pipeline::stage::StageKind;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    // Tests observing the shared OS temp root must not interleave.
    static WORKSPACE_LOCK: Mutex<()> = Mutex::new(());

    fn file_stage(config: FileProcessingStage) -> Stage {
        Stage {
            name: None,
            kind: StageKind::FileProcessing(config),
        }
    }

    fn command_stage(config: CommandExecutionStage) -> Stage {
        Stage {
            name: Some("run".to_string()),
            kind: StageKind::CommandExecution(config),
        }
    }

    #[test]
    fn test_empty_pipeline_runs_clean() {
        let _guard = WORKSPACE_LOCK.lock().unwrap();
        let processor = StageProcessor::new(Vec::new());
        processor.run(std::env::temp_dir()).unwrap();
    }

    #[test]
    fn test_validation_failure_aborts_before_any_execution() {
        let _guard = WORKSPACE_LOCK.lock().unwrap();
        let base = tempfile::tempdir().unwrap();
        // First stage is valid and would copy a file; second is invalid.
        std::fs::write(base.path().join("a.c"), "a").unwrap();
        let valid = file_stage(FileProcessingStage {
            file_name: Some("xc8".to_string()),
            included_files: Some(vec!["a.c".to_string()]),
            included_file_format: Some("{File}".to_string()),
            command_arguments_format: Some("{IncludedFileList}".to_string()),
            ..Default::default()
        });
        let invalid = file_stage(FileProcessingStage::default());

        let processor = StageProcessor::new(vec![valid, invalid]);
        let before = workspace_entries();
        let err = processor.run(base.path()).unwrap_err();
        // Validation precedes workspace creation, so there is nothing to
        // create or clean.
        assert_eq!(workspace_entries(), before);

        match err {
            PipelineError::StageValidation { stage, errors } => {
                assert_eq!(stage, "FileProcessingStage");
                assert!(errors.len() >= 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_workspace_removed_after_successful_run() {
        let _guard = WORKSPACE_LOCK.lock().unwrap();
        let base = tempfile::tempdir().unwrap();
        std::fs::write(base.path().join("a.c"), "a").unwrap();

        let stage = file_stage(FileProcessingStage {
            file_name: Some("xc8".to_string()),
            included_files: Some(vec!["a.c".to_string()]),
            included_file_format: Some("{File}".to_string()),
            command_arguments_format: Some("{IncludedFileList}".to_string()),
            ..Default::default()
        });
        let processor = StageProcessor::new(vec![stage]);

        let before = workspace_entries();
        processor.run(base.path()).unwrap();
        assert_eq!(workspace_entries(), before);
    }

    #[test]
    fn test_workspace_removed_after_execution_failure() {
        let _guard = WORKSPACE_LOCK.lock().unwrap();
        let base = tempfile::tempdir().unwrap();
        // Valid configuration, but the source file does not exist.
        let stage = file_stage(FileProcessingStage {
            file_name: Some("xc8".to_string()),
            included_files: Some(vec!["missing.c".to_string()]),
            included_file_format: Some("{File}".to_string()),
            command_arguments_format: Some("{IncludedFileList}".to_string()),
            ..Default::default()
        });
        let processor = StageProcessor::new(vec![stage]);

        let before = workspace_entries();
        let err = processor.run(base.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
        assert_eq!(workspace_entries(), before);
    }

    #[test]
    fn test_execution_failure_aborts_remaining_stages() {
        let _guard = WORKSPACE_LOCK.lock().unwrap();
        let base = tempfile::tempdir().unwrap();
        let failing = command_stage(CommandExecutionStage {
            // No stage-local directory and no published `working` property.
            ..Default::default()
        });
        let never_reached = command_stage(CommandExecutionStage {
            working_directory: Some("out".to_string()),
            wait_for_end: true,
            ..Default::default()
        });

        let processor = StageProcessor::new(vec![failing, never_reached]);
        let err = processor.run(base.path()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::PropertyMissing { key: "working" }
        ));
        assert!(!base.path().join("out").exists());
    }

    #[test]
    fn test_properties_flow_between_stages() {
        let _guard = WORKSPACE_LOCK.lock().unwrap();
        let base = tempfile::tempdir().unwrap();
        std::fs::write(base.path().join("blink.asm"), "nop").unwrap();

        let build = file_stage(FileProcessingStage {
            file_name: Some("sh".to_string()),
            included_files: Some(vec!["blink.asm".to_string()]),
            included_file_format: Some("{File}".to_string()),
            included_file_termination_trim: Some(1),
            command_arguments_format: Some("-c 'echo {IncludedFileList} > cmd.txt'".to_string()),
            ..Default::default()
        });
        let run = command_stage(CommandExecutionStage {
            working_directory: Some("out".to_string()),
            wait_for_end: true,
            ..Default::default()
        });

        let processor = StageProcessor::new(vec![build, run]);
        processor.run(base.path()).unwrap();

        let recorded = std::fs::read_to_string(base.path().join("out/cmd.txt")).unwrap();
        // The inner double quotes are consumed by the shell.
        assert_eq!(recorded.trim(), "blink.asm");
    }

    fn workspace_entries() -> usize {
        std::fs::read_dir(std::env::temp_dir())
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.file_name().to_string_lossy().starts_with('{'))
                    .count()
            })
            .unwrap_or(0)
    }
}
