//! File-processing stage
//!
//! Selects a set of input files (explicit list or extension scan), renders a
//! toolchain argument string from per-category templates, copies the selected,
//! external and excluded files into the temp workspace, and publishes the
//! built command into the shared properties for a later execution stage.
//!
//! The three categories are independent: "excluded" files are copied into the
//! workspace but deliberately left out of the included placeholder list, and
//! "external" files are copied unconditionally regardless of the extension
//! scan.

use super::errors::{PipelineError, ValidationError};
use super::processor::RunContext;
use super::properties::StageProperties;
use super::tokens::{
    self, EXCLUDED_FILE_LIST_TOKEN, EXTERNAL_FILE_LIST_TOKEN, FILE_TOKEN,
    INCLUDED_FILE_LIST_TOKEN, RESERVED_TOKENS,
};
use super::KeyValue;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for a file-processing stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileProcessingStage {
    /// Explicit included set; wins over `included_file_types` when non-empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub included_files: Option<Vec<String>>,

    /// Extensions (without leading dot) to scan for when no explicit set is
    /// given. When set, it also filters every rendered category list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub included_file_types: Option<Vec<String>>,

    /// Copied into the workspace but left out of the included list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_files: Option<Vec<String>>,

    /// Copied unconditionally, independent of the extension scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_files: Option<Vec<String>>,

    /// Ordered user substitutions applied to the master template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_values: Option<Vec<KeyValue>>,

    /// Per-item template for the included list; must contain `{File}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub included_file_format: Option<String>,
    /// Trailing characters stripped from the concatenated included list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub included_file_termination_trim: Option<usize>,
    /// Text appended to the included list after trimming.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub included_file_termination: Option<String>,

    /// Per-item template for the excluded list; must contain `{File}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_file_format: Option<String>,
    /// Trailing characters stripped from the concatenated excluded list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_file_termination_trim: Option<usize>,
    /// Text appended to the excluded list after trimming.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_file_termination: Option<String>,

    /// Per-item template for the external list; must contain `{File}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_file_format: Option<String>,
    /// Trailing characters stripped from the concatenated external list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_file_termination_trim: Option<usize>,
    /// Text appended to the external list after trimming.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_file_termination: Option<String>,

    /// Master template the category lists are substituted into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_arguments_format: Option<String>,

    /// Template for the toolchain executable path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    /// Scan subdirectory, relative to the base directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<String>,
}

/// One category's template triple, borrowed from the stage configuration.
struct ListFormat<'a> {
    format: &'a str,
    termination_trim: usize,
    termination: &'a str,
}

impl FileProcessingStage {
    /// Appends every configuration problem to `errors` without
    /// short-circuiting; callers must see all problems in one pass.
    pub fn validate(&self, errors: &mut Vec<ValidationError>) {
        if is_blank(self.file_name.as_deref()) {
            errors.push(ValidationError::MissingFileName);
        }

        if self.included_files.is_none() && self.included_file_types.is_none() {
            errors.push(ValidationError::MissingSelection);
        } else {
            // The extension set stands in for the item list when no explicit
            // set is given: a non-empty scan request needs the same templates.
            let selection = self
                .included_files
                .as_deref()
                .filter(|f| !f.is_empty())
                .or(self.included_file_types.as_deref());
            self.check_category(
                errors,
                selection,
                self.included_file_format.as_deref(),
                "includedFiles",
                "includedFileFormat",
                INCLUDED_FILE_LIST_TOKEN,
            );
        }

        self.check_category(
            errors,
            self.excluded_files.as_deref(),
            self.excluded_file_format.as_deref(),
            "excludedFiles",
            "excludedFileFormat",
            EXCLUDED_FILE_LIST_TOKEN,
        );
        self.check_category(
            errors,
            self.external_files.as_deref(),
            self.external_file_format.as_deref(),
            "externalFiles",
            "externalFileFormat",
            EXTERNAL_FILE_LIST_TOKEN,
        );

        self.check_command_values(errors);
    }

    fn check_category(
        &self,
        errors: &mut Vec<ValidationError>,
        items: Option<&[String]>,
        format: Option<&str>,
        category: &'static str,
        format_field: &'static str,
        list_token: &'static str,
    ) {
        let Some(items) = items else { return };
        if items.is_empty() {
            return;
        }

        let master = self.command_arguments_format.as_deref();
        if is_blank(master) {
            errors.push(ValidationError::MissingArgumentsFormat { category });
            return;
        }
        let Some(format) = format.filter(|f| !f.trim().is_empty()) else {
            errors.push(ValidationError::MissingCategoryFormat {
                category,
                format_field,
            });
            return;
        };

        if !format.contains(FILE_TOKEN) {
            errors.push(ValidationError::FormatMissingFileToken {
                format_field,
                format: format.to_string(),
                token: FILE_TOKEN,
            });
        } else if !master.unwrap_or_default().contains(list_token) {
            errors.push(ValidationError::ArgumentsFormatMissingListToken {
                category,
                token: list_token,
            });
        }
    }

    fn check_command_values(&self, errors: &mut Vec<ValidationError>) {
        let Some(values) = &self.command_values else {
            return;
        };
        let master = self.command_arguments_format.as_deref();
        if is_blank(master) {
            errors.push(ValidationError::MissingArgumentsFormat {
                category: "commandValues",
            });
            return;
        }
        let master = master.unwrap_or_default();

        let mut seen: Vec<&str> = Vec::new();
        for kv in values {
            if seen.contains(&kv.key.as_str()) {
                errors.push(ValidationError::DuplicateCommandValue {
                    key: kv.key.clone(),
                });
                continue;
            }
            seen.push(&kv.key);

            if !(kv.key.starts_with('{') && kv.key.ends_with('}')) {
                errors.push(ValidationError::CommandValueNotBraced {
                    key: kv.key.clone(),
                });
            }
            if !master.contains(&kv.key) {
                errors.push(ValidationError::CommandValueNotInFormat {
                    key: kv.key.clone(),
                });
            }

            for token in RESERVED_TOKENS {
                if kv.key.contains(token) {
                    errors.push(ValidationError::ReservedTokenCollision {
                        key: kv.key.clone(),
                        part: "key",
                        token,
                    });
                }
                if kv.value.contains(token) {
                    errors.push(ValidationError::ReservedTokenCollision {
                        key: kv.key.clone(),
                        part: "value",
                        token,
                    });
                }
            }
        }
    }

    /// Builds the command, stages every category into the workspace and
    /// publishes `cmdArgs`/`cmdFile` for a later execution stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] on filesystem failure or when the workspace
    /// has not been created.
    pub fn execute(
        &self,
        ctx: &RunContext,
        props: &mut StageProperties,
    ) -> Result<(), PipelineError> {
        let temp = props.require_temp_dir()?.to_path_buf();

        tracing::info!("building command");
        let (command, included) = self.build_command(ctx)?;
        tracing::debug!(args = %command, "command assembled");

        props.command_args = Some(command);
        props.command_file = Some(tokens::substitute_environment(
            self.file_name.as_deref().unwrap_or_default(),
        ));

        tracing::info!(workspace = %temp.display(), "copying files into workspace");
        for entry in &included {
            self.stage_file(ctx, &temp, entry)?;
        }
        for entry in self.external_files.as_deref().unwrap_or_default() {
            self.stage_file(ctx, &temp, entry)?;
        }
        for entry in self.excluded_files.as_deref().unwrap_or_default() {
            self.stage_file(ctx, &temp, entry)?;
        }
        tracing::info!("files copied");

        Ok(())
    }

    /// Renders the master template and returns it together with the
    /// included set that was selected for it.
    fn build_command(&self, ctx: &RunContext) -> Result<(String, Vec<String>), PipelineError> {
        let mut command = self.command_arguments_format.clone().unwrap_or_default();

        let included = self.select_included(ctx)?;
        command = self.build_list(
            &command,
            &included,
            &ListFormat {
                format: self.included_file_format.as_deref().unwrap_or_default(),
                termination_trim: self.included_file_termination_trim.unwrap_or(0),
                termination: self.included_file_termination.as_deref().unwrap_or_default(),
            },
            INCLUDED_FILE_LIST_TOKEN,
        );

        if let Some(excluded) = self.excluded_files.as_deref().filter(|f| !f.is_empty()) {
            command = self.build_list(
                &command,
                excluded,
                &ListFormat {
                    format: self.excluded_file_format.as_deref().unwrap_or_default(),
                    termination_trim: self.excluded_file_termination_trim.unwrap_or(0),
                    termination: self.excluded_file_termination.as_deref().unwrap_or_default(),
                },
                EXCLUDED_FILE_LIST_TOKEN,
            );
        }

        if let Some(external) = self.external_files.as_deref().filter(|f| !f.is_empty()) {
            command = self.build_list(
                &command,
                external,
                &ListFormat {
                    format: self.external_file_format.as_deref().unwrap_or_default(),
                    termination_trim: self.external_file_termination_trim.unwrap_or(0),
                    termination: self.external_file_termination.as_deref().unwrap_or_default(),
                },
                EXTERNAL_FILE_LIST_TOKEN,
            );
        }

        if let Some(values) = &self.command_values {
            for kv in values {
                command = command.replace(&kv.key, &kv.value);
            }
        }

        Ok((tokens::substitute_environment(&command), included))
    }

    /// Resolves the included set: an explicit non-empty list wins; otherwise
    /// the scan directory is searched non-recursively for each extension.
    fn select_included(&self, ctx: &RunContext) -> Result<Vec<String>, PipelineError> {
        if let Some(files) = self.included_files.as_deref() {
            if !files.is_empty() {
                return Ok(files.to_vec());
            }
        }

        let mut selected = Vec::new();
        let Some(types) = self.included_file_types.as_deref() else {
            return Ok(selected);
        };

        let scan_dir = ctx.base_dir.join(self.files.as_deref().unwrap_or(""));
        for ext in types {
            let mut matches: Vec<PathBuf> = Vec::new();
            for entry in fs::read_dir(&scan_dir)? {
                let path = entry?.path();
                if !path.is_file() || ctx.is_scan_excluded(&path) {
                    continue;
                }
                if path.extension().and_then(|e| e.to_str()) == Some(ext.as_str()) {
                    matches.push(path);
                }
            }
            // Directory iteration order is platform-dependent; sort for a
            // deterministic command string across runs.
            matches.sort();
            for path in matches {
                let path = path.to_string_lossy().into_owned();
                if !selected.contains(&path) {
                    selected.push(path);
                }
            }
        }
        Ok(selected)
    }

    /// Renders one category's item list and substitutes it at `list_token`
    /// in `command`.
    ///
    /// When `included_file_types` is set, items whose extension is not in
    /// the set are silently dropped from every category list, including an
    /// explicit included list that contains foreign extensions.
    fn build_list(
        &self,
        command: &str,
        items: &[String],
        list_format: &ListFormat<'_>,
        list_token: &str,
    ) -> String {
        let mut list = String::new();
        for item in items {
            if let Some(types) = self.included_file_types.as_deref() {
                let ext = Path::new(item).extension().and_then(|e| e.to_str());
                if !ext.is_some_and(|e| types.iter().any(|t| t == e)) {
                    continue;
                }
            }

            let name = file_name_of(item);
            let rendered = tokens::substitute(list_format.format, &[(FILE_TOKEN, name.as_str())]);
            list.push('"');
            list.push_str(&rendered);
            list.push_str("\" ");
        }

        list.truncate(list.len().saturating_sub(list_format.termination_trim));
        list.push_str(list_format.termination);

        tokens::substitute(command, &[(list_token, list.as_str())])
    }

    /// Copies one source entry into the workspace under its base file name,
    /// overwriting an existing destination. Same-named files from different
    /// source directories are not detected; the later copy wins.
    fn stage_file(&self, ctx: &RunContext, temp: &Path, entry: &str) -> Result<(), PipelineError> {
        let source = tokens::substitute_environment(entry);
        let source = ctx.resolve(Path::new(&source));
        let Some(name) = source.file_name() else {
            return Ok(());
        };
        let dest = temp.join(name);
        tracing::debug!(source = %source.display(), dest = %dest.display(), "copying");
        fs::copy(&source, &dest)?;
        Ok(())
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Base file name of a config entry, with the path stripped.
fn file_name_of(entry: &str) -> String {
    Path::new(entry)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| entry.to_string())
}
