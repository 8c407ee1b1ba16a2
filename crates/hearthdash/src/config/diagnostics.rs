use std::collections::HashSet;
use std::ops::Range;
use std::path::PathBuf;

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error as ThisError;

/// Source information for where a diagnostic came from
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub file_path: PathBuf,
    pub content: String,
}

/// A diagnostic message that can be either a warning or an error
#[derive(Debug, Clone)]
pub enum Diagnostic {
    Warning(Warning),
    Error(Error),
}

/// Warnings don't prevent the config from loading
#[derive(Debug, Clone)]
pub enum Warning {
    EmptyConfig { file_path: PathBuf },
}

#[derive(Debug, Clone)]
pub enum Error {
    Merge(MergeError),
    Validation(ValidationError),
}

/// The same field was set by more than one file
#[derive(Debug, Clone)]
pub struct MergeError {
    pub field_path: String,
    pub message: String,
    pub conflicts: Vec<MergeConflictLocation>,
}

#[derive(Debug, Clone)]
pub struct MergeConflictLocation {
    pub file_path: PathBuf,
    pub span: Range<usize>,
    pub content: String,
}

/// A field is missing or holds an unusable value
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field_path: String,
    pub message: String,
    /// Where the offending value is, when it exists in some file
    pub span: Option<Range<usize>>,
    pub source: Option<SourceInfo>,
}

/// Failures that stop loading before any merging happens
#[derive(Debug, ThisError)]
pub enum LoadError {
    #[error("Failed to read '{}': {error}", path.display())]
    Io {
        path: PathBuf,
        error: std::io::Error,
    },
    #[error("Failed to parse '{}': {error}", path.display())]
    Parse {
        path: PathBuf,
        error: toml::de::Error,
    },
    #[error("Import cycle detected at '{}': involves {} file(s)", path.display(), cycle.len())]
    ImportCycle { path: PathBuf, cycle: Vec<PathBuf> },
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        matches!(self, Diagnostic::Error(_))
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Diagnostic::Warning(_))
    }
}

fn write_merge_error(merge_error: &MergeError, output: &mut Vec<u8>) {
    let Some(first_conflict) = merge_error.conflicts.first() else {
        let msg = format!(
            "Merge conflict in field '{}': {}\n",
            merge_error.field_path, merge_error.message
        );
        output.extend_from_slice(msg.as_bytes());
        return;
    };

    let mut report = Report::build(
        ReportKind::Error,
        (
            first_conflict.file_path.to_string_lossy().to_string(),
            first_conflict.span.clone(),
        ),
    )
    .with_message(format!("Merge conflict in field '{}'", merge_error.field_path))
    .with_note(&merge_error.message);

    for (idx, conflict) in merge_error.conflicts.iter().enumerate() {
        let label_msg = if idx == 0 {
            "first definition here"
        } else {
            "conflicts with this definition"
        };

        report = report.with_label(
            Label::new((
                conflict.file_path.to_string_lossy().to_string(),
                conflict.span.clone(),
            ))
            .with_message(label_msg)
            .with_color(if idx == 0 { Color::Red } else { Color::Yellow }),
        );
    }

    let finished_report = report.finish();

    // One write per distinct file, each with its own source text
    let mut written_files = HashSet::new();
    for conflict in &merge_error.conflicts {
        let file_id = conflict.file_path.to_string_lossy().to_string();
        if written_files.insert(file_id.clone()) {
            let source = Source::from(&conflict.content);
            finished_report.write((file_id, source), &mut *output).ok();
        }
    }
}

fn write_validation_error(error: &ValidationError, output: &mut Vec<u8>) {
    let (Some(span), Some(source)) = (&error.span, &error.source) else {
        let msg = format!(
            "Validation error in '{}': {}\n",
            error.field_path, error.message
        );
        output.extend_from_slice(msg.as_bytes());
        return;
    };

    let file_id = source.file_path.to_string_lossy().to_string();
    Report::build(ReportKind::Error, (file_id.clone(), span.clone()))
        .with_message(format!("Validation error in '{}'", error.field_path))
        .with_label(
            Label::new((file_id.clone(), span.clone()))
                .with_message(&error.message)
                .with_color(Color::Red),
        )
        .finish()
        .write((file_id, Source::from(&source.content)), &mut *output)
        .ok();
}

/// Render every diagnostic with ariadne, in order.
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let mut output = Vec::new();

    for diagnostic in diagnostics {
        match diagnostic {
            Diagnostic::Warning(Warning::EmptyConfig { file_path }) => {
                let msg = format!(
                    "Warning: Config file '{}' is empty and has no effect\n",
                    file_path.display()
                );
                output.extend_from_slice(msg.as_bytes());
            }
            Diagnostic::Error(Error::Merge(merge_error)) => {
                write_merge_error(merge_error, &mut output);
            }
            Diagnostic::Error(Error::Validation(validation_error)) => {
                write_validation_error(validation_error, &mut output);
            }
        }
    }

    String::from_utf8_lossy(&output).to_string()
}
