//! Ordered eligibility checks for a sample's input and output paths.
//!
//! The checklist short-circuits: the first failing check decides the outcome
//! and its message, regardless of what later checks would have reported.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inspect::is_pe_file;

/// Why a sample cannot be processed.
///
/// These are expected, non-fatal outcomes: batch callers report them and
/// move on to the next sample.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum ValidationFailure {
    #[error("File path does not exist: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("Path is a directory, not a file: {}", .0.display())]
    InputNotFile(PathBuf),

    #[error("Insufficient permission to access file: {}", .0.display())]
    InputUnreadable(PathBuf),

    #[error("File is not in Windows PE format: {}", .0.display())]
    InputNotPe(PathBuf),

    #[error("Specified output file exists as a directory: '{}'", .0.display())]
    OutputIsDirectory(PathBuf),

    #[error("Insufficient permission to overwrite existing file: '{}'", .0.display())]
    OutputNotWritable(PathBuf),

    #[error("The output file already exists and overwriting is disabled: '{}'", .0.display())]
    OutputExists(PathBuf),

    #[error("Insufficient permission to create output file in directory: '{}'", .0.display())]
    OutputDirNotWritable(PathBuf),
}

impl ValidationFailure {
    /// Short machine-friendly tag for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationFailure::InputMissing(_) => "input_missing",
            ValidationFailure::InputNotFile(_) => "input_not_file",
            ValidationFailure::InputUnreadable(_) => "input_unreadable",
            ValidationFailure::InputNotPe(_) => "input_not_pe",
            ValidationFailure::OutputIsDirectory(_) => "output_is_directory",
            ValidationFailure::OutputNotWritable(_) => "output_not_writable",
            ValidationFailure::OutputExists(_) => "output_exists",
            ValidationFailure::OutputDirNotWritable(_) => "output_dir_not_writable",
        }
    }

    /// The path the failed check was about.
    pub fn path(&self) -> &Path {
        match self {
            ValidationFailure::InputMissing(p)
            | ValidationFailure::InputNotFile(p)
            | ValidationFailure::InputUnreadable(p)
            | ValidationFailure::InputNotPe(p)
            | ValidationFailure::OutputIsDirectory(p)
            | ValidationFailure::OutputNotWritable(p)
            | ValidationFailure::OutputExists(p)
            | ValidationFailure::OutputDirNotWritable(p) => p,
        }
    }
}

/// Run the full checklist: input first, then output.
pub(crate) fn validate(
    input: &Path,
    output: &Path,
    allow_overwrite: bool,
) -> Result<(), ValidationFailure> {
    validate_input(input)?;
    validate_output(output, allow_overwrite)
}

fn validate_input(input: &Path) -> Result<(), ValidationFailure> {
    if !input.exists() {
        return Err(ValidationFailure::InputMissing(input.to_path_buf()));
    }
    if !input.is_file() {
        return Err(ValidationFailure::InputNotFile(input.to_path_buf()));
    }
    if File::open(input).is_err() {
        return Err(ValidationFailure::InputUnreadable(input.to_path_buf()));
    }
    if !is_pe_file(input) {
        return Err(ValidationFailure::InputNotPe(input.to_path_buf()));
    }
    Ok(())
}

fn validate_output(output: &Path, allow_overwrite: bool) -> Result<(), ValidationFailure> {
    if output.exists() {
        if !output.is_file() {
            return Err(ValidationFailure::OutputIsDirectory(output.to_path_buf()));
        }
        // Opening for write without truncation leaves the contents untouched.
        if OpenOptions::new().write(true).open(output).is_err() {
            return Err(ValidationFailure::OutputNotWritable(output.to_path_buf()));
        }
        if !allow_overwrite {
            return Err(ValidationFailure::OutputExists(output.to_path_buf()));
        }
        return Ok(());
    }

    let dir = output_parent(output);
    if !dir_accepts_new_files(&dir) {
        return Err(ValidationFailure::OutputDirNotWritable(dir));
    }
    Ok(())
}

/// Absolute parent directory of `output`; an empty parent is the current
/// working directory.
fn output_parent(output: &Path) -> PathBuf {
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::canonicalize(&parent).unwrap_or(parent)
}

/// Probe a directory by creating (and immediately dropping) a temp file in it.
fn dir_accepts_new_files(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }
    tempfile::Builder::new().prefix(".adv-probe-").tempfile_in(dir).is_ok()
}
