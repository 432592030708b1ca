//! Sample record: one input binary's configuration, validation verdict and
//! lifecycle (`read` → external transform/scoring → `write` → `free`).
//!
//! A record is an owned, single-threaded value. Pipeline stages take it by
//! `&mut` (or by value when moving it to a worker); it carries no locking.
//! The optimizer, classifier and persistence collaborators communicate
//! through the public snapshot and result fields.

use std::ffi::{OsStr, OsString};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inspect::{code_section_hash, hash_bytes, InspectError};

mod options;
mod validate;

pub use options::{ClassLabels, InitializationMethod, SampleOptions};
pub use validate::ValidationFailure;

/// Marker inserted between the file stem and its suffixes.
pub const ADV_MARKER: &str = ".adv";

/// Errors from the record's I/O operations.
///
/// `NotValid` and `NoOutputBuffer` are precondition violations: they signal a
/// caller bug rather than bad input data.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("sample did not pass validation and cannot be read: {}", .0.display())]
    NotValid(PathBuf),

    #[error("no output buffer assigned for {}", .0.display())]
    NoOutputBuffer(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input passed the PE check but deeper parsing failed.
    #[error("{}: {source}", path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: InspectError,
    },
}

impl SampleError {
    /// True for errors caused by the binary itself rather than the caller.
    pub fn is_malformed_binary(&self) -> bool {
        matches!(self, SampleError::Inspect { .. })
    }
}

/// Convenience result type for sample operations.
pub type SampleResult<T> = Result<T, SampleError>;

/// Loaded state of the original file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSnapshot {
    /// Raw bytes; `None` before `read` and after `free`.
    pub bytes: Option<Vec<u8>>,
    pub len: usize,
    pub hash: Option<String>,
    pub code_hash: Option<String>,
    pub code_section_name: Option<String>,
    /// Classifier score for the input.
    pub score: f64,
}

/// State of the adversarial candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputSnapshot {
    /// Candidate bytes; `None` until assigned and after `free`.
    pub bytes: Option<Vec<u8>>,
    pub len: usize,
    pub hash: Option<String>,
    pub code_hash: Option<String>,
    /// Classifier score for the candidate.
    pub score: f64,
}

/// Results recorded by the optimizer and scoring collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackResults {
    /// Score from the independent predetection model.
    pub predetection_score: f64,
    pub processable: bool,
    pub success: bool,
    pub evades_predetection: bool,
    /// 256-bin histogram of the injected payload.
    pub payload_byte_distribution: Option<Vec<u64>>,
    pub iterations: u32,
    pub duration: Duration,
    pub reconstruction_duration: Duration,
}

impl Default for AttackResults {
    fn default() -> Self {
        Self {
            predetection_score: 0.0,
            processable: true,
            success: false,
            evades_predetection: false,
            payload_byte_distribution: None,
            iterations: 0,
            duration: Duration::ZERO,
            reconstruction_duration: Duration::ZERO,
        }
    }
}

/// Every non-buffer field of a record, for persistence and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub filename: PathBuf,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub input_benign: bool,
    pub target: u32,
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ValidationFailure>,
    pub options: SampleOptions,
    pub db_orig_file_id: Option<i64>,
    pub db_adv_file_id: Option<i64>,
    pub attack_config_id: Option<i64>,
    pub input_len: usize,
    pub input_hash: Option<String>,
    pub input_code_hash: Option<String>,
    pub code_section_name: Option<String>,
    pub input_score: f64,
    pub output_len: usize,
    pub output_hash: Option<String>,
    pub output_code_hash: Option<String>,
    pub output_score: f64,
    pub results: AttackResults,
}

/// One input file moving through the adversarial pipeline.
#[derive(Debug, Clone)]
pub struct SampleRecord {
    filename: OsString,
    input_path: PathBuf,
    output_path: PathBuf,
    options: SampleOptions,
    target: u32,
    failure: Option<ValidationFailure>,

    /// Verdict of the construction-time checklist. Not re-evaluated.
    pub valid: bool,

    /// Record ids owned by the persistence collaborator.
    pub db_orig_file_id: Option<i64>,
    pub db_adv_file_id: Option<i64>,
    pub attack_config_id: Option<i64>,

    pub input: InputSnapshot,
    pub output: OutputSnapshot,
    pub results: AttackResults,
}

/// Derive the adversarial output path: `output_dir/<stem>.adv<suffixes>`.
///
/// The stem ends at the first `.` that is not the leading character of the
/// file name, so every suffix is kept (`a.tar.gz` -> `a.adv.tar.gz`). The
/// name is handled as raw bytes, so non-UTF-8 names map one-to-one.
pub fn adversarial_output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let file_name = input.file_name().unwrap_or_default();
    output_dir.join(adversarial_file_name(file_name))
}

/// Length of the stem: up to the first `.` after index 0.
fn stem_len(name: &[u8]) -> usize {
    name.iter().skip(1).position(|b| *b == b'.').map_or(name.len(), |i| i + 1)
}

#[cfg(unix)]
fn adversarial_file_name(file_name: &OsStr) -> OsString {
    use std::os::unix::ffi::OsStrExt;

    let bytes = file_name.as_bytes();
    let (stem, suffixes) = bytes.split_at(stem_len(bytes));
    let mut name = OsStr::from_bytes(stem).to_os_string();
    name.push(ADV_MARKER);
    name.push(OsStr::from_bytes(suffixes));
    name
}

#[cfg(not(unix))]
fn adversarial_file_name(file_name: &OsStr) -> OsString {
    let file_name = file_name.to_string_lossy();
    let (stem, suffixes) = file_name.split_at(stem_len(file_name.as_bytes()));
    let mut name = OsString::from(stem);
    name.push(ADV_MARKER);
    name.push(suffixes);
    name
}

impl SampleRecord {
    /// Build a record and run the validation checklist immediately.
    ///
    /// Never fails: an ineligible sample comes back with `valid == false` and
    /// the first failing check available via [`SampleRecord::failure`].
    pub fn new(path: impl AsRef<Path>, options: SampleOptions, labels: ClassLabels) -> Self {
        let input_path = path.as_ref().to_path_buf();
        let filename = input_path.file_name().unwrap_or_default().to_os_string();
        let output_path = adversarial_output_path(&input_path, &options.output_dir);
        let target = labels.target_for(options.benign);

        let failure =
            validate::validate(&input_path, &output_path, options.allow_overwrite).err();
        if let Some(failure) = &failure {
            log::warn!("{failure}");
        }

        Self {
            filename,
            input_path,
            output_path,
            options,
            target,
            valid: failure.is_none(),
            failure,
            db_orig_file_id: None,
            db_adv_file_id: None,
            attack_config_id: None,
            input: InputSnapshot::default(),
            output: OutputSnapshot::default(),
            results: AttackResults::default(),
        }
    }

    pub fn filename(&self) -> &OsStr {
        &self.filename
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn options(&self) -> &SampleOptions {
        &self.options
    }

    pub fn input_benign(&self) -> bool {
        self.options.benign
    }

    pub fn allow_overwrite(&self) -> bool {
        self.options.allow_overwrite
    }

    pub fn payload_size(&self) -> usize {
        self.options.payload_size
    }

    pub fn max_iterations(&self) -> u32 {
        self.options.max_iterations
    }

    pub fn initialization_method(&self) -> InitializationMethod {
        self.options.initialization_method
    }

    pub fn epsilon(&self) -> f64 {
        self.options.epsilon
    }

    /// Label the optimizer should push the classifier towards.
    pub fn target(&self) -> u32 {
        self.target
    }

    /// First failed validation check, if any.
    pub fn failure(&self) -> Option<&ValidationFailure> {
        self.failure.as_ref()
    }

    /// Load the input file and compute its fingerprints.
    pub fn read(&mut self) -> SampleResult<()> {
        if !self.valid {
            return Err(SampleError::NotValid(self.input_path.clone()));
        }

        let bytes = fs::read(&self.input_path)
            .map_err(|source| SampleError::Io { path: self.input_path.clone(), source })?;
        let (code_hash, section_name) = code_section_hash(&bytes).map_err(|source| {
            log::warn!("{}: {source}", self.input_path.display());
            SampleError::Inspect { path: self.input_path.clone(), source }
        })?;

        self.input.len = bytes.len();
        self.input.hash = Some(hash_bytes(&bytes));
        self.input.code_hash = Some(code_hash);
        self.input.code_section_name = Some(section_name);
        self.input.bytes = Some(bytes);
        log::debug!("read {} ({} bytes)", self.input_path.display(), self.input.len);
        Ok(())
    }

    /// Assign the candidate buffer produced by the transformation stage.
    pub fn set_output(&mut self, bytes: Vec<u8>) {
        self.output.len = bytes.len();
        self.output.bytes = Some(bytes);
    }

    /// Compute whole-file and code-section hashes of the assigned candidate.
    pub fn fingerprint_output(&mut self) -> SampleResult<()> {
        let Some(bytes) = self.output.bytes.as_deref() else {
            return Err(SampleError::NoOutputBuffer(self.output_path.clone()));
        };
        let (code_hash, _) = code_section_hash(bytes)
            .map_err(|source| SampleError::Inspect { path: self.output_path.clone(), source })?;
        self.output.hash = Some(hash_bytes(bytes));
        self.output.code_hash = Some(code_hash);
        Ok(())
    }

    /// True when the candidate's code section hashes the same as the input's.
    ///
    /// `None` until both code hashes are known.
    pub fn code_preserved(&self) -> Option<bool> {
        match (&self.input.code_hash, &self.output.code_hash) {
            (Some(a), Some(b)) => Some(a == b),
            _ => None,
        }
    }

    /// Persist the candidate buffer to the output path.
    ///
    /// With overwriting disabled the file must not exist at write time either:
    /// a file created there after validation is left alone and reported as an
    /// `AlreadyExists` I/O error.
    pub fn write(&self) -> SampleResult<()> {
        let Some(bytes) = self.output.bytes.as_deref() else {
            return Err(SampleError::NoOutputBuffer(self.output_path.clone()));
        };
        let io_err = |source| SampleError::Io { path: self.output_path.clone(), source };

        let mut file = if self.options.allow_overwrite {
            File::create(&self.output_path)
        } else {
            OpenOptions::new().write(true).create_new(true).open(&self.output_path)
        }
        .map_err(io_err)?;
        file.write_all(bytes).map_err(io_err)?;
        log::debug!("wrote {} ({} bytes)", self.output_path.display(), bytes.len());
        Ok(())
    }

    /// Drop both byte buffers, keeping every other field. Idempotent.
    pub fn free(&mut self) {
        self.input.bytes = None;
        self.output.bytes = None;
        log::debug!("freed buffers for {}", self.input_path.display());
    }

    /// Snapshot of all metadata and results, without buffers.
    pub fn summary(&self) -> SampleSummary {
        SampleSummary {
            filename: PathBuf::from(&self.filename),
            input_path: self.input_path.clone(),
            output_path: self.output_path.clone(),
            input_benign: self.options.benign,
            target: self.target,
            valid: self.valid,
            failure: self.failure.clone(),
            options: self.options.clone(),
            db_orig_file_id: self.db_orig_file_id,
            db_adv_file_id: self.db_adv_file_id,
            attack_config_id: self.attack_config_id,
            input_len: self.input.len,
            input_hash: self.input.hash.clone(),
            input_code_hash: self.input.code_hash.clone(),
            code_section_name: self.input.code_section_name.clone(),
            input_score: self.input.score,
            output_len: self.output.len,
            output_hash: self.output.hash.clone(),
            output_code_hash: self.output.code_hash.clone(),
            output_score: self.output.score,
            results: self.results.clone(),
        }
    }
}
