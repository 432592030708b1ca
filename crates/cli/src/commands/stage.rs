use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use sample_core::sample::{SampleError, SampleSummary};
use sample_core::SampleRecord;
use serde::Serialize;

use crate::commands::AttackConfig;

/// What happened to one sample during `stage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// Read, copied to the output path, and freed.
    Staged,
    /// Failed validation; never read.
    Skipped,
    /// Passed validation but failed while reading, fingerprinting or writing.
    Failed,
}

impl StageOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            StageOutcome::Staged => "STAGED",
            StageOutcome::Skipped => "SKIP",
            StageOutcome::Failed => "FAIL",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageEntry {
    pub outcome: StageOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub sample: SampleSummary,
}

impl StageEntry {
    pub fn line(&self) -> String {
        let input = self.sample.input_path.display();
        match (&self.outcome, &self.message) {
            (StageOutcome::Staged, _) => format!(
                "STAGED {} -> {} ({} bytes, code section {})",
                input,
                self.sample.output_path.display(),
                self.sample.output_len,
                self.sample.code_section_name.as_deref().unwrap_or("-")
            ),
            (outcome, Some(message)) => format!("{} {}: {}", outcome.as_str(), input, message),
            (outcome, None) => format!("{} {}", outcome.as_str(), input),
        }
    }
}

/// JSON shape emitted by `stage --json`.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub generated_at: String,
    pub samples: Vec<StageEntry>,
}

fn run_pipeline(record: &mut SampleRecord) -> Result<(), SampleError> {
    record.read()?;
    let copy = record.input.bytes.clone().unwrap_or_default();
    record.set_output(copy);
    record.fingerprint_output()?;
    record.write()
}

/// Push one sample through read → identity transform → write → free.
///
/// Errors are captured in the returned entry so the batch keeps going.
pub fn stage_sample(path: &Path, config: &AttackConfig) -> StageEntry {
    let mut record = SampleRecord::new(path, config.options.clone(), config.labels);
    if !record.valid {
        let message = record.failure().map(|f| f.to_string());
        return StageEntry { outcome: StageOutcome::Skipped, message, sample: record.summary() };
    }

    let started = Instant::now();
    let result = run_pipeline(&mut record);
    record.results.duration = started.elapsed();
    record.free();

    let (outcome, message) = match result {
        Ok(()) => (StageOutcome::Staged, None),
        Err(err) => {
            record.results.processable = false;
            let message = if err.is_malformed_binary() {
                format!("parser limitation: {err}")
            } else {
                err.to_string()
            };
            log::warn!("{message}");
            (StageOutcome::Failed, Some(message))
        }
    };
    StageEntry { outcome, message, sample: record.summary() }
}

/// Stage every path in order; a failing sample never stops the batch.
pub fn stage_samples(paths: &[PathBuf], config: &AttackConfig) -> Vec<StageEntry> {
    paths.iter().map(|p| stage_sample(p, config)).collect()
}

pub fn stage_command(paths: &[PathBuf], config: &AttackConfig, json: bool) -> Result<()> {
    let entries = stage_samples(paths, config);

    if json {
        let report = StageReport { generated_at: Utc::now().to_rfc3339(), samples: entries };
        let serialized = serde_json::to_string_pretty(&report)
            .context("Failed to serialize stage report to JSON")?;
        println!("{}", serialized);
        return Ok(());
    }

    for entry in &entries {
        println!("{}", entry.line());
    }
    let staged = entries.iter().filter(|e| e.outcome == StageOutcome::Staged).count();
    println!("Staged {} of {} sample(s)", staged, entries.len());

    Ok(())
}
