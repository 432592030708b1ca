use std::path::PathBuf;

use anyhow::{Context, Result};
use sample_core::SampleRecord;
use serde::Serialize;

use crate::commands::AttackConfig;

/// Validation verdict for one input path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckEntry {
    pub input: PathBuf,
    pub output: PathBuf,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CheckEntry {
    pub fn from_record(record: &SampleRecord) -> Self {
        Self {
            input: record.input_path().to_path_buf(),
            output: record.output_path().to_path_buf(),
            valid: record.valid,
            kind: record.failure().map(|f| f.kind().to_string()),
            reason: record.failure().map(|f| f.to_string()),
        }
    }

    /// One report line: `OK <input> -> <output>` or `SKIP <input>: <reason>`.
    pub fn line(&self) -> String {
        match &self.reason {
            None => format!("OK {} -> {}", self.input.display(), self.output.display()),
            Some(reason) => format!("SKIP {}: {}", self.input.display(), reason),
        }
    }
}

/// Build (and thereby validate) a record for every path.
pub fn check_samples(paths: &[PathBuf], config: &AttackConfig) -> Vec<CheckEntry> {
    paths
        .iter()
        .map(|p| SampleRecord::new(p, config.options.clone(), config.labels))
        .map(|record| CheckEntry::from_record(&record))
        .collect()
}

/// Validate a batch of samples and report one line per sample.
pub fn check_command(paths: &[PathBuf], config: &AttackConfig, json: bool) -> Result<()> {
    let entries = check_samples(paths, config);

    if json {
        let serialized = serde_json::to_string_pretty(&entries)
            .context("Failed to serialize check results to JSON")?;
        println!("{}", serialized);
        return Ok(());
    }

    for entry in &entries {
        println!("{}", entry.line());
    }
    let valid = entries.iter().filter(|e| e.valid).count();
    println!(
        "Checked {} sample(s): {} valid, {} skipped",
        entries.len(),
        valid,
        entries.len() - valid
    );

    Ok(())
}
