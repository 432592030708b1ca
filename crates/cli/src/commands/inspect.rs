use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use sample_core::inspect::{hash_bytes, is_pe, locate_code_section};
use serde::Serialize;

/// Fingerprints of a single file, as reported by `inspect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    pub path: String,
    pub size: usize,
    pub sha256: String,
    pub is_pe: bool,
    pub code_section: Option<String>,
    pub code_offset: Option<usize>,
    pub code_size: Option<usize>,
    pub code_sha256: Option<String>,
    /// Set when the file looks like PE but its section table cannot be used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parser_error: Option<String>,
}

/// Read `path` and compute its whole-file and code-section fingerprints.
pub fn inspect_file(path: &Path) -> Result<InspectReport> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read binary {}", path.display()))?;

    let mut report = InspectReport {
        path: path.display().to_string(),
        size: bytes.len(),
        sha256: hash_bytes(&bytes),
        is_pe: is_pe(&bytes),
        code_section: None,
        code_offset: None,
        code_size: None,
        code_sha256: None,
        parser_error: None,
    };
    if !report.is_pe {
        return Ok(report);
    }

    match locate_code_section(&bytes) {
        Ok(section) => {
            report.code_sha256 = Some(hash_bytes(&bytes[section.range.clone()]));
            report.code_offset = Some(section.range.start);
            report.code_size = Some(section.range.len());
            report.code_section = Some(section.name);
        }
        Err(err) => report.parser_error = Some(err.to_string()),
    }
    Ok(report)
}

/// Print the fingerprints of a single binary.
pub fn inspect_command(path: &Path, json: bool) -> Result<()> {
    let report = inspect_file(path)?;

    if json {
        let serialized = serde_json::to_string_pretty(&report)
            .context("Failed to serialize inspect report to JSON")?;
        println!("{}", serialized);
        return Ok(());
    }

    println!("File: {}", report.path);
    println!("  Size: {} bytes", report.size);
    println!("  SHA-256: {}", report.sha256);
    if !report.is_pe {
        println!("  Format: not a Windows PE file");
        return Ok(());
    }
    println!("  Format: PE");
    match (&report.code_section, &report.code_sha256, &report.parser_error) {
        (Some(name), Some(hash), _) => {
            println!(
                "  Code section: {} (offset 0x{:X}, {} bytes)",
                name,
                report.code_offset.unwrap_or_default(),
                report.code_size.unwrap_or_default()
            );
            println!("  Code SHA-256: {}", hash);
        }
        (_, _, Some(err)) => println!("  Parser limitation: {}", err),
        _ => {}
    }

    Ok(())
}
