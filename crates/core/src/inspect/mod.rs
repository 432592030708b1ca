//! Binary inspection: PE detection and content fingerprints.
//!
//! Everything here is stateless and operates on raw bytes (or, for
//! `is_pe_file`, the header span of a file). PE headers and the section table
//! are parsed with `goblin::pe`; fingerprints are lowercase hex SHA-256
//! digests.
//!
//! Two fingerprints are kept per buffer:
//! - the whole-file hash, which is expected to change once payload bytes are
//!   injected;
//! - the code-section hash, which must stay stable if the transformation
//!   left the executable code alone.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use goblin::pe::header::{SIZEOF_COFF_HEADER, SIZEOF_PE_MAGIC};
use sha2::{Digest, Sha256};
use thiserror::Error;

mod sections;

pub use sections::{locate_code_section, CodeSection};

/// Reasons a buffer that was expected to be a PE image cannot be analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedBinary {
    /// DOS header, PE signature or COFF header did not parse.
    #[error("DOS/PE headers could not be parsed")]
    NotPe,

    /// The COFF header declares zero sections.
    #[error("PE file has no section table")]
    NoSectionTable,

    /// The section table runs past the end of the buffer.
    #[error("section table is truncated ({declared} sections declared)")]
    TruncatedSectionTable { declared: u16 },

    /// A `/NNN` long section name does not resolve in the COFF string table.
    #[error("section name could not be resolved: {reason}")]
    UnresolvedSectionName { reason: String },

    /// No section is flagged as code and none carries the conventional name.
    #[error("no section could be identified as containing code")]
    NoCodeSection,

    /// The selected section's raw data range lies outside the buffer.
    #[error(
        "section {name} raw data 0x{offset:X}+0x{size:X} exceeds buffer of {buffer_len} bytes"
    )]
    SectionOutOfBounds { name: String, offset: u32, size: u32, buffer_len: usize },
}

/// Error type for inspection operations.
#[derive(Debug, Error)]
pub enum InspectError {
    /// The buffer looked like (or was claimed to be) a PE image but deeper
    /// parsing failed.
    #[error("malformed binary: {0}")]
    Malformed(#[from] MalformedBinary),
}

/// Convenience result type for inspection operations.
pub type InspectResult<T> = Result<T, InspectError>;

/// Size of the DOS header; `e_lfanew` sits in its last four bytes.
const DOS_HEADER_LEN: u64 = 0x40;
const E_LFANEW_OFFSET: usize = 0x3c;

/// Returns true when `bytes` starts with a DOS header whose `e_lfanew` points
/// at a `PE\0\0` signature followed by a parseable COFF header.
///
/// The optional header is not inspected.
pub fn is_pe(bytes: &[u8]) -> bool {
    sections::coff_header(bytes).is_some()
}

/// Read the header span of the file at `path` and check it for PE conformance.
///
/// Any I/O failure is a plain `false`: an unreadable file is simply "not a PE
/// file" from the caller's point of view.
pub fn is_pe_file(path: impl AsRef<Path>) -> bool {
    match read_header_span(path.as_ref()) {
        Ok(head) => is_pe(&head),
        Err(_) => false,
    }
}

/// Read the DOS header, then just enough to cover the PE signature and the
/// COFF header that `e_lfanew` points at.
fn read_header_span(path: &Path) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut head = Vec::new();
    file.by_ref().take(DOS_HEADER_LEN).read_to_end(&mut head)?;

    let Some(raw) = head.get(E_LFANEW_OFFSET..E_LFANEW_OFFSET + 4) else {
        return Ok(head);
    };
    let e_lfanew = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as u64;
    let end = e_lfanew + (SIZEOF_PE_MAGIC + SIZEOF_COFF_HEADER) as u64;
    if let Some(rest) = end.checked_sub(head.len() as u64) {
        file.take(rest).read_to_end(&mut head)?;
    }
    Ok(head)
}

/// Lowercase hex SHA-256 of the entire buffer.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Hash the raw bytes of the identified code section.
///
/// Returns `(digest, section_name)`. See [`locate_code_section`] for the
/// selection rule.
pub fn code_section_hash(bytes: &[u8]) -> InspectResult<(String, String)> {
    let section = locate_code_section(bytes)?;
    let digest = hash_bytes(&bytes[section.range.clone()]);
    Ok((digest, section.name))
}

/// 256-bin histogram of byte values.
///
/// This is the shape stored in `AttackResults::payload_byte_distribution`.
pub fn byte_distribution(bytes: &[u8]) -> Vec<u64> {
    let mut bins = vec![0u64; 256];
    for b in bytes {
        bins[*b as usize] += 1;
    }
    bins
}
