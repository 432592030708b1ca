use std::borrow::Cow;
use std::ops::Range;

use goblin::pe::header::{CoffHeader, DosHeader, PE_MAGIC, SIZEOF_COFF_HEADER, SIZEOF_PE_MAGIC};
use goblin::pe::section_table::{SectionTable, IMAGE_SCN_CNT_CODE, SIZEOF_SECTION_TABLE};

use super::{InspectResult, MalformedBinary};

/// Conventional name of the code section, used when flags do not settle it.
const CODE_SECTION_NAME: &str = ".text";

/// The section selected as "the" code section of a PE image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSection {
    /// Declared section name (e.g. `.text`).
    pub name: String,
    /// File range of the section's stored raw data.
    pub range: Range<usize>,
    /// Index in the section table.
    pub index: usize,
}

impl CodeSection {
    /// True when `offset` falls inside the section's raw data.
    pub fn contains(&self, offset: usize) -> bool {
        self.range.contains(&offset)
    }
}

/// Section name, with undecodable bytes of a short name replaced lossily.
fn section_name(section: &SectionTable) -> Cow<'_, str> {
    match section.name() {
        Ok(name) => Cow::Borrowed(name),
        Err(_) => {
            let end = section.name.iter().position(|b| *b == 0).unwrap_or(section.name.len());
            String::from_utf8_lossy(&section.name[..end])
        }
    }
}

fn is_code(section: &SectionTable) -> bool {
    section.characteristics & IMAGE_SCN_CNT_CODE != 0
}

/// Pick the code section index from a parsed section table.
///
/// Rule, in order:
/// 1. exactly one section flagged `IMAGE_SCN_CNT_CODE` wins;
/// 2. several flagged sections: prefer the one named `.text`, otherwise the
///    first flagged one in table order;
/// 3. nothing flagged: a section named `.text`, if any.
fn select_code_section(sections: &[SectionTable]) -> Option<usize> {
    let flagged: Vec<usize> =
        sections.iter().enumerate().filter(|(_, s)| is_code(s)).map(|(i, _)| i).collect();

    match flagged.as_slice() {
        [only] => Some(*only),
        [first, ..] => flagged
            .iter()
            .copied()
            .find(|i| section_name(&sections[*i]) == CODE_SECTION_NAME)
            .or(Some(*first)),
        [] => sections.iter().position(|s| section_name(s) == CODE_SECTION_NAME),
    }
}

/// DOS header, `PE\0\0` signature and COFF file header, nothing more.
///
/// The optional header is skipped by its declared size, never parsed, so
/// unusual optional-header contents do not make a loadable image "not PE".
/// Returns the file offset of the COFF header alongside it.
pub(super) fn coff_header(bytes: &[u8]) -> Option<(usize, CoffHeader)> {
    let dos = DosHeader::parse(bytes).ok()?;
    let pe_pointer = dos.pe_pointer as usize;
    let signature = bytes.get(pe_pointer..pe_pointer.checked_add(SIZEOF_PE_MAGIC)?)?;
    if signature != &PE_MAGIC.to_le_bytes()[..] {
        return None;
    }
    let mut offset = pe_pointer + SIZEOF_PE_MAGIC;
    let coff_offset = offset;
    let coff = CoffHeader::parse(bytes, &mut offset).ok()?;
    Some((coff_offset, coff))
}

fn parse_sections(bytes: &[u8]) -> InspectResult<Vec<SectionTable>> {
    let (coff_offset, coff) = coff_header(bytes).ok_or(MalformedBinary::NotPe)?;
    let declared = coff.number_of_sections;
    if declared == 0 {
        return Err(MalformedBinary::NoSectionTable.into());
    }

    let table_offset =
        coff_offset + SIZEOF_COFF_HEADER + coff.size_of_optional_header as usize;
    let table_end = table_offset + declared as usize * SIZEOF_SECTION_TABLE;
    if table_end > bytes.len() {
        return Err(MalformedBinary::TruncatedSectionTable { declared }.into());
    }

    let mut offset = table_offset;
    coff.sections(bytes, &mut offset).map_err(|err| {
        MalformedBinary::UnresolvedSectionName { reason: err.to_string() }.into()
    })
}

/// Parse the section table of `bytes` and locate the code section.
pub fn locate_code_section(bytes: &[u8]) -> InspectResult<CodeSection> {
    let sections = parse_sections(bytes)?;
    let index = select_code_section(&sections).ok_or(MalformedBinary::NoCodeSection)?;
    let section = &sections[index];
    let name = section_name(section).into_owned();

    let start = section.pointer_to_raw_data as usize;
    let end = start.checked_add(section.size_of_raw_data as usize).filter(|end| *end <= bytes.len());
    let Some(end) = end else {
        return Err(MalformedBinary::SectionOutOfBounds {
            name,
            offset: section.pointer_to_raw_data,
            size: section.size_of_raw_data,
            buffer_len: bytes.len(),
        }
        .into());
    };

    Ok(CodeSection { name, range: start..end, index })
}

#[cfg(test)]
mod tests {
    use super::*;
    use goblin::pe::section_table::{IMAGE_SCN_CNT_INITIALIZED_DATA, IMAGE_SCN_MEM_EXECUTE};

    fn section(name: &str, characteristics: u32) -> SectionTable {
        let mut raw = [0u8; 8];
        raw[..name.len()].copy_from_slice(name.as_bytes());
        SectionTable { name: raw, characteristics, ..Default::default() }
    }

    #[test]
    fn single_flagged_section_wins_regardless_of_name() {
        let table = vec![
            section(".data", IMAGE_SCN_CNT_INITIALIZED_DATA),
            section("CODE", IMAGE_SCN_CNT_CODE | IMAGE_SCN_MEM_EXECUTE),
            section(".text", IMAGE_SCN_CNT_INITIALIZED_DATA),
        ];
        assert_eq!(select_code_section(&table), Some(1));
    }

    #[test]
    fn multiple_flagged_sections_prefer_text() {
        let table = vec![
            section(".init", IMAGE_SCN_CNT_CODE),
            section(".text", IMAGE_SCN_CNT_CODE),
            section(".stub", IMAGE_SCN_CNT_CODE),
        ];
        assert_eq!(select_code_section(&table), Some(1));
    }

    #[test]
    fn multiple_flagged_sections_without_text_take_first() {
        let table = vec![
            section(".rdata", IMAGE_SCN_CNT_INITIALIZED_DATA),
            section("UPX0", IMAGE_SCN_CNT_CODE),
            section("UPX1", IMAGE_SCN_CNT_CODE),
        ];
        assert_eq!(select_code_section(&table), Some(1));
    }

    #[test]
    fn unflagged_table_falls_back_to_text_name() {
        let table = vec![section(".rdata", 0), section(".text", 0)];
        assert_eq!(select_code_section(&table), Some(1));
    }

    #[test]
    fn no_code_and_no_text_selects_nothing() {
        let table = vec![section(".rdata", 0), section(".rsrc", IMAGE_SCN_CNT_INITIALIZED_DATA)];
        assert_eq!(select_code_section(&table), None);
    }

    #[test]
    fn undecodable_short_name_is_reported_lossily() {
        let mut table = section("", IMAGE_SCN_CNT_CODE);
        table.name[..3].copy_from_slice(&[b'.', 0xFF, b'x']);
        assert_eq!(section_name(&table), ".\u{FFFD}x");
        assert_eq!(select_code_section(&[table]), Some(0));
    }

    #[test]
    fn non_pe_buffer_is_reported_as_not_pe() {
        let err = locate_code_section(b"plain text, not an executable").unwrap_err();
        assert!(matches!(err, super::super::InspectError::Malformed(MalformedBinary::NotPe)));
    }
}
