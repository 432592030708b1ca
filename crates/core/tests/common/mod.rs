//! Minimal PE image builder for tests.
//!
//! Produces: DOS header (e_lfanew = 0x80), `PE\0\0`, a COFF header, an
//! optional header (empty unless given), the section table, and raw section
//! data aligned to 0x200.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

pub const PE_POINTER: usize = 0x80;
pub const COFF_OFFSET: usize = PE_POINTER + 4;
pub const SECTION_TABLE_OFFSET: usize = COFF_OFFSET + 20;
pub const FILE_ALIGNMENT: usize = 0x200;

pub const SCN_CNT_CODE: u32 = 0x0000_0020;
pub const SCN_CNT_INITIALIZED_DATA: u32 = 0x0000_0040;
pub const SCN_MEM_EXECUTE: u32 = 0x2000_0000;
pub const SCN_MEM_READ: u32 = 0x4000_0000;
pub const SCN_MEM_WRITE: u32 = 0x8000_0000;

#[derive(Debug, Clone)]
pub struct SectionSpec {
    pub name: &'static str,
    pub characteristics: u32,
    pub data: Vec<u8>,
}

impl SectionSpec {
    pub fn code(name: &'static str, data: &[u8]) -> Self {
        Self { name, characteristics: SCN_CNT_CODE | SCN_MEM_EXECUTE | SCN_MEM_READ, data: data.to_vec() }
    }

    pub fn data(name: &'static str, data: &[u8]) -> Self {
        Self {
            name,
            characteristics: SCN_CNT_INITIALIZED_DATA | SCN_MEM_READ | SCN_MEM_WRITE,
            data: data.to_vec(),
        }
    }
}

fn align(value: usize) -> usize {
    value.div_ceil(FILE_ALIGNMENT) * FILE_ALIGNMENT
}

fn put_u16(buf: &mut [u8], at: usize, v: u16) {
    buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut [u8], at: usize, v: u32) {
    buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

/// Assemble a PE image holding `sections` in table order.
pub fn build_pe(sections: &[SectionSpec]) -> Vec<u8> {
    build_pe_with_optional_header(sections, &[])
}

/// Like [`build_pe`], with `optional` copied verbatim after the COFF header.
pub fn build_pe_with_optional_header(sections: &[SectionSpec], optional: &[u8]) -> Vec<u8> {
    let table_offset = SECTION_TABLE_OFFSET + optional.len();
    let headers_end = table_offset + 40 * sections.len();
    let mut raw_offset = align(headers_end);
    let mut image = vec![0u8; raw_offset];

    image[0..2].copy_from_slice(b"MZ");
    put_u32(&mut image, 0x3c, PE_POINTER as u32);
    image[PE_POINTER..PE_POINTER + 4].copy_from_slice(b"PE\0\0");
    put_u16(&mut image, COFF_OFFSET, 0x014c); // i386
    put_u16(&mut image, COFF_OFFSET + 2, sections.len() as u16);
    put_u16(&mut image, COFF_OFFSET + 16, optional.len() as u16);
    put_u16(&mut image, COFF_OFFSET + 18, 0x0102);
    image[SECTION_TABLE_OFFSET..table_offset].copy_from_slice(optional);

    for (i, section) in sections.iter().enumerate() {
        let entry = table_offset + 40 * i;
        let raw_size = align(section.data.len().max(1));
        let name = section.name.as_bytes();
        image[entry..entry + name.len()].copy_from_slice(name);
        put_u32(&mut image, entry + 8, section.data.len() as u32); // virtual size
        put_u32(&mut image, entry + 12, (0x1000 * (i + 1)) as u32); // virtual address
        put_u32(&mut image, entry + 16, raw_size as u32);
        put_u32(&mut image, entry + 20, raw_offset as u32);
        put_u32(&mut image, entry + 36, section.characteristics);

        image.resize(raw_offset + raw_size, 0);
        image[raw_offset..raw_offset + section.data.len()].copy_from_slice(&section.data);
        raw_offset += raw_size;
    }

    image
}

/// A 0xE0-byte PE32 optional header declaring `rva_and_sizes` data
/// directories. Only the magic and the directory count are filled in.
pub fn pe32_optional_header(rva_and_sizes: u32) -> Vec<u8> {
    let mut header = vec![0u8; 0xE0];
    put_u16(&mut header, 0, 0x010b);
    put_u32(&mut header, 92, rva_and_sizes);
    header
}

/// A small image with a `.text` code section and a `.data` section.
pub fn small_pe() -> Vec<u8> {
    build_pe(&[
        SectionSpec::code(".text", &[0x55, 0x89, 0xE5, 0x31, 0xC0, 0x5D, 0xC3]),
        SectionSpec::data(".data", b"hello from the data section"),
    ])
}

/// File offset of the raw data of section `index` in an image from `build_pe`.
pub fn raw_offset_of(image: &[u8], index: usize) -> usize {
    let optional = u16::from_le_bytes([image[COFF_OFFSET + 16], image[COFF_OFFSET + 17]]) as usize;
    let entry = SECTION_TABLE_OFFSET + optional + 40 * index + 20;
    u32::from_le_bytes(image[entry..entry + 4].try_into().unwrap()) as usize
}

/// Write `bytes` to `dir/name` and return the path.
pub fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write fixture");
    path
}
