#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Two-section PE image: `.text` (code) at 0x200 and `.data` at 0x400.
///
/// `code` controls whether `.text` carries the code characteristics flag;
/// without it and with a different name the image has no code section.
pub fn pe_image(text_name: &str, code: bool) -> Vec<u8> {
    let mut image = vec![0u8; 0x600];
    image[0..2].copy_from_slice(b"MZ");
    image[0x3c..0x40].copy_from_slice(&0x80u32.to_le_bytes());
    image[0x80..0x84].copy_from_slice(b"PE\0\0");
    image[0x84..0x86].copy_from_slice(&0x014cu16.to_le_bytes());
    image[0x86..0x88].copy_from_slice(&2u16.to_le_bytes());

    let sections: [(&str, u32, u32); 2] = [
        (text_name, if code { 0x6000_0020 } else { 0x4000_0040 }, 0x200),
        (".data", 0xC000_0040, 0x400),
    ];
    for (i, (name, characteristics, raw)) in sections.iter().enumerate() {
        let entry = 0x98 + 40 * i;
        image[entry..entry + name.len()].copy_from_slice(name.as_bytes());
        image[entry + 8..entry + 12].copy_from_slice(&0x200u32.to_le_bytes());
        image[entry + 12..entry + 16].copy_from_slice(&(0x1000 * (i as u32 + 1)).to_le_bytes());
        image[entry + 16..entry + 20].copy_from_slice(&0x200u32.to_le_bytes());
        image[entry + 20..entry + 24].copy_from_slice(&raw.to_le_bytes());
        image[entry + 36..entry + 40].copy_from_slice(&characteristics.to_le_bytes());
    }
    image[0x200..0x204].copy_from_slice(&[0x31, 0xC0, 0xC3, 0x90]);
    image[0x400..0x405].copy_from_slice(b"hello");
    image
}

pub fn valid_pe() -> Vec<u8> {
    pe_image(".text", true)
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write fixture");
    path
}
