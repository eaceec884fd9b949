//! Synthetic PE32 DLL images and report parsing for integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::Path;

use dllversions::VersionRecord;

const SECTION_RVA: u32 = 0x1000;
const HEADERS_SIZE: usize = 0x200;
const FILE_ALIGNMENT: usize = 0x200;

/// Builder for a minimal DLL: one `.rsrc` section holding an optional version
/// resource and optional CLI metadata.
#[derive(Default, Clone)]
pub struct DllBuilder {
    versions: Option<(String, String)>,
    assembly_name: Option<String>,
}

impl DllBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn versions(mut self, file_version: &str, product_version: &str) -> Self {
        self.versions = Some((file_version.to_string(), product_version.to_string()));
        self
    }

    pub fn managed(mut self, assembly_name: &str) -> Self {
        self.assembly_name = Some(assembly_name.to_string());
        self
    }

    pub fn write_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, self.build()).unwrap();
    }

    pub fn build(&self) -> Vec<u8> {
        let mut section = Vec::new();
        let mut resource_dir = (0u32, 0u32);
        let mut clr_dir = (0u32, 0u32);

        if let Some((file_version, product_version)) = &self.versions {
            let blob = version_info(file_version, product_version);
            // root @0, names @24, languages @48, data entry @72, blob @88
            section.extend(resource_directory(16, 0x8000_0000 | 24));
            section.extend(resource_directory(1, 0x8000_0000 | 48));
            section.extend(resource_directory(0x0409, 72));
            section.extend((SECTION_RVA + 88).to_le_bytes());
            section.extend((blob.len() as u32).to_le_bytes());
            section.extend([0u8; 8]);
            section.extend(blob);
            resource_dir = (SECTION_RVA, section.len() as u32);
        }

        if let Some(name) = &self.assembly_name {
            pad(&mut section, 4);
            let header_at = section.len() as u32;
            let metadata = cli_metadata(name);
            let metadata_at = header_at + 72;

            let mut header = vec![0u8; 72];
            put_u32(&mut header, 0, 72);
            put_u16(&mut header, 4, 2);
            put_u16(&mut header, 6, 5);
            put_u32(&mut header, 8, SECTION_RVA + metadata_at);
            put_u32(&mut header, 12, metadata.len() as u32);
            section.extend(header);
            section.extend(metadata);
            clr_dir = (SECTION_RVA + header_at, 72);
        }

        if section.is_empty() {
            section.resize(16, 0);
        }
        let virtual_size = section.len() as u32;
        pad(&mut section, FILE_ALIGNMENT);

        let mut image = pe_headers(virtual_size, section.len() as u32, resource_dir, clr_dir);
        image.extend(section);
        image
    }
}

fn put_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn pad(buf: &mut Vec<u8>, alignment: usize) {
    while buf.len() % alignment != 0 {
        buf.push(0);
    }
}

fn pe_headers(virtual_size: u32, raw_size: u32, resources: (u32, u32), clr: (u32, u32)) -> Vec<u8> {
    let mut h = vec![0u8; HEADERS_SIZE];
    h[0..2].copy_from_slice(b"MZ");
    put_u32(&mut h, 0x3c, 0x80);
    h[0x80..0x84].copy_from_slice(b"PE\0\0");

    // COFF header: i386, one section, 224 byte optional header, DLL
    let coff = 0x84;
    put_u16(&mut h, coff, 0x014c);
    put_u16(&mut h, coff + 2, 1);
    put_u16(&mut h, coff + 16, 0xE0);
    put_u16(&mut h, coff + 18, 0x2102);

    let opt = 0x98;
    put_u16(&mut h, opt, 0x10b);
    put_u32(&mut h, opt + 20, SECTION_RVA);
    put_u32(&mut h, opt + 24, SECTION_RVA);
    put_u32(&mut h, opt + 28, 0x1000_0000);
    put_u32(&mut h, opt + 32, 0x1000);
    put_u32(&mut h, opt + 36, FILE_ALIGNMENT as u32);
    put_u16(&mut h, opt + 40, 4);
    put_u16(&mut h, opt + 48, 4);
    let image_size = SECTION_RVA + ((virtual_size + 0xfff) & !0xfff);
    put_u32(&mut h, opt + 56, image_size);
    put_u32(&mut h, opt + 60, HEADERS_SIZE as u32);
    put_u16(&mut h, opt + 68, 2);
    put_u32(&mut h, opt + 72, 0x10_0000);
    put_u32(&mut h, opt + 76, 0x1000);
    put_u32(&mut h, opt + 80, 0x10_0000);
    put_u32(&mut h, opt + 84, 0x1000);
    put_u32(&mut h, opt + 92, 16);

    let dirs = opt + 96;
    put_u32(&mut h, dirs + 2 * 8, resources.0);
    put_u32(&mut h, dirs + 2 * 8 + 4, resources.1);
    put_u32(&mut h, dirs + 14 * 8, clr.0);
    put_u32(&mut h, dirs + 14 * 8 + 4, clr.1);

    let section = opt + 0xE0;
    h[section..section + 8].copy_from_slice(b".rsrc\0\0\0");
    put_u32(&mut h, section + 8, virtual_size);
    put_u32(&mut h, section + 12, SECTION_RVA);
    put_u32(&mut h, section + 16, raw_size);
    put_u32(&mut h, section + 20, HEADERS_SIZE as u32);
    put_u32(&mut h, section + 36, 0x4000_0040);
    h
}

fn resource_directory(id: u32, target: u32) -> Vec<u8> {
    let mut dir = vec![0u8; 16];
    put_u16(&mut dir, 14, 1);
    dir.extend(id.to_le_bytes());
    dir.extend(target.to_le_bytes());
    dir
}

fn utf16z(text: &str) -> Vec<u8> {
    text.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

fn node(key: &str, kind: u16, value: &[u8], value_length: u16, children: &[Vec<u8>]) -> Vec<u8> {
    let mut out = vec![0u8; 6];
    put_u16(&mut out, 2, value_length);
    put_u16(&mut out, 4, kind);
    out.extend(utf16z(key));
    pad(&mut out, 4);
    out.extend_from_slice(value);
    for child in children {
        pad(&mut out, 4);
        out.extend_from_slice(child);
    }
    let length = out.len() as u16;
    put_u16(&mut out, 0, length);
    out
}

fn version_info(file_version: &str, product_version: &str) -> Vec<u8> {
    let string = |key: &str, text: &str| {
        let chars = text.encode_utf16().count() as u16 + 1;
        node(key, 1, &utf16z(text), chars, &[])
    };
    let table = node(
        "040904b0",
        1,
        &[],
        0,
        &[
            string("CompanyName", "Contoso"),
            string("FileVersion", file_version),
            string("ProductVersion", product_version),
        ],
    );
    let string_info = node("StringFileInfo", 1, &[], 0, &[table]);
    let translation = node("Translation", 0, &[0x09, 0x04, 0xb0, 0x04], 4, &[]);
    let var_info = node("VarFileInfo", 1, &[], 0, &[translation]);

    let mut fixed = vec![0u8; 52];
    put_u32(&mut fixed, 0, 0xFEEF_04BD);
    node("VS_VERSION_INFO", 0, &fixed, 52, &[string_info, var_info])
}

fn cli_metadata(assembly_name: &str) -> Vec<u8> {
    let mut strings = vec![0u8];
    strings.extend_from_slice(assembly_name.as_bytes());
    strings.push(0);
    pad(&mut strings, 4);

    let mut tables = vec![0u8; 4];
    tables.extend([2, 0, 0, 1]);
    tables.extend((1u64 << 0x20).to_le_bytes());
    tables.extend(0u64.to_le_bytes());
    tables.extend(1u32.to_le_bytes());
    // Assembly row: HashAlgId, version, Flags, PublicKey, Name, Culture
    tables.extend(0x8004u32.to_le_bytes());
    tables.extend([0u8; 8]);
    tables.extend(0u32.to_le_bytes());
    tables.extend(0u16.to_le_bytes());
    tables.extend(1u16.to_le_bytes());
    tables.extend(0u16.to_le_bytes());
    pad(&mut tables, 4);

    let version = b"v4.0.30319\0\0";
    let mut out = Vec::new();
    out.extend(0x424A_5342u32.to_le_bytes());
    out.extend(1u16.to_le_bytes());
    out.extend(1u16.to_le_bytes());
    out.extend(0u32.to_le_bytes());
    out.extend((version.len() as u32).to_le_bytes());
    out.extend_from_slice(version);
    out.extend(0u16.to_le_bytes());
    out.extend(2u16.to_le_bytes());

    let tables_at = 64u32;
    let strings_at = tables_at + tables.len() as u32;
    out.extend(tables_at.to_le_bytes());
    out.extend((tables.len() as u32).to_le_bytes());
    out.extend_from_slice(b"#~\0\0");
    out.extend(strings_at.to_le_bytes());
    out.extend((strings.len() as u32).to_le_bytes());
    out.extend_from_slice(b"#Strings\0\0\0\0");

    out.extend(tables);
    out.extend(strings);
    out
}

/// Parse a report back into records, checking the header.
pub fn parse_report(text: &str) -> Vec<VersionRecord> {
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("Name; FileVersion; ProductVersion"));
    lines
        .map(|line| {
            let fields: Vec<&str> = line.splitn(3, "; ").collect();
            assert_eq!(fields.len(), 3, "malformed row: {line:?}");
            VersionRecord::new(fields[0], fields[1], fields[2])
        })
        .collect()
}
