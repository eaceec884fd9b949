//! Version resource (`RT_VERSION`) lookup and `VS_VERSIONINFO` parsing.
//!
//! The resource tree has three levels: type, name, language. Offsets inside the
//! tree are relative to the start of the resource directory; the leaf data entry
//! carries an RVA that the caller resolves against the section table.

use crate::bytes::{align4, le_u16, le_u32};
use crate::error::ReadError;

const RT_VERSION: u32 = 16;
const DIRECTORY_HEADER_SIZE: usize = 16;
const DIRECTORY_ENTRY_SIZE: usize = 8;
const HIGH_BIT: u32 = 0x8000_0000;

const VS_FIXEDFILEINFO_SIGNATURE: u32 = 0xFEEF_04BD;
const NODE_HEADER_SIZE: usize = 6;
const TEXT_NODE: u16 = 1;

/// Table keys tried after the module's own translation.
const FALLBACK_TABLES: [&str; 3] = ["040904b0", "040904e4", "04090000"];

/// File and product version text. Missing strings stay empty.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VersionStrings {
    pub file_version: String,
    pub product_version: String,
}

/// Locate the first `RT_VERSION` leaf. Returns its data RVA and size.
pub fn find_version_resource(resources: &[u8]) -> Result<Option<(u32, u32)>, ReadError> {
    let version_type = directory_entries(resources, 0)?
        .into_iter()
        .find(|&(name, _)| name == RT_VERSION);
    let Some((_, target)) = version_type else {
        return Ok(None);
    };

    let names = subdirectory(resources, target)?;
    let Some(&(_, target)) = names.first() else {
        return Ok(None);
    };

    let languages = subdirectory(resources, target)?;
    let Some(&(_, target)) = languages.first() else {
        return Ok(None);
    };
    if target & HIGH_BIT != 0 {
        return Err(ReadError::VersionResource("resource tree deeper than three levels"));
    }

    let leaf = target as usize;
    let rva = le_u32(resources, leaf)
        .ok_or(ReadError::VersionResource("truncated data entry"))?;
    let size = le_u32(resources, leaf + 4)
        .ok_or(ReadError::VersionResource("truncated data entry"))?;
    Ok(Some((rva, size)))
}

fn subdirectory(resources: &[u8], target: u32) -> Result<Vec<(u32, u32)>, ReadError> {
    if target & HIGH_BIT == 0 {
        return Err(ReadError::VersionResource("expected a subdirectory"));
    }
    directory_entries(resources, (target & !HIGH_BIT) as usize)
}

fn directory_entries(resources: &[u8], offset: usize) -> Result<Vec<(u32, u32)>, ReadError> {
    const TRUNCATED: ReadError = ReadError::VersionResource("truncated resource directory");
    let named = le_u16(resources, offset + 12).ok_or(TRUNCATED)? as usize;
    let ids = le_u16(resources, offset + 14).ok_or(TRUNCATED)? as usize;

    let mut entries = Vec::with_capacity(named + ids);
    for index in 0..named + ids {
        let at = offset + DIRECTORY_HEADER_SIZE + index * DIRECTORY_ENTRY_SIZE;
        match (le_u32(resources, at), le_u32(resources, at + 4)) {
            (Some(name), Some(target)) => entries.push((name, target)),
            _ => return Err(TRUNCATED),
        }
    }
    Ok(entries)
}

struct Node<'a> {
    key: String,
    /// Exactly `wValueLength` worth of value bytes.
    value: &'a [u8],
    /// Everything from the value start to the end of the node.
    trailing: &'a [u8],
    children: &'a [u8],
}

impl Node<'_> {
    fn text(&self) -> String {
        let units: Vec<u16> = self
            .trailing
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0)
            .collect();
        String::from_utf16_lossy(&units)
    }
}

fn parse_node(data: &[u8]) -> Result<Node<'_>, ReadError> {
    const TRUNCATED: ReadError = ReadError::VersionResource("truncated node header");
    let length = le_u16(data, 0).ok_or(TRUNCATED)? as usize;
    let value_length = le_u16(data, 2).ok_or(TRUNCATED)? as usize;
    let kind = le_u16(data, 4).ok_or(TRUNCATED)?;

    if length < NODE_HEADER_SIZE || length > data.len() {
        return Err(ReadError::VersionResource("node length out of bounds"));
    }
    let node = &data[..length];

    let (key, key_end) = read_key(node)?;
    let value_start = align4(key_end).min(length);
    let value_bytes = if kind == TEXT_NODE {
        value_length * 2
    } else {
        value_length
    };
    let value_end = (value_start + value_bytes).min(length);
    let children_start = align4(value_end).min(length);

    Ok(Node {
        key,
        value: &node[value_start..value_end],
        trailing: &node[value_start..],
        children: &node[children_start..],
    })
}

fn read_key(node: &[u8]) -> Result<(String, usize), ReadError> {
    let mut units = Vec::new();
    let mut offset = NODE_HEADER_SIZE;
    loop {
        let unit = le_u16(node, offset).ok_or(ReadError::VersionResource("unterminated key"))?;
        offset += 2;
        if unit == 0 {
            break;
        }
        units.push(unit);
    }
    Ok((String::from_utf16_lossy(&units), offset))
}

fn children(data: &[u8]) -> Result<Vec<Node<'_>>, ReadError> {
    let mut nodes = Vec::new();
    let mut offset = 0;
    while offset + NODE_HEADER_SIZE <= data.len() {
        let length = le_u16(data, offset).unwrap_or(0) as usize;
        if length == 0 {
            break;
        }
        nodes.push(parse_node(&data[offset..])?);
        offset = align4(offset + length);
    }
    Ok(nodes)
}

/// Parse a `VS_VERSIONINFO` blob and pick the string table the way Windows does.
pub fn parse_version_info(blob: &[u8]) -> Result<VersionStrings, ReadError> {
    let root = parse_node(blob)?;
    if root.key != "VS_VERSION_INFO" {
        return Err(ReadError::VersionResource("missing VS_VERSION_INFO root"));
    }
    if let Some(signature) = le_u32(root.value, 0) {
        if signature != VS_FIXEDFILEINFO_SIGNATURE {
            return Err(ReadError::VersionResource("bad VS_FIXEDFILEINFO signature"));
        }
    }

    let mut tables: Vec<(String, Vec<(String, String)>)> = Vec::new();
    let mut translations: Vec<(u16, u16)> = Vec::new();

    for child in children(root.children)? {
        match child.key.as_str() {
            "StringFileInfo" => {
                for table in children(child.children)? {
                    let strings = children(table.children)?
                        .into_iter()
                        .map(|entry| {
                            let text = entry.text();
                            (entry.key, text)
                        })
                        .collect();
                    tables.push((table.key, strings));
                }
            }
            "VarFileInfo" => {
                for var in children(child.children)? {
                    if var.key == "Translation" {
                        translations.extend(var.value.chunks_exact(4).map(|pair| {
                            (
                                u16::from_le_bytes([pair[0], pair[1]]),
                                u16::from_le_bytes([pair[2], pair[3]]),
                            )
                        }));
                    }
                }
            }
            _ => {}
        }
    }

    let preferred = translations
        .first()
        .map(|(language, codepage)| format!("{language:04x}{codepage:04x}"));
    let table = preferred
        .iter()
        .map(String::as_str)
        .chain(FALLBACK_TABLES)
        .find_map(|wanted| {
            tables
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(wanted))
        })
        .or_else(|| tables.first());

    let Some((_, strings)) = table else {
        return Ok(VersionStrings::default());
    };
    let lookup = |wanted: &str| {
        strings
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(wanted))
            .map(|(_, value)| value.clone())
            .unwrap_or_default()
    };

    Ok(VersionStrings {
        file_version: lookup("FileVersion"),
        product_version: lookup("ProductVersion"),
    })
}
