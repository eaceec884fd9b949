//! ECMA-335 metadata reader, just far enough to find the assembly name.
//!
//! The `Assembly` table (0x20) comes after 32 other tables whose row widths
//! depend on heap index sizes and on the row counts of the tables they
//! reference, so every present table before it has to be sized.

use crate::bytes::{align4, le_u16, le_u32, le_u64};
use crate::error::ReadError;

const METADATA_SIGNATURE: u32 = 0x424A_5342;
const ASSEMBLY_TABLE: usize = 0x20;
const TABLE_COUNT: usize = 64;

const HEAP_STRINGS_WIDE: u8 = 0x01;
const HEAP_GUID_WIDE: u8 = 0x02;
const HEAP_BLOB_WIDE: u8 = 0x04;
const HEAP_EXTRA_DATA: u8 = 0x40;

/// Metadata directory (RVA, size) from an `IMAGE_COR20_HEADER`.
pub fn metadata_directory(cor20: &[u8]) -> Result<(u32, u32), ReadError> {
    let rva = le_u32(cor20, 8).ok_or(ReadError::Metadata("truncated CLI header"))?;
    let size = le_u32(cor20, 12).ok_or(ReadError::Metadata("truncated CLI header"))?;
    if rva == 0 {
        return Err(ReadError::Metadata("CLI header has no metadata"));
    }
    Ok((rva, size))
}

#[derive(Clone, Copy)]
enum Column {
    Fixed(usize),
    Strings,
    Guid,
    Blob,
    Table(usize),
    Coded(CodedIndex),
}

#[derive(Clone, Copy)]
enum CodedIndex {
    TypeDefOrRef,
    HasConstant,
    HasCustomAttribute,
    HasFieldMarshal,
    HasDeclSecurity,
    MemberRefParent,
    HasSemantics,
    MethodDefOrRef,
    MemberForwarded,
    CustomAttributeType,
    ResolutionScope,
}

impl CodedIndex {
    fn tag_bits(self) -> u32 {
        match self {
            Self::HasFieldMarshal
            | Self::HasSemantics
            | Self::MethodDefOrRef
            | Self::MemberForwarded => 1,
            Self::TypeDefOrRef | Self::HasConstant | Self::HasDeclSecurity | Self::ResolutionScope => 2,
            Self::MemberRefParent | Self::CustomAttributeType => 3,
            Self::HasCustomAttribute => 5,
        }
    }

    fn tables(self) -> &'static [usize] {
        match self {
            Self::TypeDefOrRef => &[0x02, 0x01, 0x1B],
            Self::HasConstant => &[0x04, 0x08, 0x17],
            Self::HasCustomAttribute => &[
                0x06, 0x04, 0x01, 0x02, 0x08, 0x09, 0x0A, 0x00, 0x0E, 0x17, 0x14, 0x11, 0x1A,
                0x1B, 0x20, 0x23, 0x26, 0x27, 0x28, 0x2A, 0x2C, 0x2B,
            ],
            Self::HasFieldMarshal => &[0x04, 0x08],
            Self::HasDeclSecurity => &[0x02, 0x06, 0x20],
            Self::MemberRefParent => &[0x02, 0x01, 0x1A, 0x06, 0x1B],
            Self::HasSemantics => &[0x14, 0x17],
            Self::MethodDefOrRef => &[0x06, 0x0A],
            Self::MemberForwarded => &[0x04, 0x06],
            Self::CustomAttributeType => &[0x06, 0x0A],
            Self::ResolutionScope => &[0x00, 0x1A, 0x23, 0x01],
        }
    }
}

/// Column layout of tables 0x00..0x1F, the ones stored ahead of `Assembly`.
fn table_schema(table: usize) -> &'static [Column] {
    use CodedIndex::*;
    use Column::*;

    match table {
        0x00 => &[Fixed(2), Strings, Guid, Guid, Guid], // Module
        0x01 => &[Coded(ResolutionScope), Strings, Strings], // TypeRef
        0x02 => &[Fixed(4), Strings, Strings, Coded(TypeDefOrRef), Table(0x04), Table(0x06)], // TypeDef
        0x03 => &[Table(0x04)], // FieldPtr
        0x04 => &[Fixed(2), Strings, Blob], // Field
        0x05 => &[Table(0x06)], // MethodPtr
        0x06 => &[Fixed(4), Fixed(2), Fixed(2), Strings, Blob, Table(0x08)], // MethodDef
        0x07 => &[Table(0x08)], // ParamPtr
        0x08 => &[Fixed(2), Fixed(2), Strings], // Param
        0x09 => &[Table(0x02), Coded(TypeDefOrRef)], // InterfaceImpl
        0x0A => &[Coded(MemberRefParent), Strings, Blob], // MemberRef
        0x0B => &[Fixed(2), Coded(HasConstant), Blob], // Constant
        0x0C => &[Coded(HasCustomAttribute), Coded(CustomAttributeType), Blob], // CustomAttribute
        0x0D => &[Coded(HasFieldMarshal), Blob], // FieldMarshal
        0x0E => &[Fixed(2), Coded(HasDeclSecurity), Blob], // DeclSecurity
        0x0F => &[Fixed(2), Fixed(4), Table(0x02)], // ClassLayout
        0x10 => &[Fixed(4), Table(0x04)], // FieldLayout
        0x11 => &[Blob], // StandAloneSig
        0x12 => &[Table(0x02), Table(0x14)], // EventMap
        0x13 => &[Table(0x14)], // EventPtr
        0x14 => &[Fixed(2), Strings, Coded(TypeDefOrRef)], // Event
        0x15 => &[Table(0x02), Table(0x17)], // PropertyMap
        0x16 => &[Table(0x17)], // PropertyPtr
        0x17 => &[Fixed(2), Strings, Blob], // Property
        0x18 => &[Fixed(2), Table(0x06), Coded(HasSemantics)], // MethodSemantics
        0x19 => &[Table(0x02), Coded(MethodDefOrRef), Coded(MethodDefOrRef)], // MethodImpl
        0x1A => &[Strings], // ModuleRef
        0x1B => &[Blob], // TypeSpec
        0x1C => &[Fixed(2), Coded(MemberForwarded), Strings, Table(0x1A)], // ImplMap
        0x1D => &[Fixed(4), Table(0x04)], // FieldRVA
        0x1E => &[Fixed(4), Fixed(4)], // EncLog
        0x1F => &[Fixed(4)], // EncMap
        _ => &[],
    }
}

struct TableLayout {
    heap_sizes: u8,
    rows: [u32; TABLE_COUNT],
}

impl TableLayout {
    fn heap_width(&self, flag: u8) -> usize {
        if self.heap_sizes & flag != 0 {
            4
        } else {
            2
        }
    }

    fn column_width(&self, column: Column) -> usize {
        match column {
            Column::Fixed(width) => width,
            Column::Strings => self.heap_width(HEAP_STRINGS_WIDE),
            Column::Guid => self.heap_width(HEAP_GUID_WIDE),
            Column::Blob => self.heap_width(HEAP_BLOB_WIDE),
            Column::Table(table) => {
                if self.rows[table] < 1 << 16 {
                    2
                } else {
                    4
                }
            }
            Column::Coded(coded) => {
                let max_rows = coded
                    .tables()
                    .iter()
                    .map(|&table| self.rows[table])
                    .max()
                    .unwrap_or(0);
                if max_rows < 1 << (16 - coded.tag_bits()) {
                    2
                } else {
                    4
                }
            }
        }
    }

    fn row_width(&self, table: usize) -> usize {
        table_schema(table)
            .iter()
            .map(|&column| self.column_width(column))
            .sum()
    }
}

struct Streams<'a> {
    tables: &'a [u8],
    strings: &'a [u8],
}

fn locate_streams(metadata: &[u8]) -> Result<Streams<'_>, ReadError> {
    const TRUNCATED: ReadError = ReadError::Metadata("truncated metadata root");

    if le_u32(metadata, 0) != Some(METADATA_SIGNATURE) {
        return Err(ReadError::Metadata("bad metadata signature"));
    }
    let version_length = le_u32(metadata, 12).ok_or(TRUNCATED)? as usize;
    let mut offset = 16usize
        .checked_add(version_length)
        .ok_or(TRUNCATED)?;
    // Flags u16, then stream count
    let stream_count = le_u16(metadata, offset + 2).ok_or(TRUNCATED)?;
    offset += 4;

    let mut tables = None;
    let mut strings = None;
    for _ in 0..stream_count {
        let stream_offset = le_u32(metadata, offset).ok_or(TRUNCATED)? as usize;
        let stream_size = le_u32(metadata, offset + 4).ok_or(TRUNCATED)? as usize;
        let name_start = offset + 8;
        let name_len = metadata
            .get(name_start..)
            .and_then(|rest| rest.iter().position(|&b| b == 0))
            .ok_or(TRUNCATED)?;
        let name = &metadata[name_start..name_start + name_len];
        offset = align4(name_start + name_len + 1);

        let body = metadata
            .get(stream_offset..stream_offset.saturating_add(stream_size))
            .ok_or(ReadError::Metadata("stream outside metadata"))?;
        match name {
            b"#~" | b"#-" => tables = Some(body),
            b"#Strings" => strings = Some(body),
            _ => {}
        }
    }

    Ok(Streams {
        tables: tables.ok_or(ReadError::Metadata("no table stream"))?,
        strings: strings.ok_or(ReadError::Metadata("no #Strings heap"))?,
    })
}

fn heap_string(strings: &[u8], index: usize) -> Result<String, ReadError> {
    let rest = strings
        .get(index..)
        .ok_or(ReadError::Metadata("string index outside #Strings"))?;
    let end = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(ReadError::Metadata("unterminated string"))?;
    std::str::from_utf8(&rest[..end])
        .map(str::to_owned)
        .map_err(|_| ReadError::Metadata("string is not UTF-8"))
}

/// Name column of the first `Assembly` row, or `None` for metadata without one
/// (a bare netmodule).
pub fn assembly_name(metadata: &[u8]) -> Result<Option<String>, ReadError> {
    const TRUNCATED: ReadError = ReadError::Metadata("truncated table stream");

    let streams = locate_streams(metadata)?;
    let tables = streams.tables;

    let heap_sizes = *tables.get(6).ok_or(TRUNCATED)?;
    let valid = le_u64(tables, 8).ok_or(TRUNCATED)?;

    let mut rows = [0u32; TABLE_COUNT];
    let mut offset = 24;
    for (table, count) in rows.iter_mut().enumerate() {
        if valid & (1u64 << table) != 0 {
            *count = le_u32(tables, offset).ok_or(TRUNCATED)?;
            offset += 4;
        }
    }
    if heap_sizes & HEAP_EXTRA_DATA != 0 {
        offset += 4;
    }

    if rows[ASSEMBLY_TABLE] == 0 {
        return Ok(None);
    }

    let layout = TableLayout { heap_sizes, rows };
    for table in 0..ASSEMBLY_TABLE {
        offset += layout.row_width(table) * layout.rows[table] as usize;
    }

    // HashAlgId, four version parts, Flags, PublicKey, then Name
    let name_column = offset + 4 + 8 + 4 + layout.heap_width(HEAP_BLOB_WIDE);
    let name_index = match layout.heap_width(HEAP_STRINGS_WIDE) {
        4 => le_u32(tables, name_column).map(|index| index as usize),
        _ => le_u16(tables, name_column).map(usize::from),
    };
    let name_index = name_index.ok_or(TRUNCATED)?;

    heap_string(streams.strings, name_index).map(Some)
}
