//! Bounds-checked little-endian reads over raw image bytes.

pub fn le_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub fn le_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub fn le_u64(data: &[u8], offset: usize) -> Option<u64> {
    let lo = le_u32(data, offset)? as u64;
    let hi = le_u32(data, offset.checked_add(4)?)? as u64;
    Some(lo | (hi << 32))
}

pub fn align4(offset: usize) -> usize {
    (offset + 3) & !3
}
