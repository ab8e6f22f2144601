//! Length-prefixed strings found in list mode file headers.
//!
//! Two encodings are in use. Archive strings (version, file path, comment) carry an
//! escalating length prefix: one byte, then `0xFF` followed by a `u16`, then `0xFFFF`
//! followed by a `u32`, then `0xFFFF_FFFF` followed by a `u64`. The `u16` value `0xFFFE`
//! right after the first escape marks a wide (UTF-16) string whose own prefix follows.
//! Everything else (DAQ info, file names, source strings) is a "counted" string: an `i32`
//! byte length and the raw bytes.
//!
//! Narrow strings map bytes to chars one to one (Latin-1), so any byte sequence read from
//! a file is written back unchanged.
use std::io::{Read, Seek, Write};

use super::cursor::ByteCursor;

const BYTE_ESCAPE: u8 = 0xFF;
const WIDE_MARKER: u16 = 0xFFFE;
const WORD_ESCAPE: u16 = 0xFFFF;
const DWORD_ESCAPE: u32 = 0xFFFF_FFFF;

/// Number of prefix bytes used to encode a length (wide marker not included)
pub fn prefix_size(len: u64) -> usize {
    if len < BYTE_ESCAPE as u64 {
        1
    } else if len < WIDE_MARKER as u64 {
        3
    } else if len < DWORD_ESCAPE as u64 {
        7
    } else {
        15
    }
}

/// Decode an escalating length prefix. Returns the length in characters and whether the
/// string is wide.
pub fn read_length_prefix<T: Read + Seek>(
    cursor: &mut ByteCursor<T>,
) -> std::io::Result<(u64, bool)> {
    let mut wide = false;
    loop {
        let byte = cursor.read_u8()?;
        if byte < BYTE_ESCAPE {
            return Ok((byte as u64, wide));
        }
        let word = cursor.read_u16()?;
        if word == WIDE_MARKER && !wide {
            wide = true;
            continue;
        }
        if word < WORD_ESCAPE {
            return Ok((word as u64, wide));
        }
        let dword = cursor.read_u32()?;
        if dword < DWORD_ESCAPE {
            return Ok((dword as u64, wide));
        }
        return Ok((cursor.read_u64()?, wide));
    }
}

/// Emit the smallest prefix that represents `len`
pub fn write_length_prefix<T: Write + Seek>(
    cursor: &mut ByteCursor<T>,
    len: u64,
    wide: bool,
) -> std::io::Result<()> {
    if wide {
        cursor.write_u8(BYTE_ESCAPE)?;
        cursor.write_u16(WIDE_MARKER)?;
    }
    if len < BYTE_ESCAPE as u64 {
        return cursor.write_u8(len as u8);
    }
    cursor.write_u8(BYTE_ESCAPE)?;
    if len < WIDE_MARKER as u64 {
        return cursor.write_u16(len as u16);
    }
    cursor.write_u16(WORD_ESCAPE)?;
    if len < DWORD_ESCAPE as u64 {
        return cursor.write_u32(len as u32);
    }
    cursor.write_u32(DWORD_ESCAPE)?;
    cursor.write_u64(len)
}

pub fn read_cstring<T: Read + Seek>(cursor: &mut ByteCursor<T>) -> std::io::Result<String> {
    let (len, wide) = read_length_prefix(cursor)?;
    if wide {
        let bytes = cursor.read_vec(len.saturating_mul(2))?;
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(String::from_utf16_lossy(&units))
    } else {
        let bytes = cursor.read_vec(len)?;
        Ok(latin1_to_string(&bytes))
    }
}

pub fn write_cstring<T: Write + Seek>(
    cursor: &mut ByteCursor<T>,
    value: &str,
) -> std::io::Result<()> {
    match string_to_latin1(value) {
        Some(bytes) => {
            write_length_prefix(cursor, bytes.len() as u64, false)?;
            cursor.write_bytes(&bytes)
        }
        None => {
            let units: Vec<u16> = value.encode_utf16().collect();
            write_length_prefix(cursor, units.len() as u64, true)?;
            for unit in units {
                cursor.write_u16(unit)?;
            }
            Ok(())
        }
    }
}

/// Encoded size of a string written with [`write_cstring`]
pub fn cstring_size(value: &str) -> u64 {
    match string_to_latin1(value) {
        Some(bytes) => prefix_size(bytes.len() as u64) as u64 + bytes.len() as u64,
        None => {
            let units = value.encode_utf16().count() as u64;
            3 + prefix_size(units) as u64 + 2 * units
        }
    }
}

pub fn read_counted_string<T: Read + Seek>(
    cursor: &mut ByteCursor<T>,
) -> std::io::Result<String> {
    let len = cursor.read_i32()?;
    if len < 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("negative string length {len}"),
        ));
    }
    let bytes = cursor.read_vec(len as u64)?;
    Ok(latin1_to_string(&bytes))
}

pub fn write_counted_string<T: Write + Seek>(
    cursor: &mut ByteCursor<T>,
    value: &str,
) -> std::io::Result<()> {
    let bytes = string_to_latin1_lossy(value);
    cursor.write_i32(bytes.len() as i32)?;
    cursor.write_bytes(&bytes)
}

/// `u32` count followed by that many counted strings
pub fn read_string_array<T: Read + Seek>(
    cursor: &mut ByteCursor<T>,
) -> std::io::Result<Vec<String>> {
    let count = cursor.read_u32()?;
    let mut strings = Vec::new();
    for _ in 0..count {
        strings.push(read_counted_string(cursor)?);
    }
    Ok(strings)
}

pub fn write_string_array<T: Write + Seek>(
    cursor: &mut ByteCursor<T>,
    strings: &[String],
) -> std::io::Result<()> {
    cursor.write_u32(strings.len() as u32)?;
    for value in strings {
        write_counted_string(cursor, value)?;
    }
    Ok(())
}

fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| *b as char).collect()
}

fn string_to_latin1(value: &str) -> Option<Vec<u8>> {
    value
        .chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect()
}

fn string_to_latin1_lossy(value: &str) -> Vec<u8> {
    value
        .chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}
