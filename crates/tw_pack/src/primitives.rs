//! Low level string and blob encodings shared by the pack index and DB tables.
//!
//! Length prefixed strings carry a 16-bit count in front of the encoded bytes. For
//! [`StringEncoding::Utf16`] the count is in code units, for [`StringEncoding::Utf8`]
//! it is in bytes. Existing game data depends on this difference so both directions
//! keep it.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use derive_more::derive::Display;
use std::io::{Read, Seek, SeekFrom, Write};
use widestring::U16String;

use crate::error::{Error, Result};

/// Character encoding of a length prefixed string
#[derive(Debug, Display, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StringEncoding {
    /// UTF-16LE, prefix counts code units
    #[default]
    #[display("utf-16")]
    Utf16,
    /// UTF-8, prefix counts bytes
    #[display("utf-8")]
    Utf8,
}

impl StringEncoding {
    /// Number of bytes `value` occupies once encoded, without the prefix
    pub fn encoded_len(self, value: &str) -> usize {
        match self {
            StringEncoding::Utf16 => value.encode_utf16().count() * 2,
            StringEncoding::Utf8 => value.len(),
        }
    }

    /// The count stored in the 16-bit prefix for `value`
    pub fn prefix_count(self, value: &str) -> usize {
        match self {
            StringEncoding::Utf16 => value.encode_utf16().count(),
            StringEncoding::Utf8 => value.len(),
        }
    }
}

/// Returns the current position and the number of bytes left in the stream.
pub fn remaining<S: Seek>(stream: &mut S) -> Result<(u64, u64)> {
    let position = stream.stream_position()?;
    let end = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(position))?;
    Ok((position, end.saturating_sub(position)))
}

fn ensure_available<S: Seek>(stream: &mut S, needed: u64) -> Result<()> {
    let (position, remaining) = remaining(stream)?;
    if remaining < needed {
        return Err(Error::TruncatedData {
            needed,
            remaining,
            position,
        });
    }
    Ok(())
}

/// Read a string prefixed by its 16-bit length.
pub fn read_length_prefixed_string<R: Read + Seek>(
    reader: &mut R,
    encoding: StringEncoding,
) -> Result<String> {
    ensure_available(reader, 2)?;
    let count = reader.read_u16::<LittleEndian>()? as usize;

    match encoding {
        StringEncoding::Utf16 => {
            ensure_available(reader, count as u64 * 2)?;
            let mut units = vec![0u16; count];
            reader.read_u16_into::<LittleEndian>(&mut units)?;
            Ok(U16String::from_vec(units).to_string_lossy())
        }
        StringEncoding::Utf8 => {
            ensure_available(reader, count as u64)?;
            let mut bytes = vec![0u8; count];
            reader.read_exact(&mut bytes)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

/// Write `value` prefixed by its 16-bit length. The value is written as given.
pub fn write_length_prefixed_string<W: Write>(
    writer: &mut W,
    value: &str,
    encoding: StringEncoding,
) -> Result<()> {
    let count = encoding.prefix_count(value);
    let prefix = u16::try_from(count).map_err(|_| Error::StringTooLong { length: count })?;
    writer.write_u16::<LittleEndian>(prefix)?;

    match encoding {
        StringEncoding::Utf16 => {
            for unit in value.encode_utf16() {
                writer.write_u16::<LittleEndian>(unit)?;
            }
        }
        StringEncoding::Utf8 => writer.write_all(value.as_bytes())?,
    }
    Ok(())
}

/// Read single byte characters up to and including a `0x00` terminator.
pub fn read_zero_terminated_ascii<R: Read>(reader: &mut R) -> Result<String> {
    let mut raw = Vec::new();
    loop {
        let byte = reader.read_u8()?;
        if byte == b'\0' {
            break;
        }
        raw.push(byte);
    }
    Ok(raw.into_iter().map(char::from).collect())
}

/// Encode `value` as single byte characters, replacing anything outside ASCII with `?`.
pub fn ascii_bytes(value: &str) -> Vec<u8> {
    value
        .chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect()
}

/// Write single byte characters followed by a `0x00` terminator.
pub fn write_zero_terminated_ascii<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    writer.write_all(&ascii_bytes(value))?;
    writer.write_u8(0)?;
    Ok(())
}

/// Read exactly `len` raw bytes.
pub fn read_blob<R: Read + Seek>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    ensure_available(reader, len as u64)?;
    let mut buffer = vec![0u8; len];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Write raw bytes as they are.
pub fn write_blob<W: Write>(writer: &mut W, data: &[u8]) -> Result<()> {
    writer.write_all(data)?;
    Ok(())
}
