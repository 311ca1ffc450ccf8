use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::debug;
use tw_pack::primitives::{read_length_prefixed_string, remaining, write_length_prefixed_string};
use tw_pack::StringEncoding;

use crate::error::{Error, Result};

/// Marks a length prefixed UTF-16 GUID
pub const GUID_MARKER: u32 = 0xFFFC_FEFD;
/// Marks a 4-byte table version
pub const VERSION_MARKER: u32 = 0xFFFE_FDFC;

/// Leading block of a DB table
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TableHeader {
    /// Empty when the table carries no GUID block
    pub guid: String,
    pub version: i32,
    /// Row count as declared by the file
    pub entry_count: u32,
    pub has_version_marker: bool,
}

impl TableHeader {
    /// Read a header, leaving the reader at the first row.
    ///
    /// Reading never fails: anything unexpected yields [`TableHeader::default`] and the reader is
    /// rewound to where it started.
    pub fn read<R: Read + Seek>(reader: &mut R) -> TableHeader {
        let start = reader.stream_position().unwrap_or(0);
        match Self::try_read(reader) {
            Ok(header) => header,
            Err(e) => {
                debug!("unreadable table header, assuming none: {}", e);
                let _ = reader.seek(SeekFrom::Start(start));
                TableHeader::default()
            }
        }
    }

    fn try_read<R: Read + Seek>(reader: &mut R) -> Result<TableHeader> {
        let mut header = TableHeader::default();
        let mut lead = reader.read_u8()?;
        while lead == 0xFC || lead == 0xFD {
            let mut rest = [0u8; 3];
            reader.read_exact(&mut rest)?;
            let marker = u32::from_le_bytes([lead, rest[0], rest[1], rest[2]]);
            match marker {
                GUID_MARKER => {
                    header.guid = read_length_prefixed_string(reader, StringEncoding::Utf16)?;
                }
                VERSION_MARKER => {
                    header.version = reader.read_i32::<LittleEndian>()?;
                    header.has_version_marker = true;
                }
                other => {
                    return Err(Error::SchemaMismatch(format!(
                        "unknown table marker {other:#010x}"
                    )))
                }
            }
            lead = reader.read_u8()?;
        }

        let (position, left) = remaining(reader)?;
        if left < 4 {
            return Err(Error::TruncatedField {
                needed: 4,
                remaining: left,
                position,
            });
        }
        header.entry_count = reader.read_u32::<LittleEndian>()?;
        Ok(header)
    }

    /// Number of bytes the header occupies when written
    pub fn length(&self) -> usize {
        let mut length = 5;
        if !self.guid.is_empty() {
            length += 4 + 2 + StringEncoding::Utf16.encoded_len(&self.guid);
        }
        if self.has_version_marker {
            length += 8;
        }
        length
    }

    /// Write the header for a table of `row_count` rows.
    ///
    /// The declared count is always the one given, not [`TableHeader::entry_count`].
    pub fn write<W: Write>(&self, writer: &mut W, row_count: u32) -> Result<()> {
        if !self.guid.is_empty() {
            writer.write_u32::<LittleEndian>(GUID_MARKER)?;
            write_length_prefixed_string(writer, &self.guid, StringEncoding::Utf16)?;
        }
        if self.has_version_marker {
            writer.write_u32::<LittleEndian>(VERSION_MARKER)?;
            writer.write_i32::<LittleEndian>(self.version)?;
        }
        writer.write_u8(1)?;
        writer.write_u32::<LittleEndian>(row_count)?;
        Ok(())
    }
}
