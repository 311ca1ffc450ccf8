//! Base types for structure of PACK file.

use binrw::{BinRead, BinWrite, NullString};
use bon::Builder;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use derive_more::derive::Display;
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::warn;

use crate::error::{Error, Result};
use crate::primitives::{read_zero_terminated_ascii, write_zero_terminated_ascii};

/// Precedence given to packs created from scratch
pub const DEFAULT_PRECEDENCE: u8 = 3;

/// Bit of the precedence byte marking 8 bytes of extra info per index record
pub const ADDITIONAL_INFO_FLAG: u8 = 0x40;

const PACK_TYPE_MASK: u8 = 0x07;

/// Identifier at the start of every pack, selects the header layout
#[derive(Debug, Display, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PackTag {
    #[display("PFH0")]
    Pfh0,
    #[display("PFH2")]
    Pfh2,
    #[default]
    #[display("PFH3")]
    Pfh3,
    #[display("PFH4")]
    Pfh4,
    #[display("PFH5")]
    Pfh5,
}

impl PackTag {
    pub const fn magic(self) -> [u8; 4] {
        match self {
            PackTag::Pfh0 => *b"PFH0",
            PackTag::Pfh2 => *b"PFH2",
            PackTag::Pfh3 => *b"PFH3",
            PackTag::Pfh4 => *b"PFH4",
            PackTag::Pfh5 => *b"PFH5",
        }
    }

    /// Offset of the replaced pack names, directly after the fixed header fields
    pub const fn header_length(self) -> u64 {
        match self {
            PackTag::Pfh0 => 0x18,
            PackTag::Pfh2 | PackTag::Pfh3 => 0x20,
            PackTag::Pfh4 | PackTag::Pfh5 => 0x1C,
        }
    }

    /// PFH2 and PFH3 store an 8 byte file time at 0x18
    pub const fn has_file_time(self) -> bool {
        matches!(self, PackTag::Pfh2 | PackTag::Pfh3)
    }

    /// PFH4 and PFH5 store a reserved 4 byte word at 0x18
    pub const fn has_reserved_word(self) -> bool {
        matches!(self, PackTag::Pfh4 | PackTag::Pfh5)
    }

    /// PFH5 index records carry one pad byte after the size
    pub const fn pads_index_records(self) -> bool {
        matches!(self, PackTag::Pfh5)
    }
}

impl TryFrom<[u8; 4]> for PackTag {
    type Error = Error;

    fn try_from(value: [u8; 4]) -> Result<Self> {
        match &value {
            b"PFH0" => Ok(PackTag::Pfh0),
            b"PFH2" => Ok(PackTag::Pfh2),
            b"PFH3" => Ok(PackTag::Pfh3),
            b"PFH4" => Ok(PackTag::Pfh4),
            b"PFH5" => Ok(PackTag::Pfh5),
            _ => Err(Error::UnknownContainerFormat(
                String::from_utf8_lossy(&value).into_owned(),
            )),
        }
    }
}

/// Load order category stored in the low three bits of the precedence byte
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PackType {
    Boot,
    Release,
    Patch,
    Mod,
    Movie,
    #[display("Other({_0})")]
    Other(u8),
}

impl From<u8> for PackType {
    fn from(precedence: u8) -> Self {
        match precedence & PACK_TYPE_MASK {
            0 => PackType::Boot,
            1 => PackType::Release,
            2 => PackType::Patch,
            3 => PackType::Mod,
            4 => PackType::Movie,
            other => PackType::Other(other),
        }
    }
}

impl From<PackType> for u8 {
    fn from(value: PackType) -> Self {
        match value {
            PackType::Boot => 0,
            PackType::Release => 1,
            PackType::Patch => 2,
            PackType::Mod => 3,
            PackType::Movie => 4,
            PackType::Other(bits) => bits & PACK_TYPE_MASK,
        }
    }
}

/// PACK file header
///
/// All integers are little endian. `file_count` and `index_size` describe the index as it was
/// read and are recomputed whenever a pack is written.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct PackHeader {
    /// Selects the header layout
    #[builder(default)]
    pub tag: PackTag,

    /// Pack type in the low three bits, [`ADDITIONAL_INFO_FLAG`] for extra index info
    #[builder(default = DEFAULT_PRECEDENCE)]
    pub precedence: u8,

    /// Names of the packs this one replaces, their count is the header version
    #[builder(default)]
    pub replaced_pack_names: Vec<String>,

    /// Only stored for PFH2 and PFH3
    #[builder(default)]
    pub file_time: u64,

    /// Only stored for PFH4 and PFH5
    #[builder(default)]
    pub reserved: u32,

    /// Number of index records
    #[builder(default)]
    pub file_count: u32,

    /// Byte size of the index block
    #[builder(default)]
    pub index_size: u32,
}

impl Default for PackHeader {
    fn default() -> Self {
        PackHeader::builder().build()
    }
}

impl PackHeader {
    pub fn header_length(&self) -> u64 {
        self.tag.header_length()
    }

    /// The version field, equal to the number of replaced pack names
    pub fn version(&self) -> usize {
        self.replaced_pack_names.len()
    }

    /// Byte length of the replaced names block including terminators
    ///
    /// Names are stored with one byte per character.
    pub fn replaced_names_length(&self) -> u64 {
        self.replaced_pack_names
            .iter()
            .map(|n| n.chars().count() as u64 + 1)
            .sum()
    }

    /// Offset of the first byte of entry data
    pub fn data_start(&self) -> u64 {
        self.header_length() + self.replaced_names_length() + self.index_size as u64
    }

    pub fn pack_type(&self) -> PackType {
        PackType::from(self.precedence)
    }

    pub fn set_pack_type(&mut self, pack_type: PackType) {
        self.precedence = (self.precedence & !PACK_TYPE_MASK) | u8::from(pack_type);
    }

    /// Whether index records carry 8 bytes of extra info
    pub fn has_additional_info(&self) -> bool {
        self.precedence & ADDITIONAL_INFO_FLAG != 0
    }

    pub fn set_additional_info(&mut self, enabled: bool) {
        if enabled {
            self.precedence |= ADDITIONAL_INFO_FLAG;
        } else {
            self.precedence &= !ADDITIONAL_INFO_FLAG;
        }
    }

    /// Read the fixed fields and the replaced pack names.
    ///
    /// The reader is left at the start of the index block.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<PackHeader> {
        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|e| Error::MalformedHeader(format!("reading tag: {e}")))?;
        let tag = PackTag::try_from(magic)?;

        let fixed = (|| -> std::io::Result<_> {
            let precedence = reader.read_i32::<LittleEndian>()? as u8;
            let version = reader.read_i32::<LittleEndian>()?;
            let replaced_length = reader.read_i32::<LittleEndian>()?;
            reader.seek(SeekFrom::Start(0x10))?;
            let file_count = reader.read_u32::<LittleEndian>()?;
            let index_size = reader.read_u32::<LittleEndian>()?;
            let file_time = if tag.has_file_time() {
                reader.read_u64::<LittleEndian>()?
            } else {
                0
            };
            let reserved = if tag.has_reserved_word() {
                reader.read_u32::<LittleEndian>()?
            } else {
                0
            };
            Ok((precedence, version, replaced_length, file_count, index_size, file_time, reserved))
        })()
        .map_err(|e| Error::MalformedHeader(format!("reading {tag} fields: {e}")))?;
        let (precedence, version, replaced_length, file_count, index_size, file_time, reserved) =
            fixed;

        if version < 0 {
            return Err(Error::MalformedHeader(format!(
                "negative replaced pack count {version}"
            )));
        }

        reader.seek(SeekFrom::Start(tag.header_length()))?;
        let replaced_pack_names = (0..version)
            .map(|_| read_zero_terminated_ascii(reader))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| Error::MalformedHeader(format!("reading replaced pack names: {e}")))?;

        let header = PackHeader {
            tag,
            precedence,
            replaced_pack_names,
            file_time,
            reserved,
            file_count,
            index_size,
        };

        if header.replaced_names_length() != replaced_length as u64 {
            warn!(
                "replaced names block is {} bytes but header declares {}",
                header.replaced_names_length(),
                replaced_length
            );
        }

        Ok(header)
    }

    /// Write the fixed fields and the replaced pack names.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.tag.magic())?;
        writer.write_i32::<LittleEndian>(self.precedence as i32)?;
        writer.write_i32::<LittleEndian>(self.version() as i32)?;
        writer.write_u32::<LittleEndian>(self.replaced_names_length() as u32)?;
        writer.write_u32::<LittleEndian>(self.file_count)?;
        writer.write_u32::<LittleEndian>(self.index_size)?;
        if self.tag.has_file_time() {
            writer.write_u64::<LittleEndian>(self.file_time)?;
        }
        if self.tag.has_reserved_word() {
            writer.write_u32::<LittleEndian>(self.reserved)?;
        }
        for name in &self.replaced_pack_names {
            write_zero_terminated_ascii(writer, name)?;
        }
        Ok(())
    }
}

/// PACK index record
///
/// Paths use `\` separators on disk.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
#[br(import(has_additional_info: bool, padded: bool))]
pub struct IndexRecord {
    /// Byte size of the entry data
    pub size: u32,

    #[br(if(has_additional_info))]
    pub extra_info: Option<u64>,

    #[br(if(padded))]
    pub padding: Option<u8>,

    pub path: NullString,
}

impl IndexRecord {
    /// Bytes this record occupies in the index block
    pub fn encoded_len(&self) -> u64 {
        4 + self.extra_info.map_or(0, |_| 8)
            + self.padding.map_or(0, |_| 1)
            + self.path.len() as u64
            + 1
    }

    /// Entry path with `/` separators
    pub fn normalized_path(&self) -> String {
        self.path
            .iter()
            .map(|&b| if b == b'\\' { '/' } else { char::from(b) })
            .collect()
    }
}
