//! Types for reading PACK files
//!

use binrw::BinRead;
use indexmap::IndexMap;
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, instrument, warn};

use crate::{
    error::{Error, FileNotFoundError, Result},
    primitives::remaining,
    types::{IndexRecord, PackHeader},
};

/// Location of one entry in a PACK file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackEntryData {
    /// Path with `/` separators
    pub path: Box<str>,
    /// Byte size of the data
    pub size: u64,
    /// Offset of the data from the start of the file
    pub data_start: u64,
    /// Extra info word, present when the header flags it
    pub extra_info: Option<u64>,
}

/// PACK file reader
///
/// Decodes the header and index up front. Entry data is only read on request.
///
/// ```no_run
/// use std::io::prelude::*;
///
/// fn list_pack_contents(reader: impl Read + Seek) -> tw_pack::error::Result<()> {
///     let mut pack = tw_pack::PackReader::new(reader)?;
///
///     for i in 0..pack.len() {
///         let name = pack.name_for_index(i).unwrap_or_default().to_owned();
///         let data = pack.by_index(i)?;
///         println!("{}: {} bytes", name, data.len());
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct PackReader<R> {
    reader: R,
    header: PackHeader,
    entries: IndexMap<Box<str>, PackEntryData>,
}

impl<R: Read + Seek> PackReader<R> {
    /// Read the header and index of a PACK file.
    #[instrument(skip_all, err)]
    pub fn new(mut reader: R) -> Result<PackReader<R>> {
        reader.seek(SeekFrom::Start(0))?;
        let header = PackHeader::read(&mut reader)?;
        debug!(
            "{} pack, type {}, {} entries in {} index bytes",
            header.tag,
            header.pack_type(),
            header.file_count,
            header.index_size
        );

        let records = Self::read_records(&mut reader, &header)?;

        let index_end = reader.stream_position()?;
        if index_end != header.data_start() {
            warn!(
                "index ends at {:#x} but data is declared to start at {:#x}",
                index_end,
                header.data_start()
            );
        }

        let mut entries = IndexMap::with_capacity(records.len());
        let mut offset = header.data_start();
        for record in records {
            let entry = PackEntryData {
                path: record.normalized_path().into(),
                size: record.size as u64,
                data_start: offset,
                extra_info: record.extra_info,
            };
            offset += entry.size;
            if entries.insert(entry.path.clone(), entry).is_some() {
                warn!("duplicate index entry, keeping the last one");
            }
        }

        reader.seek(SeekFrom::Start(0))?;
        let (_, length) = remaining(&mut reader)?;
        if offset > length {
            return Err(Error::TruncatedData {
                needed: offset - header.data_start(),
                remaining: length.saturating_sub(header.data_start()),
                position: header.data_start(),
            });
        }

        Ok(PackReader {
            reader,
            header,
            entries,
        })
    }

    fn read_records(reader: &mut R, header: &PackHeader) -> Result<Vec<IndexRecord>> {
        let has_additional_info = header.has_additional_info();
        let padded = header.tag.pads_index_records();

        (0..header.file_count)
            .map(|entry| {
                IndexRecord::read_args(&mut *reader, (has_additional_info, padded))
                    .map_err(|source| Error::MalformedIndex { entry, source })
            })
            .collect()
    }

    pub fn header(&self) -> &PackHeader {
        &self.header
    }

    /// Number of entries contained in this PACK.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this PACK contains no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator over all the entry paths, in index order.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_ref())
    }

    /// Returns an iterator over the location of every entry, in index order.
    pub fn entries(&self) -> impl Iterator<Item = &PackEntryData> {
        self.entries.values()
    }

    /// Get the index of an entry by path, if it's present.
    #[inline(always)]
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.entries.get_index_of(name)
    }

    /// Get the path of an entry, if it's present.
    #[inline(always)]
    pub fn name_for_index(&self, index: usize) -> Option<&str> {
        self.entries
            .get_index(index)
            .map(|(name, _)| name.as_ref())
    }

    /// Read the data of an entry by path
    pub fn by_name(&mut self, name: &str) -> Result<Vec<u8>> {
        let Some(index) = self.entries.get_index_of(name) else {
            return Err(Error::FileNotFound(FileNotFoundError::Path(name.to_owned())));
        };
        self.by_index(index)
    }

    /// Read the data of an entry by index
    pub fn by_index(&mut self, index: usize) -> Result<Vec<u8>> {
        let (_, entry) = self
            .entries
            .get_index(index)
            .ok_or(Error::FileNotFound(FileNotFoundError::Index(index)))?;

        self.reader.seek(SeekFrom::Start(entry.data_start))?;
        let mut buffer = vec![0u8; entry.size as usize];
        self.reader.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }
}
