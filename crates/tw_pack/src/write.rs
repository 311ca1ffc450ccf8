//! Types for writing PACK files
//!

use binrw::{BinWrite, NullString};
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

use crate::entry::PackedFile;
use crate::error::{Error, Result};
use crate::pack::PackFile;
use crate::primitives::ascii_bytes;
use crate::source::DataSource;
use crate::types::{IndexRecord, PackHeader};

/// Where an entry's data ended up in an encoded pack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedEntry {
    /// Path with `/` separators
    pub path: String,
    /// Offset of the data from the start of the pack
    pub offset: u64,
    pub size: u64,
}

/// Summary of an encoded pack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPack {
    /// Header as written, with the recomputed entry count and index size
    pub header: PackHeader,
    /// Entries in the order they were written
    pub entries: Vec<EncodedEntry>,
}

/// Encode `pack` into `writer`.
///
/// Deleted entries are left out. The rest are written ordered by their on-disk path, which
/// uses `\` separators and ordinal comparison, so the output does not depend on how the tree
/// was built.
#[instrument(skip_all, err)]
pub fn encode<W: Write>(pack: &PackFile, writer: &mut W) -> Result<EncodedPack> {
    let mut files: Vec<(Vec<u8>, String, &PackedFile)> = pack
        .all_files()
        .into_iter()
        .filter(|(_, f)| !f.is_deleted())
        .map(|(path, f)| (ascii_bytes(&path.replace('/', "\\")), path, f))
        .collect();
    files.sort_by(|(a, _, _), (b, _, _)| a.cmp(b));

    let mut header = pack.header().clone();
    let has_additional_info = header.has_additional_info();
    let padded = header.tag.pads_index_records();

    let records = files
        .iter()
        .map(|(disk_path, path, file)| {
            let size = u32::try_from(file.size()).map_err(|_| Error::EntryTooLarge {
                path: path.clone(),
                size: file.size(),
            })?;
            Ok(IndexRecord {
                size,
                extra_info: has_additional_info.then_some(file.extra_info()),
                padding: padded.then_some(0),
                path: NullString(disk_path.clone()),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let index_size: u64 = records.iter().map(IndexRecord::encoded_len).sum();
    header.file_count = records.len() as u32;
    header.index_size = u32::try_from(index_size).map_err(|_| Error::EntryTooLarge {
        path: "<index>".into(),
        size: index_size,
    })?;

    debug!(
        "writing {} entries with {} index bytes",
        header.file_count, header.index_size
    );

    let mut index = Cursor::new(Vec::with_capacity(index_size as usize));
    for record in &records {
        record.write(&mut index)?;
    }

    header.write(writer)?;
    writer.write_all(index.get_ref())?;

    let mut offset = header.data_start();
    let mut entries = Vec::with_capacity(files.len());
    for ((_, path, file), record) in files.iter().zip(&records) {
        let size = record.size as u64;
        if size > 0 {
            let data = file.data()?;
            if data.len() as u64 != size {
                return Err(Error::TruncatedData {
                    needed: size,
                    remaining: data.len() as u64,
                    position: 0,
                });
            }
            writer.write_all(&data)?;
        }
        entries.push(EncodedEntry {
            path: path.clone(),
            offset,
            size,
        });
        offset += size;
    }

    Ok(EncodedPack { header, entries })
}

impl PackFile {
    /// Encode into a byte buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        encode(self, &mut buffer)?;
        Ok(buffer)
    }

    /// Write the pack back to its own path.
    ///
    /// The pack is first written to a temporary file next to the target which then replaces
    /// it, so a failed save leaves the original untouched. Afterwards entries read from the
    /// new file, deleted entries are gone and the pack is no longer modified.
    pub fn save(&mut self) -> Result<()> {
        let target = self.path().to_path_buf();
        self.save_to(&target)
    }

    /// Write the pack to `path` and make that its new location.
    ///
    /// The location only changes once the write succeeded.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let target = path.as_ref().to_path_buf();
        self.save_to(&target)?;
        self.relocate(target);
        Ok(())
    }

    #[instrument(skip(self), fields(target = %target.display()), err)]
    fn save_to(&mut self, target: &Path) -> Result<()> {
        let directory = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut staged = NamedTempFile::new_in(&directory)?;
        let encoded = {
            let mut writer = BufWriter::new(staged.as_file_mut());
            let encoded = encode(self, &mut writer)?;
            writer.flush()?;
            encoded
        };
        staged.as_file().sync_all()?;
        staged.persist(target).map_err(|e| Error::IOError(e.error))?;

        self.apply_saved(target, encoded);
        info!("saved {} files to {}", self.file_count(), target.display());
        Ok(())
    }

    fn apply_saved(&mut self, target: &Path, encoded: EncodedPack) {
        for entry in encoded.entries {
            if let Some(file) = self.root_mut().get_file_mut(&entry.path) {
                file.repoint(DataSource::Packed {
                    path: target.to_path_buf(),
                    offset: entry.offset,
                    size: entry.size,
                });
            }
        }
        *self.header_mut_quiet() = encoded.header;
        self.mark_saved();
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_str_eq;
    use tracing_test::traced_test;

    use crate::entry::PackedFile;
    use crate::error::Result;
    use crate::pack::PackFile;
    use crate::types::{PackHeader, PackTag};
    use crate::write::encode;

    #[traced_test]
    #[test]
    fn pfh0_empty_write() -> Result<()> {
        #[rustfmt::skip]
        let expected = vec![
            b'P', b'F', b'H', b'0',
            0x03, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ];

        let pack = PackFile::with_header(
            "empty.pack",
            PackHeader::builder().tag(PackTag::Pfh0).build(),
        );

        let mut actual = Vec::new();
        encode(&pack, &mut actual)?;
        assert_str_eq!(format!("{:02X?}", actual), format!("{:02X?}", expected));

        Ok(())
    }

    #[traced_test]
    #[test]
    fn pfh5_write_sorts_and_pads() -> Result<()> {
        #[rustfmt::skip]
        let expected = vec![
            // Header
            b'P', b'F', b'H', b'5',
            0x03, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0x18, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            // Index
            0x04, 0x00, 0x00, 0x00, 0x00, b'a', b'\\', b'x', b'.', b't', b'x', b't', 0x00,
            0x02, 0x00, 0x00, 0x00, 0x00, b'b', b'.', b't', b'x', b't', 0x00,
            // Data
            b'a', b'b', b'c', b'd',
            b'e', b'f',
        ];

        let mut pack = PackFile::with_header(
            "test.pack",
            PackHeader::builder().tag(PackTag::Pfh5).build(),
        );
        pack.add_file("b.txt", PackedFile::from_bytes("b.txt", &b"ef"[..]), false);
        pack.add_file("a/x.txt", PackedFile::from_bytes("x.txt", &b"abcd"[..]), false);
        pack.add_file("c.txt", PackedFile::from_bytes("c.txt", &b"gone"[..]), false);
        pack.delete("c.txt");

        let mut actual = Vec::new();
        let encoded = encode(&pack, &mut actual)?;
        assert_str_eq!(format!("{:02X?}", actual), format!("{:02X?}", expected));

        let offsets: Vec<u64> = encoded.entries.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![0x34, 0x38]);

        Ok(())
    }

    #[traced_test]
    #[test]
    fn sort_uses_backslash_paths() -> Result<()> {
        let mut pack = PackFile::new("order.pack");
        pack.add_file("a/b", PackedFile::from_bytes("b", &b"1"[..]), false);
        pack.add_file("a_c", PackedFile::from_bytes("a_c", &b"2"[..]), false);
        pack.add_file("a.d", PackedFile::from_bytes("a.d", &b"3"[..]), false);

        let encoded = encode(&pack, &mut Vec::new())?;
        let order: Vec<&str> = encoded.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(order, vec!["a.d", "a/b", "a_c"]);

        Ok(())
    }
}
