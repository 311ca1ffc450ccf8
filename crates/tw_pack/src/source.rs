//! Where the bytes of a packed file live until they are needed.

use std::fmt::{self, Debug};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

use crate::error::{Error, Result};

/// Lazy source of a packed file's data
///
/// [`DataSource::Packed`] only remembers a byte range and opens the pack again on each read,
/// so no entry data stays resident.
#[derive(Clone, PartialEq, Eq)]
pub enum DataSource {
    /// A file on disk, read whole
    File { path: PathBuf, size: u64 },
    /// Bytes held in memory
    Memory(Arc<[u8]>),
    /// A byte range inside a pack file
    Packed { path: PathBuf, offset: u64, size: u64 },
}

impl Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::File { path, size } => {
                write!(f, "File({}, {} bytes)", path.display(), size)
            }
            DataSource::Memory(data) => write!(f, "Memory({} bytes)", data.len()),
            DataSource::Packed { path, offset, size } => {
                write!(f, "Packed({}@{:#x}, {} bytes)", path.display(), offset, size)
            }
        }
    }
}

impl DataSource {
    /// Source an on-disk file, recording its current size.
    pub fn file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();
        Ok(DataSource::File {
            path: path.to_path_buf(),
            size,
        })
    }

    pub fn memory(data: impl Into<Arc<[u8]>>) -> Self {
        DataSource::Memory(data.into())
    }

    /// Byte length of the data
    pub fn size(&self) -> u64 {
        match self {
            DataSource::File { size, .. } => *size,
            DataSource::Memory(data) => data.len() as u64,
            DataSource::Packed { size, .. } => *size,
        }
    }

    /// Read the complete data.
    #[instrument(err)]
    pub fn read_data(&self) -> Result<Vec<u8>> {
        match self {
            DataSource::File { path, .. } => Ok(std::fs::read(path)?),
            DataSource::Memory(data) => Ok(data.to_vec()),
            DataSource::Packed { path, offset, size } => {
                let mut file = File::open(path)?;
                file.seek(SeekFrom::Start(*offset))?;

                let mut buffer = Vec::with_capacity(*size as usize);
                file.take(*size).read_to_end(&mut buffer)?;
                if (buffer.len() as u64) < *size {
                    return Err(Error::TruncatedData {
                        needed: *size,
                        remaining: buffer.len() as u64,
                        position: *offset,
                    });
                }
                Ok(buffer)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    use crate::error::{Error, Result};
    use crate::source::DataSource;

    #[test]
    fn packed_range_reopens_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(b"headerHELLOtail")?;

        let source = DataSource::Packed {
            path: file.path().to_path_buf(),
            offset: 6,
            size: 5,
        };

        assert_eq!(source.size(), 5);
        assert_eq!(source.read_data()?, b"HELLO".to_vec());
        assert_eq!(source.read_data()?, b"HELLO".to_vec());

        Ok(())
    }

    #[test]
    fn packed_range_past_end() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(b"short")?;

        let source = DataSource::Packed {
            path: file.path().to_path_buf(),
            offset: 3,
            size: 10,
        };

        assert!(matches!(
            source.read_data(),
            Err(Error::TruncatedData {
                needed: 10,
                remaining: 2,
                ..
            })
        ));

        Ok(())
    }

    #[test]
    fn file_source_records_size() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(b"1234")?;
        file.flush()?;

        let source = DataSource::file(file.path())?;
        assert_eq!(source.size(), 4);
        assert_eq!(source.read_data()?, b"1234".to_vec());

        Ok(())
    }
}
