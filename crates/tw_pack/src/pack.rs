//! An opened PACK file and the operations that change it.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use walkdir::WalkDir;

use crate::entry::{split_path, EntryRef, PackedFile, VirtualDirectory};
use crate::error::Result;
use crate::read::PackReader;
use crate::source::DataSource;
use crate::types::{PackHeader, PackType};

/// A PACK file with its index unpacked into a [`VirtualDirectory`]
///
/// Every mutating method marks the pack as modified. Changes only reach the disk through
/// [`PackFile::save`] or [`PackFile::save_as`].
///
/// ```no_run
/// # fn doit() -> tw_pack::error::Result<()> {
/// use tw_pack::{PackFile, PackedFile};
///
/// let mut pack = PackFile::open("data/my_mod.pack")?;
/// pack.add_file("text/db/new.loc", PackedFile::from_bytes("new.loc", &b"hello"[..]), false);
/// pack.save()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PackFile {
    path: PathBuf,
    header: PackHeader,
    root: VirtualDirectory,
    modified: bool,
}

impl PackFile {
    /// An empty pack that will be written to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_header(path, PackHeader::default())
    }

    pub fn with_header(path: impl Into<PathBuf>, header: PackHeader) -> Self {
        let path = path.into();
        PackFile {
            root: VirtualDirectory::new(root_name(&path)),
            path,
            header,
            modified: false,
        }
    }

    /// Open the PACK at `path`.
    ///
    /// Entries refer back to byte ranges of the file and are read on demand.
    #[instrument(skip_all, fields(path = %path.as_ref().display()), err)]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let pack = PackReader::new(reader)?;

        let mut result = Self::with_header(path, pack.header().clone());
        for entry in pack.entries() {
            let source = DataSource::Packed {
                path: path.to_path_buf(),
                offset: entry.data_start,
                size: entry.size,
            };
            result.insert_read_entry(&entry.path, source, entry.extra_info);
        }
        result.root.prune_deleted();

        info!("opened {} with {} files", path.display(), result.file_count());
        Ok(result)
    }

    /// Decode a PACK held in memory. Every entry's data is copied out of `data`.
    ///
    /// `path` is only used when the pack is saved.
    pub fn from_bytes(path: impl Into<PathBuf>, data: &[u8]) -> Result<Self> {
        Self::read_from(path, Cursor::new(data))
    }

    /// Decode a PACK from `reader`, loading all entry data into memory.
    pub fn read_from<R: Read + Seek>(path: impl Into<PathBuf>, reader: R) -> Result<Self> {
        let mut pack = PackReader::new(reader)?;

        let mut result = Self::with_header(path, pack.header().clone());
        let entries: Vec<_> = pack.entries().cloned().collect();
        for (index, entry) in entries.into_iter().enumerate() {
            let data = pack.by_index(index)?;
            result.insert_read_entry(&entry.path, DataSource::memory(data), entry.extra_info);
        }
        result.root.prune_deleted();
        Ok(result)
    }

    fn insert_read_entry(&mut self, path: &str, source: DataSource, extra_info: Option<u64>) {
        let name = split_path(path).last().copied().unwrap_or_default().to_owned();
        let file = PackedFile::new(name, source).with_extra_info(extra_info.unwrap_or_default());
        self.root.add_file(path, file, true);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &PackHeader {
        &self.header
    }

    /// Mutable access to the header; marks the pack modified.
    pub fn header_mut(&mut self) -> &mut PackHeader {
        self.modified = true;
        &mut self.header
    }

    pub fn pack_type(&self) -> PackType {
        self.header.pack_type()
    }

    pub fn set_pack_type(&mut self, pack_type: PackType) {
        self.header_mut().set_pack_type(pack_type);
    }

    pub fn root(&self) -> &VirtualDirectory {
        &self.root
    }

    /// Whether anything changed since the pack was opened or last saved
    pub fn is_modified(&self) -> bool {
        self.modified || self.root.is_modified()
    }

    /// Number of files that are not deleted
    pub fn file_count(&self) -> usize {
        self.root.file_count()
    }

    pub fn get(&self, path: &str) -> Option<EntryRef<'_>> {
        self.root.get(path)
    }

    pub fn get_file(&self, path: &str) -> Option<&PackedFile> {
        self.root.get_file(path)
    }

    /// Mutable access to a file; marks the pack modified when the file exists.
    pub fn get_file_mut(&mut self, path: &str) -> Option<&mut PackedFile> {
        let file = self.root.get_file_mut(path)?;
        self.modified = true;
        Some(file)
    }

    /// See [`VirtualDirectory::add_file`].
    pub fn add_file(&mut self, path: &str, file: PackedFile, overwrite: bool) -> bool {
        let added = self.root.add_file(path, file, overwrite);
        self.modified |= added;
        added
    }

    /// Add every file below `directory` on disk, keeping their relative paths.
    ///
    /// Returns the number of files added.
    #[instrument(skip(self), err)]
    pub fn add_directory(&mut self, directory: &Path, overwrite: bool) -> Result<usize> {
        let mut added = 0;
        for entry in WalkDir::new(directory)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| !e.file_type().is_dir())
        {
            let Ok(relative) = entry.path().strip_prefix(directory) else {
                continue;
            };
            let relative = relative.to_string_lossy();
            let name = entry.file_name().to_string_lossy().into_owned();

            let file = PackedFile::new(name, DataSource::file(entry.path())?);
            if self.add_file(&relative, file, overwrite) {
                added += 1;
            }
        }
        Ok(added)
    }

    /// See [`VirtualDirectory::mark_deleted`]. The root itself cannot be deleted.
    pub fn delete(&mut self, path: &str) -> bool {
        if split_path(path).is_empty() {
            return false;
        }
        let deleted = self.root.mark_deleted(path);
        self.modified |= deleted;
        deleted
    }

    /// See [`VirtualDirectory::rename`].
    pub fn rename(&mut self, path: &str, new_name: &str) -> bool {
        let renamed = self.root.rename(path, new_name);
        self.modified |= renamed;
        renamed
    }

    /// Every file with its full path, see [`VirtualDirectory::all_files`].
    pub fn all_files(&self) -> Vec<(String, &PackedFile)> {
        self.root.all_files()
    }

    /// Every entry with its full path, see [`VirtualDirectory::all_entries`].
    pub fn all_entries(&self) -> Vec<(String, EntryRef<'_>)> {
        self.root.all_entries()
    }

    pub(crate) fn root_mut(&mut self) -> &mut VirtualDirectory {
        &mut self.root
    }

    pub(crate) fn header_mut_quiet(&mut self) -> &mut PackHeader {
        &mut self.header
    }

    pub(crate) fn relocate(&mut self, path: PathBuf) {
        self.root.set_name(root_name(&path));
        self.path = path;
    }

    pub(crate) fn mark_saved(&mut self) {
        self.root.prune_deleted();
        self.modified = false;
    }
}

fn root_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::entry::PackedFile;
    use crate::pack::PackFile;
    use crate::types::PackType;

    #[test]
    fn new_pack_defaults() {
        let pack = PackFile::new("out/my_mod.pack");
        assert_eq!(pack.pack_type(), PackType::Mod);
        assert_eq!(pack.header().tag.to_string(), "PFH3");
        assert_eq!(pack.root().name(), "my_mod.pack");
        assert!(!pack.is_modified());
    }

    #[test]
    fn mutations_mark_modified() {
        let mut pack = PackFile::new("a.pack");
        assert!(pack.add_file("x.txt", PackedFile::from_bytes("x.txt", &b"1"[..]), false));
        assert!(pack.is_modified());

        let mut pack = PackFile::new("a.pack");
        assert!(!pack.delete("missing"));
        assert!(!pack.rename("missing", "other"));
        assert!(!pack.delete(""));
        assert!(!pack.is_modified());

        pack.set_pack_type(PackType::Patch);
        assert!(pack.is_modified());
    }
}
