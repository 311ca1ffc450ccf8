//! The virtual directory tree a pack's index is unpacked into.
//!
//! Directories own their children, so full paths are built while walking down from the root
//! rather than stored on each node. Each mutation marks every directory it passes through as
//! modified.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::source::DataSource;

/// Split a path on `/` and `\`, dropping empty segments.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split(['/', '\\']).filter(|s| !s.is_empty()).collect()
}

/// A leaf of the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedFile {
    name: String,
    source: DataSource,
    extra_info: u64,
    deleted: bool,
    modified: bool,
}

impl PackedFile {
    /// Create a file named `name` whose data comes from `source`.
    pub fn new(name: impl Into<String>, source: DataSource) -> Self {
        PackedFile {
            name: name.into(),
            source,
            extra_info: 0,
            deleted: false,
            modified: false,
        }
    }

    /// Create a file holding `data` in memory.
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self::new(name, DataSource::memory(data))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.source.size()
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    /// Load the file's data from its source.
    pub fn data(&self) -> Result<Vec<u8>> {
        self.source.read_data()
    }

    /// Replace the data with an in-memory buffer.
    pub fn set_data(&mut self, data: impl Into<Arc<[u8]>>) {
        self.source = DataSource::memory(data);
        self.modified = true;
    }

    /// The 8 bytes stored next to the size when the pack has additional info
    pub fn extra_info(&self) -> u64 {
        self.extra_info
    }

    pub fn set_extra_info(&mut self, extra_info: u64) {
        self.extra_info = extra_info;
        self.modified = true;
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub(crate) fn with_extra_info(mut self, extra_info: u64) -> Self {
        self.extra_info = extra_info;
        self
    }

    pub(crate) fn repoint(&mut self, source: DataSource) {
        self.source = source;
        self.modified = false;
    }
}

/// Borrowed view of a tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRef<'a> {
    Directory(&'a VirtualDirectory),
    File(&'a PackedFile),
}

impl<'a> EntryRef<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            EntryRef::Directory(d) => d.name(),
            EntryRef::File(f) => f.name(),
        }
    }

    pub fn is_deleted(&self) -> bool {
        match self {
            EntryRef::Directory(d) => d.is_deleted(),
            EntryRef::File(f) => f.is_deleted(),
        }
    }
}

/// A directory node
///
/// Children are kept ordered by name using ordinal comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualDirectory {
    name: String,
    subdirectories: BTreeMap<String, VirtualDirectory>,
    files: BTreeMap<String, PackedFile>,
    deleted: bool,
    modified: bool,
}

impl VirtualDirectory {
    pub fn new(name: impl Into<String>) -> Self {
        VirtualDirectory {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn subdirectories(&self) -> impl Iterator<Item = &VirtualDirectory> {
        self.subdirectories.values()
    }

    pub fn files(&self) -> impl Iterator<Item = &PackedFile> {
        self.files.values()
    }

    /// Find the child directory `name`, creating it when missing.
    ///
    /// Names are matched exactly.
    pub fn get_or_create_subdirectory(&mut self, name: &str) -> &mut VirtualDirectory {
        self.subdirectories
            .entry(name.to_owned())
            .or_insert_with(|| VirtualDirectory::new(name))
    }

    /// Add `file` at `path`, relative to this directory, creating directories on the way.
    ///
    /// An existing file that is not deleted is only replaced when `overwrite` is set.
    /// Returns whether the file was inserted.
    pub fn add_file(&mut self, path: &str, file: PackedFile, overwrite: bool) -> bool {
        let segments = split_path(path);
        let Some((name, directories)) = segments.split_last() else {
            return false;
        };
        self.add_file_at(directories, name, file, overwrite)
    }

    fn add_file_at(
        &mut self,
        directories: &[&str],
        name: &str,
        mut file: PackedFile,
        overwrite: bool,
    ) -> bool {
        let added = match directories.split_first() {
            Some((head, rest)) => self
                .get_or_create_subdirectory(head)
                .add_file_at(rest, name, file, overwrite),
            None => {
                if let Some(existing) = self.files.get(name) {
                    if !existing.deleted && !overwrite {
                        debug!("keeping existing {} in {}", name, self.name);
                        return false;
                    }
                }
                file.name = name.to_owned();
                file.deleted = false;
                file.modified = true;
                self.files.insert(name.to_owned(), file);
                true
            }
        };

        if added {
            self.deleted = false;
            self.modified = true;
        }
        added
    }

    /// Tag the entry at `path` as deleted, recursively for directories.
    ///
    /// An empty path deletes everything below this directory. Returns whether an entry was found.
    pub fn mark_deleted(&mut self, path: &str) -> bool {
        let segments = split_path(path);
        self.mark_deleted_at(&segments)
    }

    fn mark_deleted_at(&mut self, segments: &[&str]) -> bool {
        let found = match segments {
            [] => {
                self.delete_all();
                true
            }
            [name] if self.files.contains_key(*name) => {
                if let Some(file) = self.files.get_mut(*name) {
                    file.deleted = true;
                    file.modified = true;
                }
                true
            }
            [head, rest @ ..] => match self.subdirectories.get_mut(*head) {
                Some(directory) => directory.mark_deleted_at(rest),
                None => false,
            },
        };

        if found {
            self.modified = true;
        }
        found
    }

    fn delete_all(&mut self) {
        self.deleted = true;
        self.modified = true;
        for directory in self.subdirectories.values_mut() {
            directory.delete_all();
        }
        for file in self.files.values_mut() {
            file.deleted = true;
            file.modified = true;
        }
    }

    /// Give the entry at `path` a new name within its directory.
    ///
    /// Follows the rule of [`VirtualDirectory::add_file`]: a live entry already using `new_name`
    /// is kept and `false` is returned.
    pub fn rename(&mut self, path: &str, new_name: &str) -> bool {
        let segments = split_path(path);
        if new_name.is_empty() || new_name.contains(['/', '\\']) {
            return false;
        }
        self.rename_at(&segments, new_name)
    }

    fn rename_at(&mut self, segments: &[&str], new_name: &str) -> bool {
        let renamed = match segments {
            [] => false,
            [name] if self.files.contains_key(*name) => {
                if self.files.get(new_name).is_some_and(|f| !f.deleted) {
                    false
                } else if let Some(mut file) = self.files.remove(*name) {
                    file.name = new_name.to_owned();
                    file.modified = true;
                    self.files.insert(new_name.to_owned(), file);
                    true
                } else {
                    false
                }
            }
            [name] if self.subdirectories.contains_key(*name) => {
                if self
                    .subdirectories
                    .get(new_name)
                    .is_some_and(|d| !d.deleted)
                {
                    false
                } else if let Some(mut directory) = self.subdirectories.remove(*name) {
                    directory.name = new_name.to_owned();
                    directory.modified = true;
                    self.subdirectories.insert(new_name.to_owned(), directory);
                    true
                } else {
                    false
                }
            }
            [head, rest @ ..] => match self.subdirectories.get_mut(*head) {
                Some(directory) => directory.rename_at(rest, new_name),
                None => false,
            },
        };

        if renamed {
            self.modified = true;
        }
        renamed
    }

    /// Look up the entry at `path`. An empty path is this directory.
    pub fn get(&self, path: &str) -> Option<EntryRef<'_>> {
        let segments = split_path(path);
        let Some((name, directories)) = segments.split_last() else {
            return Some(EntryRef::Directory(self));
        };

        let mut directory = self;
        for segment in directories {
            directory = directory.subdirectories.get(*segment)?;
        }

        match directory.files.get(*name) {
            Some(file) => Some(EntryRef::File(file)),
            None => directory
                .subdirectories
                .get(*name)
                .map(EntryRef::Directory),
        }
    }

    pub fn get_file(&self, path: &str) -> Option<&PackedFile> {
        match self.get(path)? {
            EntryRef::File(file) => Some(file),
            EntryRef::Directory(_) => None,
        }
    }

    /// Mutable access to the file at `path`, marking each directory on the way as modified.
    pub fn get_file_mut(&mut self, path: &str) -> Option<&mut PackedFile> {
        self.get_file(path)?;

        let segments = split_path(path);
        let (name, directories) = segments.split_last()?;
        let mut directory = self;
        directory.modified = true;
        for segment in directories {
            directory = directory.subdirectories.get_mut(*segment)?;
            directory.modified = true;
        }
        directory.files.get_mut(*name)
    }

    /// Every file below this directory with its path relative to it.
    ///
    /// Files of subdirectories come before the directory's own files.
    pub fn all_files(&self) -> Vec<(String, &PackedFile)> {
        let mut result = Vec::new();
        self.collect_files("", &mut result);
        result
    }

    fn collect_files<'a>(&'a self, prefix: &str, result: &mut Vec<(String, &'a PackedFile)>) {
        for directory in self.subdirectories.values() {
            directory.collect_files(&join(prefix, &directory.name), result);
        }
        for file in self.files.values() {
            result.push((join(prefix, &file.name), file));
        }
    }

    /// This directory followed by every entry below it, depth first.
    ///
    /// A directory is listed before its contents and subdirectories before files.
    pub fn all_entries(&self) -> Vec<(String, EntryRef<'_>)> {
        let mut result = Vec::new();
        self.collect_entries("", &mut result);
        result
    }

    fn collect_entries<'a>(&'a self, path: &str, result: &mut Vec<(String, EntryRef<'a>)>) {
        result.push((path.to_owned(), EntryRef::Directory(self)));
        for directory in self.subdirectories.values() {
            directory.collect_entries(&join(path, &directory.name), result);
        }
        for file in self.files.values() {
            result.push((join(path, &file.name), EntryRef::File(file)));
        }
    }

    /// Number of files below this directory that are not deleted
    pub fn file_count(&self) -> usize {
        self.subdirectories
            .values()
            .map(VirtualDirectory::file_count)
            .sum::<usize>()
            + self.files.values().filter(|f| !f.deleted).count()
    }

    /// Drop deleted entries and reset every modified flag.
    pub(crate) fn prune_deleted(&mut self) {
        self.files.retain(|_, f| !f.deleted);
        self.subdirectories.retain(|_, d| !d.deleted);
        for directory in self.subdirectories.values_mut() {
            directory.prune_deleted();
        }
        for file in self.files.values_mut() {
            file.modified = false;
        }
        self.modified = false;
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}/{name}")
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::entry::{EntryRef, PackedFile, VirtualDirectory};

    fn file(data: &[u8]) -> PackedFile {
        PackedFile::from_bytes("unnamed", data)
    }

    #[test]
    fn add_creates_directories() {
        let mut root = VirtualDirectory::new("root.pack");
        assert!(root.add_file("db\\units_tables/data", file(b"abc"), false));

        let found = root.get_file("db/units_tables/data").map(|f| f.size());
        assert_eq!(found, Some(3));
        assert!(root.is_modified());
        assert_eq!(root.get_file("db/units_tables/data").map(|f| f.name()), Some("data"));
    }

    #[test]
    fn add_without_overwrite_keeps_first() {
        let mut root = VirtualDirectory::new("root");
        assert!(root.add_file("x.txt", file(b"first"), false));
        assert!(!root.add_file("x.txt", file(b"second"), false));

        let kept = root.get_file("x.txt").and_then(|f| f.data().ok());
        assert_eq!(kept, Some(b"first".to_vec()));
    }

    #[test]
    fn add_with_overwrite_replaces() {
        let mut root = VirtualDirectory::new("root");
        root.add_file("x.txt", file(b"first"), false);
        assert!(root.add_file("x.txt", file(b"second"), true));

        let kept = root.get_file("x.txt").and_then(|f| f.data().ok());
        assert_eq!(kept, Some(b"second".to_vec()));
    }

    #[test]
    fn add_replaces_deleted_file() {
        let mut root = VirtualDirectory::new("root");
        root.add_file("a/x.txt", file(b"first"), false);
        assert!(root.mark_deleted("a/x.txt"));
        assert!(root.add_file("a/x.txt", file(b"second"), false));

        let replaced = root.get_file("a/x.txt");
        assert_eq!(replaced.map(|f| f.is_deleted()), Some(false));
        assert_eq!(replaced.map(|f| f.size()), Some(6));
    }

    #[test]
    fn delete_directory_is_recursive() {
        let mut root = VirtualDirectory::new("root");
        root.add_file("a/b/one", file(b"1"), false);
        root.add_file("a/two", file(b"2"), false);
        root.add_file("three", file(b"3"), false);

        assert!(root.mark_deleted("a"));
        assert!(root.get_file("a/b/one").is_some_and(|f| f.is_deleted()));
        assert!(root.get_file("a/two").is_some_and(|f| f.is_deleted()));
        assert!(root.get("a/b").is_some_and(|d| d.is_deleted()));
        assert_eq!(root.file_count(), 1);
        assert!(!root.mark_deleted("missing"));
    }

    #[test]
    fn traversal_order() {
        let mut root = VirtualDirectory::new("root");
        root.add_file("b.txt", file(b"b"), false);
        root.add_file("a/x.txt", file(b"x"), false);
        root.add_file("a/c/y.txt", file(b"y"), false);
        root.add_file("A.txt", file(b"A"), false);

        let files: Vec<String> = root.all_files().into_iter().map(|(p, _)| p).collect();
        assert_eq!(files, vec!["a/c/y.txt", "a/x.txt", "A.txt", "b.txt"]);

        let entries: Vec<(String, bool)> = root
            .all_entries()
            .into_iter()
            .map(|(p, e)| (p, matches!(e, EntryRef::Directory(_))))
            .collect();
        assert_eq!(
            entries,
            vec![
                ("".to_string(), true),
                ("a".to_string(), true),
                ("a/c".to_string(), true),
                ("a/c/y.txt".to_string(), false),
                ("a/x.txt".to_string(), false),
                ("A.txt".to_string(), false),
                ("b.txt".to_string(), false),
            ]
        );
    }

    #[test]
    fn rename_respects_live_names() {
        let mut root = VirtualDirectory::new("root");
        root.add_file("dir/one", file(b"1"), false);
        root.add_file("dir/two", file(b"2"), false);

        assert!(!root.rename("dir/one", "two"));
        assert!(root.rename("dir/one", "three"));
        assert!(root.get_file("dir/one").is_none());
        assert_eq!(root.get_file("dir/three").map(|f| f.name()), Some("three"));

        assert!(root.rename("dir", "renamed"));
        assert!(root.get_file("renamed/two").is_some());
    }

    #[test]
    fn subdirectory_lookup_is_exact() {
        let mut root = VirtualDirectory::new("root");
        root.get_or_create_subdirectory("Data");
        root.get_or_create_subdirectory("Data");
        root.get_or_create_subdirectory("data");

        let names: Vec<&str> = root.subdirectories().map(|d| d.name()).collect();
        assert_eq!(names, vec!["Data", "data"]);
    }
}
