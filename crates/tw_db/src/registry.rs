use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::schema::{unify_name, TypeInfo};
use crate::xml;

/// Schema documents looked for in a schema directory, the user's own edits first
pub const SCHEMA_FILENAMES: [&str; 2] = ["schema_user.xml", "master_schema.xml"];

/// Every known table layout, grouped by table name
///
/// A registry is filled once and then shared by reference; lookups never mutate it.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    infos: IndexMap<String, Vec<Arc<TypeInfo>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the first of `paths` that exists and ignore the rest.
    ///
    /// An empty registry is returned when none exists.
    #[instrument(skip_all, err)]
    pub fn load<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Result<Self> {
        for path in paths {
            let path = path.as_ref();
            if path.is_file() {
                let mut registry = Self::new();
                registry.load_file(path)?;
                return Ok(registry);
            }
            debug!("no schema at {}", path.display());
        }
        warn!("no schema document found, no table can be decoded");
        Ok(Self::new())
    }

    /// Load the preferred schema document of `directory`, see [`SCHEMA_FILENAMES`].
    pub fn load_from_directory<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref();
        Self::load(SCHEMA_FILENAMES.iter().map(|name| directory.join(name)))
    }

    /// Add every table of the document at `path`.
    #[instrument(skip(self), err)]
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let document = std::fs::read_to_string(path)?;
        let count = self.load_str(&document)?;
        info!("loaded {} type definitions from {}", count, path.display());
        Ok(())
    }

    /// Add every table of `document`, returning how many were added.
    pub fn load_str(&mut self, document: &str) -> Result<usize> {
        let infos = xml::import(document, true)?;
        let count = infos.len();
        for info in infos {
            self.insert(info);
        }
        Ok(count)
    }

    pub fn from_xml_str(document: &str) -> Result<Self> {
        let mut registry = Self::new();
        registry.load_str(document)?;
        Ok(registry)
    }

    /// Add a single definition after those already known for its name.
    pub fn insert(&mut self, info: TypeInfo) {
        self.infos
            .entry(info.name.clone())
            .or_default()
            .push(Arc::new(info));
    }

    /// Register an unversioned layout while working out an unknown table.
    #[cfg(debug_assertions)]
    pub fn register(&mut self, name: &str, fields: Vec<crate::schema::FieldDef>) {
        self.insert(TypeInfo::new(name.to_owned(), 0, fields));
    }

    /// Every definition that may describe `name` at `version`, best candidates first.
    ///
    /// Candidates order by their distance to `version`; of two equally distant ones the
    /// earlier version goes first. When nothing is registered under `name` the definitions of
    /// tables whose unified name matches are returned instead.
    pub fn lookup(&self, name: &str, version: i32) -> Vec<Arc<TypeInfo>> {
        let mut candidates = match self.infos.get(name) {
            Some(infos) if !infos.is_empty() => infos.clone(),
            _ => {
                let unified = unify_name(name);
                self.infos
                    .iter()
                    .filter(|(key, _)| unify_name(key) == unified)
                    .flat_map(|(_, infos)| infos.iter().cloned())
                    .collect()
            }
        };
        candidates.sort_by_key(|info| (info.version.abs_diff(version), info.version > version));
        candidates
    }

    /// All definitions of a table, in load order
    pub fn all_infos(&self, name: &str) -> &[Arc<TypeInfo>] {
        self.infos.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TypeInfo>> {
        self.infos.values().flatten()
    }

    /// Highest known version of a table, 0 when unknown
    pub fn max_version(&self, name: &str) -> i32 {
        self.all_infos(name)
            .iter()
            .map(|info| info.version)
            .max()
            .unwrap_or(0)
    }

    pub fn is_supported(&self, name: &str) -> bool {
        !self.all_infos(name).is_empty()
    }

    /// Known table names, sorted
    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .infos
            .iter()
            .filter(|(_, infos)| !infos.is_empty())
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.infos.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Path of the schema document [`SchemaRegistry::load_from_directory`] would read
pub fn schema_path<P: AsRef<Path>>(directory: P) -> Option<PathBuf> {
    SCHEMA_FILENAMES
        .iter()
        .map(|name| directory.as_ref().join(name))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::registry::SchemaRegistry;
    use crate::schema::{FieldDef, FieldKind, TypeInfo};

    fn registry(versions: &[i32]) -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        for version in versions {
            registry.insert(TypeInfo::new(
                "units_tables".into(),
                *version,
                vec![FieldDef::new("key", FieldKind::Int)],
            ));
        }
        registry
    }

    fn versions(registry: &SchemaRegistry, name: &str, target: i32) -> Vec<i32> {
        registry
            .lookup(name, target)
            .iter()
            .map(|info| info.version)
            .collect()
    }

    #[test]
    fn best_version_order() {
        let registry = registry(&[1, 3, 5]);
        assert_eq!(versions(&registry, "units_tables", 4), vec![3, 5, 1]);
        assert_eq!(versions(&registry, "units_tables", 5), vec![5, 3, 1]);
        assert_eq!(versions(&registry, "units_tables", 0), vec![1, 3, 5]);
        assert_eq!(versions(&registry, "units_tables", 9), vec![5, 3, 1]);
    }

    #[test]
    fn equal_versions_keep_load_order() {
        let mut registry = registry(&[2]);
        registry.insert(TypeInfo::new("units_tables".into(), 2, vec![]));
        let found = registry.lookup("units_tables", 2);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].fields.len(), 1);
        assert_eq!(found[1].fields.len(), 0);
    }

    #[test]
    #[traced_test]
    fn unified_fallback() {
        let registry = registry(&[1]);
        assert_eq!(versions(&registry, "Units Tables", 1), vec![1]);
        assert!(registry.lookup("missing", 1).is_empty());
    }

    #[test]
    fn queries() {
        let mut registry = registry(&[1, 7]);
        registry.insert(TypeInfo::new("a_tables".into(), 0, vec![]));

        assert_eq!(registry.table_names(), vec!["a_tables", "units_tables"]);
        assert_eq!(registry.max_version("units_tables"), 7);
        assert_eq!(registry.max_version("missing"), 0);
        assert!(registry.is_supported("a_tables"));
        assert!(!registry.is_supported("missing"));
        assert_eq!(registry.all_infos("units_tables").len(), 2);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.iter().count(), 3);
    }

    #[test]
    #[cfg(debug_assertions)]
    fn register_unversioned() {
        let mut registry = SchemaRegistry::new();
        registry.register("probe_tables", vec![FieldDef::new("a", FieldKind::Boolean)]);
        assert_eq!(registry.max_version("probe_tables"), 0);
        assert_eq!(registry.lookup("probe_tables", 3).len(), 1);
    }
}
