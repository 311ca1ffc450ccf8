use std::io::{Cursor, Seek, SeekFrom, Write};
use std::sync::Arc;
use tracing::{debug, instrument, trace};
use tw_pack::PackedFile;

use crate::error::{Error, Result};
use crate::header::TableHeader;
use crate::registry::SchemaRegistry;
use crate::schema::TypeInfo;
use crate::table::{DataTable, TableRow};
use crate::value::{decode_row, encode_row};

/// Decodes the tables of one type using the layouts a registry knows for it
///
/// ```no_run
/// use tw_db::{SchemaRegistry, TableCodec};
///
/// fn dump(registry: &SchemaRegistry, path: &str, data: &[u8]) -> tw_db::error::Result<()> {
///     let table = TableCodec::for_path(registry, path)?.decode(data)?;
///     for row in table.rows() {
///         for (field, value) in row.fields() {
///             println!("{}: {}", field.name, value.text(&field.kind));
///         }
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TableCodec<'a> {
    registry: &'a SchemaRegistry,
    type_name: String,
}

impl<'a> TableCodec<'a> {
    pub fn new(registry: &'a SchemaRegistry, type_name: impl Into<String>) -> Self {
        TableCodec {
            registry,
            type_name: type_name.into(),
        }
    }

    /// Codec for the table stored at `path` in a pack.
    pub fn for_path(registry: &'a SchemaRegistry, path: &str) -> Result<Self> {
        let type_name = DataTable::type_name_from_path(path)
            .ok_or_else(|| Error::UnknownTable(path.to_owned()))?;
        Ok(Self::new(registry, type_name))
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Header of a table, zeroed when unreadable
    pub fn read_header(data: &[u8]) -> TableHeader {
        TableHeader::read(&mut Cursor::new(data))
    }

    /// Check from the header alone whether a known layout may fit `data`.
    ///
    /// Fails when the table is unknown or newer than every known layout. Passing the check
    /// does not guarantee a successful [`TableCodec::decode`].
    pub fn check(&self, data: &[u8]) -> Result<TableHeader> {
        if !self.registry.is_supported(&self.type_name) {
            return Err(Error::UnknownTable(self.type_name.clone()));
        }
        let header = Self::read_header(data);
        let max_version = self.registry.max_version(&self.type_name);
        if max_version != 0 && header.version > max_version {
            return Err(Error::SchemaMismatch(format!(
                "{}: needs {}, has {}",
                self.type_name, header.version, max_version
            )));
        }
        Ok(header)
    }

    pub fn can_decode(&self, data: &[u8]) -> bool {
        self.check(data).is_ok()
    }

    /// Decode `data` with the first candidate layout that fits.
    #[instrument(skip(self, data), fields(table = %self.type_name, len = data.len()), err)]
    pub fn decode(&self, data: &[u8]) -> Result<DataTable> {
        let header = Self::read_header(data);
        let candidates = self.registry.lookup(&self.type_name, header.version);
        if candidates.is_empty() {
            return Err(Error::UnknownTable(self.type_name.clone()));
        }

        let mut failures = Vec::new();
        for info in candidates {
            match Self::decode_as(data, &header, info.clone()) {
                Ok(table) => {
                    debug!("decoded {} rows as {}", table.len(), info);
                    return Ok(table);
                }
                Err(e) => {
                    debug!("{} does not fit: {}", info, e);
                    failures.push(format!("{info}: {e}"));
                }
            }
        }

        Err(Error::NoApplicableSchema {
            table: self.type_name.clone(),
            version: header.version,
            failures,
        })
    }

    /// Decode the rows of `data` as `info`.
    ///
    /// Every byte after the header must belong to a row and the number of rows must match the
    /// header.
    pub fn decode_as(data: &[u8], header: &TableHeader, info: Arc<TypeInfo>) -> Result<DataTable> {
        let mut reader = Cursor::new(data);
        reader.seek(SeekFrom::Start(header.length() as u64))?;
        let end = data.len() as u64;

        let mut table = DataTable::new(header.clone(), info.clone());
        let mut rows = Vec::new();
        while reader.position() < end {
            let start = reader.position();
            let values = decode_row(&info.fields, &mut reader)?;
            if reader.position() == start {
                return Err(Error::SchemaMismatch(format!(
                    "row {} of version {} is empty",
                    rows.len(),
                    header.version
                )));
            }
            trace!("row {} ends at {}", rows.len(), reader.position());
            rows.push(TableRow::from_values(info.clone(), values));
        }

        if rows.len() as u64 != header.entry_count as u64 {
            return Err(Error::SchemaMismatch(format!(
                "expected {} entries, got {}",
                header.entry_count,
                rows.len()
            )));
        }
        if reader.position() != end {
            return Err(Error::SchemaMismatch(format!(
                "expected {} bytes, read {}",
                end,
                reader.position()
            )));
        }

        for row in rows {
            table.push(row)?;
        }
        Ok(table)
    }

    /// Write `table`, declaring the number of rows it actually holds.
    pub fn encode<W: Write>(table: &DataTable, writer: &mut W) -> Result<()> {
        let count = u32::try_from(table.len())
            .map_err(|_| Error::SchemaMismatch(format!("{} rows do not fit a table", table.len())))?;
        table.header.write(writer, count)?;
        for row in table.rows() {
            encode_row(&table.info().fields, row.values(), writer)?;
        }
        Ok(())
    }

    pub fn encode_to_vec(table: &DataTable) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(
            table.header.length() + table.rows().iter().map(TableRow::read_length).sum::<usize>(),
        );
        Self::encode(table, &mut out)?;
        Ok(out)
    }
}

/// Decode a DB table stored at `path` of a pack.
pub fn decode_packed(registry: &SchemaRegistry, path: &str, file: &PackedFile) -> Result<DataTable> {
    let data = file.data()?;
    TableCodec::for_path(registry, path)?.decode(&data)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tracing_test::traced_test;
    use tw_pack::{PackFile, PackedFile, StringEncoding};

    use crate::codec::{decode_packed, TableCodec};
    use crate::error::{Error, Result};
    use crate::header::TableHeader;
    use crate::registry::SchemaRegistry;
    use crate::schema::{FieldDef, FieldKind, TypeInfo};
    use crate::table::DataTable;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.insert(TypeInfo::new(
            "flags_tables".into(),
            1,
            vec![FieldDef::new("key", FieldKind::Int)],
        ));
        registry.insert(TypeInfo::new(
            "flags_tables".into(),
            2,
            vec![
                FieldDef::new("key", FieldKind::Int),
                FieldDef::new("on", FieldKind::Boolean),
            ],
        ));
        registry
    }

    #[rustfmt::skip]
    const VERSION_2: [u8; 23] = [
        0xFC, 0xFD, 0xFE, 0xFF, 0x02, 0x00, 0x00, 0x00,
        0x01,
        0x02, 0x00, 0x00, 0x00,
        0x07, 0x00, 0x00, 0x00, 0x01,
        0x08, 0x00, 0x00, 0x00, 0x00,
    ];

    #[test]
    #[traced_test]
    fn decode_picks_the_fitting_layout() -> Result<()> {
        let registry = registry();
        let codec = TableCodec::new(&registry, "flags_tables");
        let table = codec.decode(&VERSION_2)?;

        assert_eq!(table.info().version, 2);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].text("key")?, "7");
        assert_eq!(table.rows()[1].text("on")?, "false");
        assert!(table.header.has_version_marker);

        assert_eq!(TableCodec::encode_to_vec(&table)?, VERSION_2.to_vec());
        Ok(())
    }

    #[test]
    #[traced_test]
    fn falls_back_to_other_versions() -> Result<()> {
        // declares version 1 but carries version 2 rows
        let mut data = VERSION_2;
        data[4] = 0x01;

        let registry = registry();
        let table = TableCodec::new(&registry, "flags_tables").decode(&data)?;
        assert_eq!(table.info().version, 2);
        assert_eq!(table.header.version, 1);
        Ok(())
    }

    #[test]
    #[traced_test]
    fn no_layout_fits() {
        let mut data = VERSION_2.to_vec();
        data.push(0x00);

        let registry = registry();
        match TableCodec::new(&registry, "flags_tables").decode(&data) {
            Err(Error::NoApplicableSchema {
                table,
                version,
                failures,
            }) => {
                assert_eq!((table.as_str(), version), ("flags_tables", 2));
                assert_eq!(failures.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(matches!(
            TableCodec::new(&registry, "missing_tables").decode(&VERSION_2),
            Err(Error::UnknownTable(_))
        ));
    }

    #[test]
    fn row_count_must_match() {
        let mut data = VERSION_2;
        data[9] = 0x03;
        let info = Arc::new(registry().all_infos("flags_tables")[1].as_ref().clone());
        let header = TableCodec::read_header(&data);
        assert!(matches!(
            TableCodec::decode_as(&data, &header, info),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn empty_rows_are_rejected() {
        let info = Arc::new(TypeInfo::new(
            "t".into(),
            0,
            vec![FieldDef::new("nothing", FieldKind::Blob(0))],
        ));
        let data = [0x01, 0x01, 0x00, 0x00, 0x00, 0xAA];
        let header = TableCodec::read_header(&data);
        assert!(matches!(
            TableCodec::decode_as(&data, &header, info),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn check_against_max_version() {
        let registry = registry();
        let codec = TableCodec::new(&registry, "flags_tables");
        assert!(codec.can_decode(&VERSION_2));

        let mut newer = VERSION_2;
        newer[4] = 0x03;
        assert!(!codec.can_decode(&newer));
        assert!(!TableCodec::new(&registry, "missing_tables").can_decode(&VERSION_2));
    }

    #[test]
    fn encode_counts_rows() -> Result<()> {
        let info = Arc::new(TypeInfo::new(
            "names_tables".into(),
            0,
            vec![FieldDef::new("name", FieldKind::String(StringEncoding::Utf8))],
        ));
        let mut table = DataTable::new(TableHeader::default(), info);
        let mut row = table.new_row();
        row.set("name", " ab ")?;
        table.push(row)?;

        let first = TableCodec::encode_to_vec(&table)?;
        assert_eq!(first, vec![0x01, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, b'a', b'b']);
        assert_eq!(TableCodec::encode_to_vec(&table)?, first);
        Ok(())
    }

    #[test]
    fn decode_from_pack() -> Result<()> {
        let registry = registry();
        let mut pack = PackFile::new("test.pack");
        pack.add_file(
            "db/flags_tables/data__",
            PackedFile::from_bytes("data__", VERSION_2.to_vec()),
            false,
        );

        let (path, file) = pack.all_files().into_iter().next().ok_or(Error::UnknownTable("none".into()))?;
        assert_eq!(path, "db/flags_tables/data__");
        let table = decode_packed(&registry, &path, file)?;
        assert_eq!(table.len(), 2);
        Ok(())
    }
}
