use std::sync::Arc;

use crate::error::{Error, Result};
use crate::header::TableHeader;
use crate::schema::{FieldDef, TypeInfo};
use crate::value::FieldValue;

/// One row of a table, holding a value per field of its type
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    info: Arc<TypeInfo>,
    values: Vec<FieldValue>,
}

impl TableRow {
    /// A row with every field at its default value
    pub fn new(info: Arc<TypeInfo>) -> Self {
        let values = info
            .fields
            .iter()
            .map(|field| FieldValue::default_for(&field.kind))
            .collect();
        TableRow { info, values }
    }

    pub(crate) fn from_values(info: Arc<TypeInfo>, values: Vec<FieldValue>) -> Self {
        TableRow { info, values }
    }

    pub fn info(&self) -> &Arc<TypeInfo> {
        &self.info
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    /// Fields paired with their values, in schema order
    pub fn fields(&self) -> impl Iterator<Item = (&FieldDef, &FieldValue)> {
        self.info.fields.iter().zip(&self.values)
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.info
            .index_of(name)
            .ok_or_else(|| Error::FieldNotFound(name.to_owned()))
    }

    pub fn get(&self, name: &str) -> Result<&FieldValue> {
        Ok(&self.values[self.position(name)?])
    }

    /// External form of a field's value
    pub fn text(&self, name: &str) -> Result<String> {
        let index = self.position(name)?;
        Ok(self.values[index].text(&self.info.fields[index].kind))
    }

    /// Assign a field from text, validating and normalizing it first.
    pub fn set(&mut self, name: &str, text: &str) -> Result<()> {
        let index = self.position(name)?;
        self.values[index] = FieldValue::parse(&self.info.fields[index].kind, text)?;
        Ok(())
    }

    /// Replace the items of a list field.
    ///
    /// Every item needs one value per child field.
    pub fn set_list(&mut self, name: &str, items: Vec<Vec<FieldValue>>) -> Result<()> {
        let index = self.position(name)?;
        let kind = &self.info.fields[index].kind;
        if !kind.is_list() {
            return Err(Error::invalid_value(kind, name, "not a list field"));
        }
        let expected = kind.list_fields().len();
        if let Some(item) = items.iter().find(|item| item.len() != expected) {
            return Err(Error::SchemaMismatch(format!(
                "list item has {} values for {} fields",
                item.len(),
                expected
            )));
        }
        self.values[index] = FieldValue::List(items);
        Ok(())
    }

    /// Sum of the field lengths
    pub fn length(&self) -> usize {
        self.fields()
            .map(|(field, value)| value.length(&field.kind))
            .sum()
    }

    /// Bytes the row occupies on disk
    pub fn read_length(&self) -> usize {
        self.fields()
            .map(|(field, value)| value.read_length(&field.kind))
            .sum()
    }
}

/// A decoded DB table
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    pub header: TableHeader,
    info: Arc<TypeInfo>,
    rows: Vec<TableRow>,
}

impl DataTable {
    pub fn new(header: TableHeader, info: Arc<TypeInfo>) -> Self {
        DataTable {
            header,
            info,
            rows: Vec::new(),
        }
    }

    pub fn info(&self) -> &Arc<TypeInfo> {
        &self.info
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [TableRow] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// A new row of this table's type, not yet added
    pub fn new_row(&self) -> TableRow {
        TableRow::new(self.info.clone())
    }

    /// Append a row built for this table's type.
    pub fn push(&mut self, row: TableRow) -> Result<()> {
        if row.info != self.info && !row.info.same_types(&self.info) {
            return Err(Error::SchemaMismatch(format!(
                "row of {} does not fit {}",
                row.info, self.info
            )));
        }
        self.rows.push(TableRow {
            info: self.info.clone(),
            values: row.values,
        });
        Ok(())
    }

    /// Append every row of `other` and adopt its type.
    ///
    /// Both tables need the same name and the same field kinds in the same order.
    pub fn import(&mut self, other: DataTable) -> Result<()> {
        if self.info.name != other.info.name || !self.info.same_types(&other.info) {
            return Err(Error::SchemaMismatch(format!(
                "cannot import {} into {}",
                other.info, self.info
            )));
        }
        self.info = other.info;
        for row in &mut self.rows {
            row.info = self.info.clone();
        }
        self.rows.extend(other.rows);
        self.header.entry_count = self.rows.len() as u32;
        Ok(())
    }

    /// Type name of the table stored at `path`, the name of its parent directory
    ///
    /// ```
    /// use tw_db::DataTable;
    ///
    /// assert_eq!(DataTable::type_name_from_path("db/units_tables/data"), Some("units_tables"));
    /// assert_eq!(DataTable::type_name_from_path("data"), None);
    /// ```
    pub fn type_name_from_path(path: &str) -> Option<&str> {
        let mut segments = path.rsplit(['/', '\\']).filter(|s| !s.is_empty());
        segments.next()?;
        segments.next()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use crate::error::{Error, Result};
    use crate::header::TableHeader;
    use crate::schema::{FieldDef, FieldKind, ListDef, TypeInfo};
    use crate::table::DataTable;
    use crate::value::FieldValue;

    fn info(name: &str, version: i32) -> Arc<TypeInfo> {
        Arc::new(TypeInfo::new(
            name.into(),
            version,
            vec![
                FieldDef::new("key", FieldKind::Int),
                FieldDef::new("flag", FieldKind::Boolean),
                FieldDef::new(
                    "items",
                    FieldKind::List(ListDef::new(vec![FieldDef::new("n", FieldKind::Short)], false)),
                ),
            ],
        ))
    }

    #[test]
    fn set_normalizes() -> Result<()> {
        let table = DataTable::new(TableHeader::default(), info("t", 1));
        let mut row = table.new_row();
        assert_eq!(row.text("key")?, "0");

        row.set("key", "007")?;
        assert_eq!(row.text("key")?, "7");
        row.set("flag", "TRUE")?;
        assert_eq!(row.text("flag")?, "true");

        assert!(matches!(row.set("key", "x"), Err(Error::InvalidFieldValue { .. })));
        assert_eq!(row.text("key")?, "7");
        assert!(matches!(row.set("nope", "1"), Err(Error::FieldNotFound(_))));
        assert!(row.set("items", "1").is_err());
        Ok(())
    }

    #[test]
    fn list_lengths() -> Result<()> {
        let table = DataTable::new(TableHeader::default(), info("t", 1));
        let mut row = table.new_row();
        row.set_list(
            "items",
            vec![
                vec![FieldValue::Scalar("1".into())],
                vec![FieldValue::Scalar("2".into())],
            ],
        )?;
        assert_eq!(row.text("items")?, "2 entries, length 8");
        assert_eq!(row.length(), 4 + 1 + 8);
        assert_eq!(row.read_length(), 4 + 1 + 8);

        assert!(row.set_list("items", vec![vec![]]).is_err());
        assert!(row.set_list("key", vec![]).is_err());
        Ok(())
    }

    #[test]
    fn import_requires_same_types() -> Result<()> {
        let mut table = DataTable::new(TableHeader::default(), info("t", 1));
        table.push(table.new_row())?;

        let mut newer = DataTable::new(TableHeader::default(), info("t", 2));
        newer.push(newer.new_row())?;
        newer.push(newer.new_row())?;

        table.import(newer)?;
        assert_eq!(table.len(), 3);
        assert_eq!(table.header.entry_count, 3);
        assert_eq!(table.info().version, 2);
        assert!(table.rows().iter().all(|row| row.info().version == 2));

        let other = DataTable::new(TableHeader::default(), info("u", 2));
        assert!(matches!(table.import(other), Err(Error::SchemaMismatch(_))));

        let narrow = Arc::new(TypeInfo::new("t".into(), 3, vec![FieldDef::new("key", FieldKind::Int)]));
        let narrow = DataTable::new(TableHeader::default(), narrow);
        assert!(table.import(narrow).is_err());
        Ok(())
    }

    #[test]
    fn type_names_from_paths() {
        assert_eq!(DataTable::type_name_from_path("db\\land_units_tables\\data__"), Some("land_units_tables"));
        assert_eq!(DataTable::type_name_from_path(""), None);
    }
}
