use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::schema::{FieldDef, TypeInfo};
use crate::table::{DataTable, TableRow};
use crate::value::FieldValue;

/// Values of one row paired with the fields describing them
struct Row<'a> {
    fields: &'a [FieldDef],
    values: &'a [FieldValue],
}

struct Items<'a> {
    fields: &'a [FieldDef],
    items: &'a [Vec<FieldValue>],
}

struct Value<'a> {
    fields: &'a [FieldDef],
    value: &'a FieldValue,
}

impl Serialize for Row<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (field, value) in self.fields.iter().zip(self.values) {
            let value = Value {
                fields: field.kind.list_fields(),
                value,
            };
            map.serialize_entry(&field.name, &value)?;
        }
        map.end()
    }
}

impl Serialize for Items<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.items.len()))?;
        for values in self.items {
            seq.serialize_element(&Row {
                fields: self.fields,
                values,
            })?;
        }
        seq.end()
    }
}

impl Serialize for Value<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.value {
            FieldValue::Scalar(value) => serializer.serialize_str(value),
            FieldValue::Optional { present: false, .. } => serializer.serialize_none(),
            FieldValue::Optional { value, .. } => serializer.serialize_some(value),
            FieldValue::List(items) => Items {
                fields: self.fields,
                items,
            }
            .serialize(serializer),
        }
    }
}

/// Serializes as a map of field name to value.
///
/// Lists become arrays of such maps and absent optional strings become `None`.
impl Serialize for TableRow {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Row {
            fields: &self.info().fields,
            values: self.values(),
        }
        .serialize(serializer)
    }
}

impl Serialize for DataTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("table", &self.info().name)?;
        map.serialize_entry("version", &self.info().version)?;
        map.serialize_entry("guid", &self.header.guid)?;
        map.serialize_entry("rows", self.rows())?;
        map.end()
    }
}

impl Serialize for FieldDef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("type", &self.kind.type_name())?;
        if let Some(reference) = &self.reference {
            map.serialize_entry("fkey", &reference.to_string())?;
        }
        if self.primary_key {
            map.serialize_entry("pk", &true)?;
        }
        if self.kind.is_list() {
            map.serialize_entry("fields", self.kind.list_fields())?;
        }
        map.end()
    }
}

impl Serialize for TypeInfo {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("version", &self.version)?;
        map.serialize_entry("fields", &self.fields)?;
        map.end()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use tw_pack::StringEncoding;

    use crate::error::Result;
    use crate::header::TableHeader;
    use crate::schema::{FieldDef, FieldKind, FieldReference, ListDef, TypeInfo};
    use crate::table::DataTable;
    use crate::value::FieldValue;

    #[test]
    fn table_as_json() -> Result<()> {
        let info = Arc::new(TypeInfo::new(
            "units_tables".into(),
            2,
            vec![
                FieldDef::builder()
                    .name("key")
                    .kind(FieldKind::String(StringEncoding::Utf8))
                    .primary_key(true)
                    .build(),
                FieldDef::builder()
                    .name("note")
                    .kind(FieldKind::OptString(StringEncoding::Utf8))
                    .reference(FieldReference::new("notes".into(), "key".into()))
                    .build(),
                FieldDef::new(
                    "costs",
                    FieldKind::List(ListDef::new(vec![FieldDef::new("amount", FieldKind::Int)], false)),
                ),
            ],
        ));

        let mut table = DataTable::new(TableHeader::default(), info.clone());
        let mut row = table.new_row();
        row.set("key", "spearmen")?;
        row.set_list("costs", vec![vec![FieldValue::Scalar("5".into())]])?;
        table.push(row)?;

        let value = serde_json::to_value(&table).map_err(std::io::Error::from)?;
        assert_eq!(
            value,
            json!({
                "table": "units_tables",
                "version": 2,
                "guid": "",
                "rows": [
                    { "key": "spearmen", "note": null, "costs": [{ "amount": "5" }] }
                ]
            })
        );

        let schema = serde_json::to_value(info.as_ref()).map_err(std::io::Error::from)?;
        assert_eq!(
            schema["fields"],
            json!([
                { "name": "key", "type": "string_ascii", "pk": true },
                { "name": "note", "type": "optstring_ascii", "fkey": "notes.key" },
                { "name": "costs", "type": "list", "fields": [{ "name": "amount", "type": "int" }] }
            ])
        );
        Ok(())
    }
}
