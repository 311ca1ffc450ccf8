use miette::{IntoDiagnostic, Result};
use pretty_assertions::assert_eq;
use std::fs;
use tracing_test::traced_test;
use tw_db::{
    decode_packed, registry::SCHEMA_FILENAMES, DataTable, FieldValue, SchemaRegistry, TableCodec,
    TableHeader,
};
use tw_pack::{PackFile, PackedFile};

const SCHEMA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<schema>
  <table table_name='units_tables'
         table_version='2' >
    <field name='key' type='string_ascii' pk='true' />
    <field name='caption' type='string' />
    <field name='note' type='optstring' />
    <field name='cost' type='int' />
    <field name='speed' type='float' />
    <field name='count' type='short' />
    <field name='hidden' type='boolean' />
    <field name='id' type='blob2' />
    <field name='abilities' type='list'>
      <field name='ability' type='string_ascii' fkey='abilities_tables.key' />
      <field name='level' type='int' />
    </field>
  </table>
  <table name='Old Banners'>
    <field name='Banner Key' type='string_ascii' />
  </table>
</schema>
"#;

fn units_table(registry: &SchemaRegistry) -> Result<DataTable> {
    let info = registry.all_infos("units_tables")[0].clone();
    let header = TableHeader {
        guid: "0d3b6a1e-5c57-4f3a-9b0b-3f5e8e0d1a2c".into(),
        version: 2,
        entry_count: 0,
        has_version_marker: true,
    };
    let mut table = DataTable::new(header, info);

    for (key, cost) in [("spearmen", "120"), ("archers", "0150"), ("knights", "")] {
        let mut row = table.new_row();
        row.set("key", key)?;
        row.set("caption", key)?;
        row.set("cost", cost)?;
        row.set("speed", "1.25")?;
        row.set("count", "60")?;
        row.set("hidden", "False")?;
        row.set("id", "0A ff")?;
        table.push(row)?;
    }

    let rows = table.rows_mut();
    rows[1].set("note", "ranged")?;
    rows[2].set_list(
        "abilities",
        vec![
            vec![FieldValue::Scalar("charge".into()), FieldValue::Scalar("2".into())],
            vec![FieldValue::Scalar("brace".into()), FieldValue::Scalar("1".into())],
        ],
    )?;
    Ok(table)
}

#[traced_test]
#[test]
fn table_round_trip_through_pack() -> Result<()> {
    let registry = SchemaRegistry::from_xml_str(SCHEMA)?;
    let mut table = units_table(&registry)?;
    table.rows_mut()[0].set("caption", " spearmen  ")?;
    let data = TableCodec::encode_to_vec(&table)?;

    let dir = tempfile::tempdir().into_diagnostic()?;
    let path = dir.path().join("units.pack");
    let mut pack = PackFile::new(&path);
    pack.add_file(
        "db/units_tables/data__",
        PackedFile::from_bytes("data__", data.clone()),
        false,
    );
    pack.save()?;

    let reopened = PackFile::open(&path)?;
    let file = reopened
        .get_file("db/units_tables/data__")
        .ok_or_else(|| miette::miette!("table missing from pack"))?;
    let decoded = decode_packed(&registry, "db/units_tables/data__", file)?;

    assert_eq!(decoded.header.guid, table.header.guid);
    assert_eq!(decoded.header.entry_count, 3);
    assert_eq!(decoded.len(), 3);

    let texts = |table: &DataTable, field: &str| -> Result<Vec<String>> {
        Ok(table
            .rows()
            .iter()
            .map(|row| row.text(field))
            .collect::<tw_db::error::Result<_>>()?)
    };
    assert_eq!(texts(&decoded, "cost")?, vec!["120", "150", "0"]);
    assert_eq!(texts(&decoded, "caption")?, vec!["spearmen", "archers", "knights"]);
    assert_eq!(texts(&decoded, "note")?, vec!["", "ranged", ""]);
    assert_eq!(texts(&decoded, "speed")?, vec!["1.25"; 3]);
    assert_eq!(texts(&decoded, "id")?, vec!["0a ff"; 3]);
    assert_eq!(
        texts(&decoded, "abilities")?,
        vec!["0 entries, length 4", "0 entries, length 4", "2 entries, length 23"]
    );

    // a second encode of the decoded rows reproduces the bytes
    assert_eq!(TableCodec::encode_to_vec(&decoded)?, data);
    Ok(())
}

#[traced_test]
#[test]
fn user_schema_takes_priority() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let [user, master] = SCHEMA_FILENAMES.map(|name| dir.path().join(name));

    assert!(SchemaRegistry::load_from_directory(dir.path())?.is_empty());

    fs::write(&master, SCHEMA).into_diagnostic()?;
    let registry = SchemaRegistry::load_from_directory(dir.path())?;
    assert_eq!(registry.table_names(), vec!["old_banners", "units_tables"]);

    fs::write(
        &user,
        "<schema><table table_name='user_tables' table_version='1'><field name='a' type='int'/></table></schema>",
    )
    .into_diagnostic()?;
    let registry = SchemaRegistry::load([&user, &master])?;
    assert_eq!(registry.table_names(), vec!["user_tables"]);
    assert_eq!(registry.max_version("user_tables"), 1);
    Ok(())
}

#[traced_test]
#[test]
fn legacy_tables_are_unified() -> Result<()> {
    let registry = SchemaRegistry::from_xml_str(SCHEMA)?;
    let infos = registry.lookup("Old Banners", 0);
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].name, "old_banners");
    assert_eq!(infos[0].fields[0].name, "banner_key");

    #[rustfmt::skip]
    let data = [
        0x01,
        0x01, 0x00, 0x00, 0x00,
        0x03, 0x00, b'r', b'e', b'd',
    ];
    let table = TableCodec::new(&registry, "Old Banners").decode(&data)?;
    assert_eq!(table.rows()[0].text("banner_key")?, "red");
    Ok(())
}

#[test]
fn lengths_match_encoded_bytes() -> Result<()> {
    let registry = SchemaRegistry::from_xml_str(SCHEMA)?;
    let table = units_table(&registry)?;
    let data = TableCodec::encode_to_vec(&table)?;

    let rows: usize = table.rows().iter().map(|row| row.read_length()).sum();
    assert_eq!(table.header.length() + rows, data.len());
    Ok(())
}
