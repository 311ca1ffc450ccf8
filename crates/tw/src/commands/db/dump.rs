use clap::{Args, ValueEnum};
use itertools::Itertools;
use miette::{miette, Context, IntoDiagnostic, Result};
use std::path::PathBuf;
use tracing::{info, warn};
use tw_db::{decode_packed, DataTable, TableCodec};
use tw_pack::PackFile;

use crate::commands::SchemaArgs;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Tab separated values with a header line per table
    #[default]
    Tsv,
    /// One JSON document holding every table
    Json,
}

#[derive(Args)]
pub struct DumpArgs {
    /// An input PACK file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Only dump tables of this type
    #[arg(short, long, value_name = "NAME")]
    table: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Tsv)]
    format: Format,

    /// Only check whether the tables can be decoded
    #[arg(long, default_value_t = false)]
    check: bool,

    #[command(flatten)]
    schema: SchemaArgs,
}

fn print_tsv(path: &str, table: &DataTable) {
    println!(
        "# {} ({}, {} rows)",
        path,
        table.info(),
        table.len()
    );
    println!("{}", table.info().fields.iter().map(|f| &f.name).join("\t"));
    for row in table.rows() {
        println!(
            "{}",
            row.fields()
                .map(|(field, value)| value.text(&field.kind))
                .join("\t")
        );
    }
}

impl DumpArgs {
    pub fn handle(&self) -> Result<()> {
        let registry = self.schema.load()?;
        let pack = PackFile::open(&self.file).context(format!("path: {}", self.file.display()))?;

        let tables = pack
            .all_files()
            .into_iter()
            .filter(|(path, _)| path.starts_with("db/"))
            .filter(|(path, _)| match &self.table {
                Some(name) => DataTable::type_name_from_path(path) == Some(name.as_str()),
                None => true,
            })
            .collect::<Vec<_>>();
        if tables.is_empty() {
            return Err(miette!("no matching DB tables in {}", self.file.display()));
        }

        if self.check {
            for (path, file) in &tables {
                let codec = TableCodec::for_path(&registry, path)?;
                match codec.check(&file.data()?) {
                    Ok(header) => println!("{path}: version {}", header.version),
                    Err(e) => println!("{path}: {e}"),
                }
            }
            return Ok(());
        }

        let mut decoded = Vec::new();
        let mut failed = 0;
        for (path, file) in &tables {
            match decode_packed(&registry, path, file) {
                Ok(table) => decoded.push((path.as_str(), table)),
                Err(e) => {
                    failed += 1;
                    warn!("{}: {}", path, e);
                }
            }
        }
        info!("decoded {} tables, {} failed", decoded.len(), failed);

        match self.format {
            Format::Tsv => decoded.iter().for_each(|(path, table)| print_tsv(path, table)),
            Format::Json => {
                let document = decoded
                    .iter()
                    .map(|(path, table)| Ok((path.to_string(), serde_json::to_value(table)?)))
                    .collect::<serde_json::Result<serde_json::Map<_, _>>>()
                    .into_diagnostic()?;
                println!(
                    "{}",
                    serde_json::to_string_pretty(&document).into_diagnostic()?
                );
            }
        }
        Ok(())
    }
}
