use clap::{Args, ValueEnum};
use itertools::Itertools;
use miette::{miette, IntoDiagnostic, Result};
use std::sync::Arc;
use tw_db::{xml, TypeInfo};

use crate::commands::SchemaArgs;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Format {
    /// A line per table, or a line per field with --table
    #[default]
    Text,
    Json,
    /// A schema document
    Xml,
}

#[derive(Args)]
pub struct SchemaCommandArgs {
    /// Only show layouts of this table
    #[arg(short, long, value_name = "NAME")]
    table: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[command(flatten)]
    schema: SchemaArgs,
}

fn print_fields(info: &TypeInfo) {
    println!("{}", info);
    for field in &info.fields {
        let mut line = format!("  {}", field);
        if field.primary_key {
            line.push_str(" [pk]");
        }
        if let Some(reference) = &field.reference {
            line.push_str(&format!(" -> {}", reference));
        }
        println!("{line}");
        for child in field.kind.list_fields() {
            println!("    {}", child);
        }
    }
}

impl SchemaCommandArgs {
    pub fn handle(&self) -> Result<()> {
        let registry = self.schema.load()?;

        let infos: Vec<&TypeInfo> = match &self.table {
            Some(name) => {
                let infos = registry.all_infos(name);
                if infos.is_empty() {
                    return Err(miette!("no layout known for {}", name));
                }
                infos.iter().map(Arc::as_ref).collect()
            }
            None => registry.iter().map(Arc::as_ref).collect(),
        };

        match self.format {
            Format::Text if self.table.is_some() => infos.iter().for_each(|info| print_fields(info)),
            Format::Text => {
                for name in registry.table_names() {
                    let versions = registry
                        .all_infos(name)
                        .iter()
                        .map(|info| info.version)
                        .sorted()
                        .dedup()
                        .join(", ");
                    println!("{name}: {versions}");
                }
            }
            Format::Json => println!(
                "{}",
                serde_json::to_string_pretty(&infos).into_diagnostic()?
            ),
            Format::Xml => print!("{}", xml::export(infos.iter().copied())),
        }
        Ok(())
    }
}
