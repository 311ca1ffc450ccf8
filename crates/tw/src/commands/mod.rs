use clap::Args;
use miette::{Context, Result};
use std::path::PathBuf;
use tracing::info;
use tw_db::SchemaRegistry;

pub mod db;
pub mod pack;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle PACK files
    Pack {
        #[command(subcommand)]
        command: pack::PackCommands,
    },
    /// Handle DB tables stored in PACK files
    Db {
        #[command(subcommand)]
        command: db::DbCommands,
    },
}

impl Commands {
    pub fn handle(&self) -> Result<()> {
        match self {
            Commands::Pack { command } => command.handle(),
            Commands::Db { command } => command.handle(),
        }
    }
}

/// Where table layouts are read from
#[derive(Args, Debug, Clone)]
pub struct SchemaArgs {
    /// A schema document, or a directory holding schema_user.xml or master_schema.xml
    #[arg(long, env = "TW_SCHEMA_DIR", value_name = "PATH", default_value = ".")]
    schema: PathBuf,
}

impl SchemaArgs {
    pub fn load(&self) -> Result<SchemaRegistry> {
        let registry = if self.schema.is_dir() {
            SchemaRegistry::load_from_directory(&self.schema)
        } else {
            SchemaRegistry::load([&self.schema])
        }
        .context(format!("loading schema from {}", self.schema.display()))?;

        info!(
            "{} type definitions for {} tables",
            registry.len(),
            registry.table_names().len()
        );
        Ok(registry)
    }
}
