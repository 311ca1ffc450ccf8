pub mod dump;
pub mod schema;

#[derive(clap::Subcommand)]
pub enum DbCommands {
    /// Print the rows of the DB tables in a PACK file
    Dump(dump::DumpArgs),
    /// Show the table layouts of a schema
    Schema(schema::SchemaCommandArgs),
}

impl DbCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            DbCommands::Dump(dump) => dump.handle(),
            DbCommands::Schema(schema) => schema.handle(),
        }
    }
}
