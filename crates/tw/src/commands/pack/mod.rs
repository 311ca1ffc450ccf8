pub mod create;
pub mod diff;
pub mod extract;
pub mod list;

#[derive(clap::Subcommand)]
pub enum PackCommands {
    /// Compare two PACK files
    Diff(diff::DiffArgs),
    /// Extract a PACK file into a directory
    Extract(extract::ExtractArgs),
    /// Build a PACK file from a directory
    Create(create::CreateArgs),
    /// List the entries of a PACK file
    List(list::ListArgs),
}

impl PackCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            PackCommands::Diff(diff) => diff.handle(),
            PackCommands::Extract(extract) => extract.handle(),
            PackCommands::Create(create) => create.handle(),
            PackCommands::List(list) => list.handle(),
        }
    }
}
