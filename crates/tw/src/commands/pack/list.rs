use clap::Args;
use miette::{Context, Result};
use std::path::PathBuf;
use tw_db::DataTable;
use tw_pack::PackFile;

#[derive(Args)]
pub struct ListArgs {
    /// An input PACK file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Also print sizes and the table type of DB entries
    #[arg(short, long, default_value_t = false)]
    long: bool,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let pack = PackFile::open(&self.file).context(format!("path: {}", self.file.display()))?;

        if self.long {
            let header = pack.header();
            println!(
                "{} {} pack, {} files, {} replaced packs",
                header.tag,
                pack.pack_type(),
                pack.file_count(),
                header.replaced_pack_names.len()
            );
        }

        for (path, file) in pack.all_files() {
            if !self.long {
                println!("{path}");
                continue;
            }
            match DataTable::type_name_from_path(&path).filter(|_| path.starts_with("db/")) {
                Some(table) => println!("{:>10}  {}  [{}]", file.size(), path, table),
                None => println!("{:>10}  {}", file.size(), path),
            }
        }
        Ok(())
    }
}
