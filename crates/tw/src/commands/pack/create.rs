use clap::{Args, ValueEnum};
use miette::{miette, Context, Result};
use std::path::PathBuf;
use tracing::info;
use tw_pack::{PackFile, PackHeader, PackTag, PackType};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Tag {
    Pfh0,
    Pfh2,
    Pfh3,
    Pfh4,
    #[default]
    Pfh5,
}

impl From<Tag> for PackTag {
    fn from(value: Tag) -> Self {
        match value {
            Tag::Pfh0 => PackTag::Pfh0,
            Tag::Pfh2 => PackTag::Pfh2,
            Tag::Pfh3 => PackTag::Pfh3,
            Tag::Pfh4 => PackTag::Pfh4,
            Tag::Pfh5 => PackTag::Pfh5,
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Kind {
    Boot,
    Release,
    Patch,
    #[default]
    Mod,
    Movie,
}

impl From<Kind> for PackType {
    fn from(value: Kind) -> Self {
        match value {
            Kind::Boot => PackType::Boot,
            Kind::Release => PackType::Release,
            Kind::Patch => PackType::Patch,
            Kind::Mod => PackType::Mod,
            Kind::Movie => PackType::Movie,
        }
    }
}

#[derive(Args)]
pub struct CreateArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target PACK file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Header layout of the new file
    #[arg(short, long, value_enum, default_value_t = Tag::Pfh5)]
    tag: Tag,

    /// Load order category of the new file
    #[arg(short = 'k', long = "type", value_enum, default_value_t = Kind::Mod)]
    pack_type: Kind,

    /// Names of packs the new file replaces
    #[arg(short, long, value_name = "NAME")]
    replaces: Vec<String>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl CreateArgs {
    pub fn handle(&self) -> Result<()> {
        if self.file.exists() && !self.overwrite {
            return Err(miette!("{} already exists", self.file.display()));
        }
        info!("creating {}", self.file.display());

        let header = PackHeader::builder()
            .tag(self.tag.into())
            .replaced_pack_names(self.replaces.clone())
            .build();
        let mut pack = PackFile::with_header(&self.file, header);
        pack.set_pack_type(self.pack_type.into());

        let added = pack
            .add_directory(&self.directory, false)
            .context(format!("reading {}", self.directory.display()))?;
        if added == 0 {
            return Err(miette!("directory is empty"));
        }

        pack.save().context("writing pack file")?;
        info!("packed {} files", added);
        Ok(())
    }
}
