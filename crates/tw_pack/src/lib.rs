//! This library handles reading from and creating **PACK** files used by *Total War* games.
//!
//! # PACK Container Format Documentation
//!
//! A PACK file bundles game assets and database tables into a single container. Files are
//! identified by the `.pack` extension. Entry data is stored uncompressed, one entry after the
//! other, following an index that records the size and path of every entry.
//!
//! ## File Structure
//!
//! A PACK file consists of a header, a block of replaced pack names, the index and the data.
//!
//! | Offset (bytes) | Field                  | Description                                                 |
//! |----------------|------------------------|-------------------------------------------------------------|
//! | 0x0000         | Tag                    | 4 bytes: `PFH0`, `PFH2`, `PFH3`, `PFH4` or `PFH5`           |
//! | 0x0004         | Precedence             | 4 bytes: pack type in bits 0-2, extra index info in bit 6   |
//! | 0x0008         | Version                | 4 bytes: number of replaced pack names                      |
//! | 0x000C         | Replaced Names Length  | 4 bytes: byte length of the replaced names block            |
//! | 0x0010         | File Count             | 4 bytes: number of index records                            |
//! | 0x0014         | Index Size             | 4 bytes: byte length of the index                           |
//! | 0x0018         | File Time              | 8 bytes: PFH2 and PFH3 only                                 |
//! | 0x0018         | Reserved               | 4 bytes: PFH4 and PFH5 only                                 |
//!
//! The header is therefore 0x18 bytes long for `PFH0`, 0x20 for `PFH2` and `PFH3` and 0x1C for
//! `PFH4` and `PFH5`.
//!
//! ### Pack Types
//!
//! | Value | Type    |
//! |-------|---------|
//! | 0     | Boot    |
//! | 1     | Release |
//! | 2     | Patch   |
//! | 3     | Mod     |
//! | 4     | Movie   |
//!
//! ### Replaced Pack Names
//!
//! `Version` zero terminated ASCII strings naming the packs this one replaces.
//!
//! ### Index
//!
//! `File Count` records, each laid out as:
//!
//! | Field      | Description                                                           |
//! |------------|-----------------------------------------------------------------------|
//! | Size       | 4 bytes: byte length of the entry data                                |
//! | Extra Info | 8 bytes: only present when bit 6 of the precedence is set             |
//! | Padding    | 1 byte: `PFH5` only                                                   |
//! | Path       | zero terminated ASCII, directories separated by `\`                   |
//!
//! ### Data
//!
//! Entry data follows the index in index order. An entry starts where the previous one ended,
//! the first one at `header length + replaced names length + index size`.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.pack`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Entry Order**: writers sort entries by their `\` separated path
//!

pub mod entry;
pub mod error;
pub mod pack;
pub mod primitives;
pub mod read;
pub mod source;
pub mod types;
pub mod write;

pub use entry::{EntryRef, PackedFile, VirtualDirectory};
pub use pack::PackFile;
pub use primitives::StringEncoding;
pub use read::PackReader;
pub use source::DataSource;
pub use types::{PackHeader, PackTag, PackType};
pub use write::encode;
