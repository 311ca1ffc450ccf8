//! This library decodes and encodes the **DB** tables *Total War* games store in PACK files.
//!
//! # DB Table Format Documentation
//!
//! A DB table is a PACK entry below `db/<type name>/`. The bytes do not describe their own
//! columns: a table is read with a layout from a schema document, chosen by its type name and
//! version. Several layouts may share a name and version, so decoding tries every candidate
//! until one reads the whole table.
//!
//! ## File Structure
//!
//! | Field          | Description                                                       |
//! |----------------|-------------------------------------------------------------------|
//! | GUID block     | optional: `FD FE FC FF` and a length prefixed UTF-16 GUID         |
//! | Version block  | optional: `FC FD FE FF` and a 4-byte version                      |
//! | Lead byte      | 1 byte: `0x01`                                                    |
//! | Row Count      | 4 bytes: number of rows                                           |
//! | Rows           | every field of every row, in layout order                         |
//!
//! Tables without a version block are version 0.
//!
//! ### Fields
//!
//! | Type                          | Encoding                                                  |
//! |-------------------------------|-----------------------------------------------------------|
//! | `int`                         | 4 bytes, signed                                           |
//! | `short`                       | 2 bytes, unsigned                                         |
//! | `float`                       | 4 bytes, IEEE 754                                         |
//! | `boolean`                     | 1 byte, `0x00` or `0x01`                                  |
//! | `string` / `string_ascii`     | 2-byte length, then UTF-16 code units or UTF-8 bytes      |
//! | `optstring` / `optstring_ascii` | presence byte, then a string when it is `0x01`          |
//! | `blobN`                       | N raw bytes                                               |
//! | `list`                        | 4-byte item count, then the nested fields of every item  |
//!
//! ## Additional Information
//!
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Schema Documents**: `schema_user.xml` takes priority over `master_schema.xml`
//!

pub mod codec;
pub mod error;
pub mod header;
pub mod registry;
pub mod schema;
#[cfg(feature = "serde")]
mod serialize;
pub mod table;
pub mod value;
pub mod xml;

pub use codec::{decode_packed, TableCodec};
pub use header::TableHeader;
pub use registry::SchemaRegistry;
pub use schema::{FieldDef, FieldKind, FieldReference, ListDef, TypeInfo};
pub use table::{DataTable, TableRow};
pub use value::FieldValue;
