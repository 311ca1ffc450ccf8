//! Table type definitions: field kinds, field definitions and versioned type infos.

use bon::Builder;
use derive_more::derive::{Constructor, Display};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tw_pack::StringEncoding;
use winnow::ascii::digit1;
use winnow::combinator::{preceded, separated_pair};
use winnow::prelude::*;
use winnow::token::take_till;
use winnow::PResult;

use crate::error::{Error, Result};

/// Lowercase `name` and replace spaces with `_`, the form legacy table names are stored in.
pub fn unify_name(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// The repeating group carried by [`FieldKind::List`]
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Constructor)]
pub struct ListDef {
    /// Fields of one item
    pub fields: Vec<FieldDef>,
    /// Whether each item is preceded by its 4-byte index
    pub encode_item_indices: bool,
}

/// What a column stores and how it is laid out on disk
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKind {
    /// Length prefixed string
    String(StringEncoding),
    /// Presence byte, followed by a length prefixed string when set
    OptString(StringEncoding),
    /// Signed 32-bit integer
    Int,
    /// Unsigned 16-bit integer
    Short,
    /// 32-bit float
    Single,
    /// 64-bit float
    Double,
    /// One byte, 0 or 1
    Boolean,
    /// Fixed number of raw bytes
    Blob(usize),
    /// Item count followed by that many rows of nested fields
    List(ListDef),
}

fn blob_length(input: &mut &str) -> PResult<usize> {
    preceded("blob", digit1.try_map(usize::from_str)).parse_next(input)
}

impl FieldKind {
    /// Name used for this kind in schema documents
    pub fn type_name(&self) -> String {
        match self {
            FieldKind::String(StringEncoding::Utf16) => "string".into(),
            FieldKind::String(StringEncoding::Utf8) => "string_ascii".into(),
            FieldKind::OptString(StringEncoding::Utf16) => "optstring".into(),
            FieldKind::OptString(StringEncoding::Utf8) => "optstring_ascii".into(),
            FieldKind::Int => "int".into(),
            FieldKind::Short => "short".into(),
            FieldKind::Single => "float".into(),
            FieldKind::Double => "double".into(),
            FieldKind::Boolean => "boolean".into(),
            FieldKind::Blob(length) => format!("blob{length}"),
            FieldKind::List(_) => "list".into(),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, FieldKind::List(_))
    }

    /// Child fields of a list, empty for every other kind
    pub fn list_fields(&self) -> &[FieldDef] {
        match self {
            FieldKind::List(list) => &list.fields,
            _ => &[],
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name())
    }
}

/// Parses the type names of schema documents.
///
/// Every floating point name maps to [`FieldKind::Single`]: historical data stores them all
/// with 4 bytes.
impl FromStr for FieldKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let kind = match s {
            "string" => FieldKind::String(StringEncoding::Utf16),
            "string_ascii" => FieldKind::String(StringEncoding::Utf8),
            "optstring" => FieldKind::OptString(StringEncoding::Utf16),
            "optstring_ascii" => FieldKind::OptString(StringEncoding::Utf8),
            "int" | "integer" | "autonumber" => FieldKind::Int,
            "short" => FieldKind::Short,
            "float" | "single" | "decimal" | "double" => FieldKind::Single,
            "boolean" | "yesno" => FieldKind::Boolean,
            "list" => FieldKind::List(ListDef::default()),
            other => FieldKind::Blob(
                blob_length
                    .parse(other)
                    .map_err(|_| Error::UnknownFieldType(other.to_owned()))?,
            ),
        };
        Ok(kind)
    }
}

/// Foreign key of a column, written `table.field`
#[derive(Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Constructor)]
#[display("{table}.{field}")]
pub struct FieldReference {
    pub table: String,
    pub field: String,
}

fn reference<'s>(input: &mut &'s str) -> PResult<(&'s str, &'s str)> {
    separated_pair(take_till(1.., '.'), '.', take_till(1.., '.')).parse_next(input)
}

impl FieldReference {
    /// Parse a reference where an empty string means there is none.
    pub fn parse_optional(value: &str) -> Result<Option<Self>> {
        if value.is_empty() {
            return Ok(None);
        }
        value.parse().map(Some)
    }
}

impl FromStr for FieldReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (table, field) = reference
            .parse(s)
            .map_err(|_| Error::InvalidReference(s.to_owned()))?;
        Ok(FieldReference::new(table.to_owned(), field.to_owned()))
    }
}

/// One column of a table
///
/// ```
/// use tw_db::schema::{FieldDef, FieldKind};
///
/// let key = FieldDef::builder()
///     .name("key")
///     .kind(FieldKind::Int)
///     .primary_key(true)
///     .build();
/// assert_eq!(key.kind.type_name(), "int");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Builder)]
pub struct FieldDef {
    /// Column name
    #[builder(into)]
    pub name: String,

    pub kind: FieldKind,

    /// Column of another table holding the valid values
    pub reference: Option<FieldReference>,

    #[builder(default)]
    pub primary_key: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        FieldDef::builder().name(name).kind(kind).build()
    }
}

impl fmt::Display for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.kind)
    }
}

/// A versioned table layout
///
/// Several infos may share a name and version while describing different layouts. Infos order
/// by name, version, field count and then their fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Constructor)]
pub struct TypeInfo {
    pub name: String,
    pub version: i32,
    pub fields: Vec<FieldDef>,
}

impl TypeInfo {
    /// Find a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Whether both infos have the same field kinds in the same order, ignoring names
    pub fn same_types(&self, other: &TypeInfo) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.kind.type_name() == b.kind.type_name())
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} version {}, {} fields",
            self.name,
            self.version,
            self.fields.len()
        )
    }
}

impl PartialOrd for TypeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then(self.version.cmp(&other.version))
            .then(self.fields.len().cmp(&other.fields.len()))
            .then_with(|| self.fields.cmp(&other.fields))
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tw_pack::StringEncoding;

    use crate::error::Error;
    use crate::schema::*;

    #[test]
    fn type_names() {
        let cases = [
            ("string", FieldKind::String(StringEncoding::Utf16)),
            ("string_ascii", FieldKind::String(StringEncoding::Utf8)),
            ("optstring_ascii", FieldKind::OptString(StringEncoding::Utf8)),
            ("autonumber", FieldKind::Int),
            ("yesno", FieldKind::Boolean),
            ("double", FieldKind::Single),
            ("decimal", FieldKind::Single),
            ("blob0", FieldKind::Blob(0)),
            ("blob16", FieldKind::Blob(16)),
        ];
        for (name, kind) in cases {
            assert_eq!(name.parse::<FieldKind>().ok(), Some(kind), "{name}");
        }
    }

    #[test]
    fn unknown_type_names() {
        for name in ["blob", "blobx", "blob4x", "text", ""] {
            assert!(
                matches!(name.parse::<FieldKind>(), Err(Error::UnknownFieldType(_))),
                "{name}"
            );
        }
    }

    #[test]
    fn references() {
        let reference: FieldReference = "units_tables.key".parse().unwrap();
        assert_eq!(reference, FieldReference::new("units_tables".into(), "key".into()));
        assert_eq!(reference.to_string(), "units_tables.key");

        assert_eq!(FieldReference::parse_optional("").unwrap(), None);
        assert!(matches!(
            "no_dot".parse::<FieldReference>(),
            Err(Error::InvalidReference(_))
        ));
        assert!(matches!(
            ".key".parse::<FieldReference>(),
            Err(Error::InvalidReference(_))
        ));
    }

    #[test]
    fn same_types_ignores_names() {
        let a = TypeInfo::new(
            "t".into(),
            1,
            vec![FieldDef::new("a", FieldKind::Int), FieldDef::new("b", FieldKind::Boolean)],
        );
        let b = TypeInfo::new(
            "t".into(),
            2,
            vec![FieldDef::new("x", FieldKind::Int), FieldDef::new("y", FieldKind::Boolean)],
        );
        let c = TypeInfo::new("t".into(), 2, vec![FieldDef::new("x", FieldKind::Int)]);

        assert!(a.same_types(&b));
        assert!(!a.same_types(&c));
        assert_eq!(a.index_of("b"), Some(1));
        assert_eq!(a.field("missing"), None);
    }

    #[test]
    fn ordering() {
        let short = TypeInfo::new("a".into(), 1, vec![FieldDef::new("z", FieldKind::Int)]);
        let long = TypeInfo::new(
            "a".into(),
            1,
            vec![FieldDef::new("a", FieldKind::Int), FieldDef::new("b", FieldKind::Int)],
        );
        let newer = TypeInfo::new("a".into(), 2, vec![]);
        let other = TypeInfo::new("b".into(), 0, vec![]);

        let mut infos = vec![other.clone(), newer.clone(), long.clone(), short.clone()];
        infos.sort();
        assert_eq!(infos, vec![short, long, newer, other]);
    }
}
