//! Reading and writing schema documents.
//!
//! A document has a single root element whose children are `table` elements:
//!
//! ```xml
//! <schema>
//!   <table table_name='units_tables' table_version='3'>
//!     <field name='key' type='string_ascii' pk='true'/>
//!     <field name='category' type='string_ascii' fkey='unit_categories.key'/>
//!     <field name='upkeep' type='list'>
//!       <field name='amount' type='int'/>
//!     </field>
//!   </table>
//!   <table name='Old Units'>
//!     <field name='id' type='blob4'/>
//!   </table>
//! </schema>
//! ```
//!
//! Tables with a `name` attribute predate versioned tables and are imported as version 0.

use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt::Write as _;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::schema::{unify_name, FieldDef, FieldKind, FieldReference, TypeInfo};

enum Frame {
    Root,
    Table(TypeInfo),
    Field(FieldDef),
}

fn attributes(element: &BytesStart) -> Result<IndexMap<String, String>> {
    element
        .attributes()
        .flatten()
        .map(|attr| {
            Ok((
                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                attr.unescape_value()?.into_owned(),
            ))
        })
        .collect()
}

fn require<'a>(attributes: &'a IndexMap<String, String>, key: &str, element: &str) -> Result<&'a str> {
    attributes
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| Error::SchemaDocument(format!("{element} without {key} attribute")))
}

fn table_frame(element: &BytesStart, unify: bool) -> Result<Frame> {
    let attributes = attributes(element)?;
    if let Some(name) = attributes.get("name") {
        let name = if unify { unify_name(name) } else { name.clone() };
        return Ok(Frame::Table(TypeInfo::new(name, 0, Vec::new())));
    }

    let name = require(&attributes, "table_name", "table")?.trim().to_owned();
    let version = require(&attributes, "table_version", "table")?.trim();
    let version = version
        .parse::<i32>()
        .map_err(|e| Error::SchemaDocument(format!("table {name} has version {version:?}: {e}")))?;
    Ok(Frame::Table(TypeInfo::new(name, version, Vec::new())))
}

fn field_frame(element: &BytesStart, unify: bool) -> Result<Frame> {
    let attributes = attributes(element)?;
    let name = require(&attributes, "name", "field")?;
    let kind: FieldKind = require(&attributes, "type", "field")?.parse()?;

    let reference = match attributes.get("fkey") {
        Some(fkey) if unify => FieldReference::parse_optional(&unify_name(fkey))?,
        Some(fkey) => FieldReference::parse_optional(fkey)?,
        None => None,
    };

    let field = FieldDef::builder()
        .name(if unify { unify_name(name) } else { name.to_owned() })
        .kind(kind)
        .maybe_reference(reference)
        .primary_key(attributes.contains_key("pk"))
        .build();
    Ok(Frame::Field(field))
}

fn open(stack: &[Frame], element: &BytesStart, unify: bool) -> Result<Frame> {
    match stack.len() {
        0 => Ok(Frame::Root),
        1 => table_frame(element, unify),
        _ => field_frame(element, unify),
    }
}

fn close(stack: &mut [Frame], frame: Frame, infos: &mut Vec<TypeInfo>) -> Result<()> {
    match (frame, stack.last_mut()) {
        (Frame::Root, _) => {}
        (Frame::Table(info), _) => {
            trace!("imported {}", info);
            infos.push(info);
        }
        (Frame::Field(field), Some(Frame::Table(info))) => info.fields.push(field),
        (Frame::Field(field), Some(Frame::Field(parent))) => match &mut parent.kind {
            FieldKind::List(list) => list.fields.push(field),
            _ => {
                return Err(Error::SchemaDocument(format!(
                    "field {} nested in {} which is not a list",
                    field.name, parent.name
                )))
            }
        },
        (Frame::Field(field), _) => {
            return Err(Error::SchemaDocument(format!(
                "field {} outside of a table",
                field.name
            )))
        }
    }
    Ok(())
}

/// Import every table of a schema document.
///
/// With `unify` set, legacy table names, field names and references are brought into their
/// unified form.
pub fn import(document: &str, unify: bool) -> Result<Vec<TypeInfo>> {
    let mut reader = Reader::from_str(document);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut infos = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                let frame = open(&stack, e, unify)?;
                stack.push(frame);
            }
            Event::Empty(ref e) => {
                let frame = open(&stack, e, unify)?;
                close(&mut stack, frame, &mut infos)?;
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| Error::SchemaDocument("unbalanced end tag".into()))?;
                close(&mut stack, frame, &mut infos)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(Error::SchemaDocument("document ends inside an element".into()));
    }
    debug!("imported {} type definitions", infos.len());
    Ok(infos)
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
}

fn write_field(out: &mut String, field: &FieldDef, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = write!(out, "{indent}<field ");
    if let Some(reference) = &field.reference {
        let _ = write!(out, "fkey='{}' ", escape(&reference.to_string()));
    }
    let _ = write!(out, "name='{}' type='{}' ", escape(&field.name), field.kind);
    if field.primary_key {
        out.push_str("pk='true' ");
    }

    let children = field.kind.list_fields();
    if children.is_empty() {
        out.push_str("/>\n");
    } else {
        out.push_str(">\n");
        for child in children {
            write_field(out, child, depth + 1);
        }
        let _ = writeln!(out, "{indent}</field>");
    }
}

/// Write `infos` as a schema document.
///
/// Infos of one name with identical fields are written once.
pub fn export<'a>(infos: impl IntoIterator<Item = &'a TypeInfo>) -> String {
    let mut by_name: IndexMap<&str, Vec<&TypeInfo>> = IndexMap::new();
    for info in infos {
        let known = by_name.entry(&info.name).or_default();
        if !known.iter().any(|existing| existing.fields == info.fields) {
            known.push(info);
        }
    }

    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<schema>\n");
    for info in by_name.values().flatten() {
        let _ = writeln!(
            out,
            "  <table table_name='{}'\n         table_version='{}' >",
            escape(&info.name),
            info.version
        );
        for field in &info.fields {
            write_field(&mut out, field, 2);
        }
        out.push_str("  </table>\n");
    }
    out.push_str("</schema>\n");
    out
}
