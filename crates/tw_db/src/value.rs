//! Field values and their binary encoding.
//!
//! Values keep their external form as text. Scalars are stored in canonical form: whatever
//! was read from disk or assigned, integers are written without leading zeros, booleans as
//! `true`/`false` and blobs as lowercase hex bytes separated by spaces.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io::{Read, Seek, Write};
use tracing::trace;
use tw_pack::primitives::{
    read_blob, read_length_prefixed_string, write_blob, write_length_prefixed_string,
};
use tw_pack::StringEncoding;

use crate::error::{Error, Result};
use crate::schema::{FieldDef, FieldKind, ListDef};

/// The value of one field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue {
    /// Any kind but optional strings and lists
    Scalar(String),
    /// An optional string and whether its presence byte was set
    Optional { value: String, present: bool },
    /// Items of a list, one value per child field
    List(Vec<Vec<FieldValue>>),
}

impl FieldValue {
    /// The value a new row starts with
    pub fn default_for(kind: &FieldKind) -> FieldValue {
        match kind {
            FieldKind::String(_) => FieldValue::Scalar(String::new()),
            FieldKind::OptString(_) => FieldValue::Optional {
                value: String::new(),
                present: false,
            },
            FieldKind::Int | FieldKind::Short | FieldKind::Single | FieldKind::Double => {
                FieldValue::Scalar("0".into())
            }
            FieldKind::Boolean => FieldValue::Scalar("false".into()),
            FieldKind::Blob(length) => FieldValue::Scalar(hex(&vec![0u8; *length])),
            FieldKind::List(_) => FieldValue::List(Vec::new()),
        }
    }

    /// Validate `text` for `kind` and bring it into canonical form.
    ///
    /// Lists cannot be created from text.
    pub fn parse(kind: &FieldKind, text: &str) -> Result<FieldValue> {
        let value = match kind {
            FieldKind::String(_) => FieldValue::Scalar(text.to_owned()),
            FieldKind::OptString(_) => FieldValue::Optional {
                value: text.to_owned(),
                present: !text.trim().is_empty(),
            },
            FieldKind::Int => {
                let text = text.trim();
                if text.is_empty() {
                    FieldValue::Scalar("0".into())
                } else {
                    FieldValue::Scalar(parse_number::<i32>(kind, text)?.to_string())
                }
            }
            FieldKind::Short => FieldValue::Scalar(parse_number::<u16>(kind, text)?.to_string()),
            FieldKind::Single => FieldValue::Scalar(parse_number::<f32>(kind, text)?.to_string()),
            FieldKind::Double => FieldValue::Scalar(parse_number::<f64>(kind, text)?.to_string()),
            FieldKind::Boolean => FieldValue::Scalar(parse_bool(text)?.to_string()),
            FieldKind::Blob(length) => FieldValue::Scalar(hex(&parse_hex(text, *length)?)),
            FieldKind::List(_) => {
                return Err(Error::invalid_value(
                    kind,
                    text,
                    "lists cannot be set from text",
                ))
            }
        };
        Ok(value)
    }

    /// Text of a scalar or optional string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(value) | FieldValue::Optional { value, .. } => Some(value),
            FieldValue::List(_) => None,
        }
    }

    /// Items of a list
    pub fn items(&self) -> Option<&[Vec<FieldValue>]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// External form of the value; lists describe their size.
    pub fn text(&self, kind: &FieldKind) -> String {
        match self {
            FieldValue::List(items) => {
                format!("{} entries, length {}", items.len(), self.length(kind))
            }
            other => other.as_str().unwrap_or_default().to_owned(),
        }
    }

    /// Byte length of the data the value holds.
    ///
    /// Strings count their encoded bytes without the length prefix.
    pub fn length(&self, kind: &FieldKind) -> usize {
        match (kind, self) {
            (FieldKind::String(encoding) | FieldKind::OptString(encoding), value) => {
                encoding.encoded_len(value.as_str().unwrap_or_default())
            }
            (FieldKind::Int | FieldKind::Single, _) => 4,
            (FieldKind::Short, _) => 2,
            (FieldKind::Double, _) => 8,
            (FieldKind::Boolean, _) => 1,
            (FieldKind::Blob(length), _) => *length,
            (FieldKind::List(list), FieldValue::List(items)) => {
                list_overhead(list, items.len())
                    + items
                        .iter()
                        .map(|item| row_length(&list.fields, item, FieldValue::length))
                        .sum::<usize>()
            }
            (FieldKind::List(_), _) => 4,
        }
    }

    /// Number of bytes the value occupies on disk
    pub fn read_length(&self, kind: &FieldKind) -> usize {
        match (kind, self) {
            (FieldKind::String(_), _) => self.length(kind) + 2,
            (FieldKind::OptString(_), FieldValue::Optional { present: false, .. }) => 1,
            (FieldKind::OptString(_), _) => self.length(kind) + 3,
            (FieldKind::List(list), FieldValue::List(items)) => {
                list_overhead(list, items.len())
                    + items
                        .iter()
                        .map(|item| row_length(&list.fields, item, FieldValue::read_length))
                        .sum::<usize>()
            }
            _ => self.length(kind),
        }
    }

    /// Read one value of `kind`.
    pub fn decode<R: Read + Seek>(kind: &FieldKind, reader: &mut R) -> Result<FieldValue> {
        let value = match kind {
            FieldKind::String(encoding) => {
                FieldValue::Scalar(read_length_prefixed_string(reader, *encoding)?)
            }
            FieldKind::OptString(encoding) => match read_u8(reader)? {
                0 => FieldValue::Optional {
                    value: String::new(),
                    present: false,
                },
                1 => FieldValue::Optional {
                    value: read_length_prefixed_string(reader, *encoding)?,
                    present: true,
                },
                other => {
                    return Err(Error::invalid_value(
                        kind,
                        format!("{other:#04x}"),
                        "presence byte must be 0 or 1",
                    ))
                }
            },
            FieldKind::Int => FieldValue::Scalar(LittleEndian::read_i32(&read_blob(reader, 4)?).to_string()),
            FieldKind::Short => FieldValue::Scalar(LittleEndian::read_u16(&read_blob(reader, 2)?).to_string()),
            FieldKind::Single => FieldValue::Scalar(LittleEndian::read_f32(&read_blob(reader, 4)?).to_string()),
            FieldKind::Double => FieldValue::Scalar(LittleEndian::read_f64(&read_blob(reader, 8)?).to_string()),
            FieldKind::Boolean => match read_u8(reader)? {
                0 => FieldValue::Scalar("false".into()),
                1 => FieldValue::Scalar("true".into()),
                other => {
                    return Err(Error::invalid_value(
                        kind,
                        format!("{other:#04x}"),
                        "boolean byte must be 0 or 1",
                    ))
                }
            },
            FieldKind::Blob(0) => FieldValue::Scalar(String::new()),
            FieldKind::Blob(length) => FieldValue::Scalar(hex(&read_blob(reader, *length)?)),
            FieldKind::List(list) => {
                let count = LittleEndian::read_i32(&read_blob(reader, 4)?);
                let count = usize::try_from(count).map_err(|_| {
                    Error::invalid_value(kind, count.to_string(), "negative item count")
                })?;
                trace!("reading {} list items", count);

                let mut items = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    let start = reader.stream_position()?;
                    if list.encode_item_indices {
                        read_blob(reader, 4)?;
                    }
                    items.push(decode_row(&list.fields, reader)?);
                    // Every item must consume input
                    if reader.stream_position()? == start {
                        return Err(Error::SchemaMismatch(format!(
                            "list item {} of {} is empty",
                            items.len(),
                            count
                        )));
                    }
                }
                FieldValue::List(items)
            }
        };
        Ok(value)
    }

    /// Write the value as `kind`.
    ///
    /// Strings are trimmed first; an optional string that trims to nothing is written as absent.
    pub fn encode<W: Write>(&self, kind: &FieldKind, writer: &mut W) -> Result<()> {
        match (kind, self) {
            (FieldKind::List(list), FieldValue::List(items)) => {
                let count = i32::try_from(items.len()).map_err(|_| {
                    Error::invalid_value(kind, items.len().to_string(), "too many items")
                })?;
                writer.write_i32::<LittleEndian>(count)?;
                for (index, item) in items.iter().enumerate() {
                    if list.encode_item_indices {
                        writer.write_i32::<LittleEndian>(index as i32)?;
                    }
                    encode_row(&list.fields, item, writer)?;
                }
            }
            (FieldKind::List(_), other) => {
                return Err(Error::invalid_value(
                    kind,
                    other.as_str().unwrap_or_default(),
                    "not a list value",
                ))
            }
            (_, FieldValue::List(items)) => {
                return Err(Error::invalid_value(
                    kind,
                    format!("{} items", items.len()),
                    "list value for a scalar field",
                ))
            }
            (kind, value) => {
                let text = value.as_str().unwrap_or_default();
                encode_scalar(kind, text, writer)?;
            }
        }
        Ok(())
    }
}

fn encode_scalar<W: Write>(kind: &FieldKind, text: &str, writer: &mut W) -> Result<()> {
    match kind {
        FieldKind::String(encoding) => write_string(writer, text.trim(), *encoding)?,
        FieldKind::OptString(encoding) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                writer.write_u8(0)?;
            } else {
                writer.write_u8(1)?;
                write_string(writer, trimmed, *encoding)?;
            }
        }
        FieldKind::Int => {
            let text = text.trim();
            let value = if text.is_empty() {
                0
            } else {
                parse_number::<i32>(kind, text)?
            };
            writer.write_i32::<LittleEndian>(value)?;
        }
        FieldKind::Short => writer.write_u16::<LittleEndian>(parse_number(kind, text)?)?,
        FieldKind::Single => writer.write_f32::<LittleEndian>(parse_number(kind, text)?)?,
        FieldKind::Double => writer.write_f64::<LittleEndian>(parse_number(kind, text)?)?,
        FieldKind::Boolean => writer.write_u8(parse_bool(text)? as u8)?,
        FieldKind::Blob(length) => write_blob(writer, &parse_hex(text, *length)?)?,
        FieldKind::List(_) => {
            return Err(Error::invalid_value(kind, text, "not a list value"));
        }
    }
    Ok(())
}

/// Read one value per field.
pub fn decode_row<R: Read + Seek>(fields: &[FieldDef], reader: &mut R) -> Result<Vec<FieldValue>> {
    fields
        .iter()
        .map(|field| {
            FieldValue::decode(&field.kind, reader).inspect_err(|e| {
                trace!("failed to read field {}: {}", field, e);
            })
        })
        .collect()
}

/// Write one value per field.
pub fn encode_row<W: Write>(fields: &[FieldDef], values: &[FieldValue], writer: &mut W) -> Result<()> {
    if fields.len() != values.len() {
        return Err(Error::SchemaMismatch(format!(
            "row has {} values for {} fields",
            values.len(),
            fields.len()
        )));
    }
    for (field, value) in fields.iter().zip(values) {
        value.encode(&field.kind, writer)?;
    }
    Ok(())
}

fn row_length(
    fields: &[FieldDef],
    values: &[FieldValue],
    measure: fn(&FieldValue, &FieldKind) -> usize,
) -> usize {
    fields
        .iter()
        .zip(values)
        .map(|(field, value)| measure(value, &field.kind))
        .sum()
}

fn list_overhead(list: &ListDef, items: usize) -> usize {
    4 + if list.encode_item_indices { 4 * items } else { 0 }
}

fn write_string<W: Write>(writer: &mut W, value: &str, encoding: StringEncoding) -> Result<()> {
    Ok(write_length_prefixed_string(writer, value, encoding)?)
}

fn read_u8<R: Read + Seek>(reader: &mut R) -> Result<u8> {
    Ok(read_blob(reader, 1)?[0])
}

fn parse_number<T>(kind: &FieldKind, text: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    text.trim()
        .parse::<T>()
        .map_err(|e| Error::invalid_value(kind, text, e))
}

fn parse_bool(text: &str) -> Result<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::invalid_value(
            FieldKind::Boolean,
            text,
            "expected true or false",
        )),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_hex(text: &str, length: usize) -> Result<Vec<u8>> {
    let kind = FieldKind::Blob(length);
    let bytes = text
        .split_whitespace()
        .map(|part| u8::from_str_radix(part, 16).map_err(|e| Error::invalid_value(&kind, text, e)))
        .collect::<Result<Vec<_>>>()?;
    if bytes.len() != length {
        return Err(Error::invalid_value(
            &kind,
            text,
            format!("expected {} bytes, got {}", length, bytes.len()),
        ));
    }
    Ok(bytes)
}
