//! EXIF tag reading and JSON-safe value representation.

use exif::{Context, Exif, Field, In, Reader, Value};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::io::Cursor;

/// Decoded EXIF tags keyed by tag name.
pub type ExifTagSet = BTreeMap<String, ExifValue>;

/// Closed representation of an EXIF tag value.
///
/// The tag reader hands back a dozen raw TIFF value types; collapsing them
/// here keeps the serialization rules in one place instead of stringifying
/// ad hoc at every call site.
#[derive(Debug, Clone, PartialEq)]
pub enum ExifValue {
    Int(i64),
    Rational { num: i64, denom: i64 },
    Text(String),
    Bytes(Vec<u8>),
}

impl ExifValue {
    pub fn from_field(field: &Field) -> ExifValue {
        match &field.value {
            Value::Byte(v) if v.len() == 1 => ExifValue::Int(i64::from(v[0])),
            Value::Short(v) if v.len() == 1 => ExifValue::Int(i64::from(v[0])),
            Value::Long(v) if v.len() == 1 => ExifValue::Int(i64::from(v[0])),
            Value::SByte(v) if v.len() == 1 => ExifValue::Int(i64::from(v[0])),
            Value::SShort(v) if v.len() == 1 => ExifValue::Int(i64::from(v[0])),
            Value::SLong(v) if v.len() == 1 => ExifValue::Int(i64::from(v[0])),
            Value::Rational(v) if v.len() == 1 => ExifValue::Rational {
                num: i64::from(v[0].num),
                denom: i64::from(v[0].denom),
            },
            Value::SRational(v) if v.len() == 1 => ExifValue::Rational {
                num: i64::from(v[0].num),
                denom: i64::from(v[0].denom),
            },
            Value::Ascii(v) => {
                let text = v
                    .iter()
                    .map(|s| String::from_utf8_lossy(s).into_owned())
                    .collect::<Vec<_>>()
                    .join(", ");
                ExifValue::Text(text.trim_end_matches(['\0', ' ']).to_string())
            }
            Value::Undefined(bytes, _) => ExifValue::Bytes(bytes.clone()),
            // Multi-valued numerics and floats keep the reader's display form.
            _ => ExifValue::Text(field.display_value().to_string()),
        }
    }
}

impl Serialize for ExifValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ExifValue::Int(v) => serializer.serialize_i64(*v),
            ExifValue::Rational { num, denom } => {
                if *denom == 1 {
                    serializer.serialize_i64(*num)
                } else {
                    serializer.serialize_str(&format!("{}/{}", num, denom))
                }
            }
            ExifValue::Text(t) => serializer.serialize_str(t),
            ExifValue::Bytes(b) => {
                if !b.is_empty() && b.iter().all(|c| c.is_ascii_graphic() || *c == b' ') {
                    serializer.serialize_str(&String::from_utf8_lossy(b))
                } else {
                    let hex: String = b.iter().map(|c| format!("{:02x}", c)).collect();
                    serializer.serialize_str(&format!("0x{}", hex))
                }
            }
        }
    }
}

/// Parse the EXIF container out of raw upload bytes.
///
/// Most images carry no EXIF at all; that is reported as `None`, not an
/// error.
pub fn read_exif(bytes: &[u8]) -> Option<Exif> {
    let mut cursor = Cursor::new(bytes);
    Reader::new().read_from_container(&mut cursor).ok()
}

/// Build the tag-name map from the primary image IFD.
///
/// GPS tags are excluded here; the GPS extractor consumes that sub-block
/// separately.
pub fn tag_set(exif: &Exif) -> ExifTagSet {
    let mut tags = BTreeMap::new();
    for field in exif.fields() {
        if field.ifd_num != In::PRIMARY || field.tag.context() == Context::Gps {
            continue;
        }
        tags.insert(field.tag.to_string(), ExifValue::from_field(field));
    }
    tags
}
