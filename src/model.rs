use std::collections::HashMap;

use serde::Serialize;

/// A parsed PDF value. Numbers are kept as a single f64 case; the PDF
/// syntax at this level does not distinguish integers from reals.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Number(f64),
    Name(String),
    LiteralString(Vec<u8>),
    HexString(Vec<u8>),
    Array(Vec<Object>),
    Dictionary(HashMap<String, Object>),
    Reference { obj_num: u32, gen_num: u16 },
    Stream {
        dict: HashMap<String, Object>,
        data: Vec<u8>,
    },
    Keyword(String),
}

impl Object {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Object::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view of a number. Values with a fractional part or outside
    /// the i64 range are rejected so array indexing stays round-trip safe.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Object::Number(v) if v.is_finite() && v.fract() == 0.0 => {
                if *v >= i64::MIN as f64 && *v <= i64::MAX as f64 {
                    Some(*v as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&HashMap<String, Object>> {
        match self {
            Object::Dictionary(v) => Some(v),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(v) => Some(v),
            _ => None,
        }
    }

    /// String payload regardless of literal or hex notation.
    pub fn as_string_bytes(&self) -> Option<&[u8]> {
        match self {
            Object::LiteralString(v) => Some(v),
            Object::HexString(v) => Some(v),
            _ => None,
        }
    }
}

/// The emitted document record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub metadata: Metadata,
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub creator: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub producer: String,
    pub encrypted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub page_number: u32,
    pub content: String,
    /// Unicode scalar values in `content`, not bytes.
    pub char_count: usize,
    pub width: f64,
    pub height: f64,
}
