//! Common value and type vocabulary shared by the grammar and parser.

use serde::{Deserialize, Serialize};

/// Decoded value carried by a parsed leaf.
///
/// Container nodes (structs, arrays) carry no value; their meaning
/// lives in their children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Unsigned integer (u8..u64)
    UInt(u64),
    /// Signed integer (i8..i64)
    Int(i64),
    /// Floating point (f32 widened, f64)
    Float(f64),
    /// Raw byte run
    Bytes(Vec<u8>),
    /// Decoded string
    Str(String),
}

impl Value {
    /// Interpret this value as a non-negative count, for length and
    /// array-count references. Strings and floats never qualify.
    pub fn as_count(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            Value::Int(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }

    /// Interpret this value as a switch discriminator integer.
    pub fn as_discriminant(&self) -> Option<u64> {
        self.as_count()
    }

    /// Grouping used for span coloring.
    pub fn group(&self) -> TypeGroup {
        match self {
            Value::UInt(_) | Value::Int(_) => TypeGroup::Int,
            Value::Float(_) => TypeGroup::Float,
            Value::Bytes(_) => TypeGroup::Bytes,
            Value::Str(_) => TypeGroup::Str,
        }
    }

    /// Short name of the contained variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::UInt(_) => "uint",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bytes(_) => "bytes",
            Value::Str(_) => "string",
        }
    }
}

/// Semantic group of a leaf, mirroring the [`Value`] tag for indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeGroup {
    Int,
    Float,
    /// Decoded text
    #[serde(rename = "string")]
    Str,
    Bytes,
    Unknown,
}

impl TypeGroup {
    /// Classify a grammar type name (`u8`, `f32`, `string`, ...).
    pub fn from_type_name(name: &str) -> Self {
        let t = name.to_ascii_lowercase();
        if t.starts_with('u') || t.starts_with('i') {
            TypeGroup::Int
        } else if t.starts_with('f') {
            TypeGroup::Float
        } else if t == "string" {
            TypeGroup::Str
        } else if t == "bytes" {
            TypeGroup::Bytes
        } else {
            TypeGroup::Unknown
        }
    }

    /// Lowercase label used in reports and JSON output.
    pub fn label(&self) -> &'static str {
        match self {
            TypeGroup::Int => "int",
            TypeGroup::Float => "float",
            TypeGroup::Str => "string",
            TypeGroup::Bytes => "bytes",
            TypeGroup::Unknown => "unknown",
        }
    }
}

/// Primitive field types recognized by the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Bytes,
    /// Text with its own encoding axis
    #[serde(rename = "string")]
    Str,
}

impl PrimType {
    /// Look up a primitive keyword from the grammar document.
    pub fn from_keyword(name: &str) -> Option<Self> {
        Some(match name {
            "u8" => PrimType::U8,
            "u16" => PrimType::U16,
            "u32" => PrimType::U32,
            "u64" => PrimType::U64,
            "i8" => PrimType::I8,
            "i16" => PrimType::I16,
            "i32" => PrimType::I32,
            "i64" => PrimType::I64,
            "f32" => PrimType::F32,
            "f64" => PrimType::F64,
            "bytes" => PrimType::Bytes,
            "string" => PrimType::Str,
            _ => return None,
        })
    }

    /// Fixed byte width, or `None` for `bytes`/`string` which take a
    /// length from the grammar.
    pub fn width(&self) -> Option<u64> {
        Some(match self {
            PrimType::U8 | PrimType::I8 => 1,
            PrimType::U16 | PrimType::I16 => 2,
            PrimType::U32 | PrimType::I32 | PrimType::F32 => 4,
            PrimType::U64 | PrimType::I64 | PrimType::F64 => 8,
            PrimType::Bytes | PrimType::Str => return None,
        })
    }

    /// Whether decoding this type consults endianness. `u8`, `i8`,
    /// `bytes`, and `string` are the only endian-free primitives.
    pub fn is_endian_sensitive(&self) -> bool {
        !matches!(
            self,
            PrimType::U8 | PrimType::I8 | PrimType::Bytes | PrimType::Str
        )
    }

    /// Signedness for integer decoding.
    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            PrimType::I8 | PrimType::I16 | PrimType::I32 | PrimType::I64
        )
    }

    /// Grammar keyword for this primitive.
    pub fn keyword(&self) -> &'static str {
        match self {
            PrimType::U8 => "u8",
            PrimType::U16 => "u16",
            PrimType::U32 => "u32",
            PrimType::U64 => "u64",
            PrimType::I8 => "i8",
            PrimType::I16 => "i16",
            PrimType::I32 => "i32",
            PrimType::I64 => "i64",
            PrimType::F32 => "f32",
            PrimType::F64 => "f64",
            PrimType::Bytes => "bytes",
            PrimType::Str => "string",
        }
    }

    /// Span group of values produced by this primitive.
    pub fn group(&self) -> TypeGroup {
        TypeGroup::from_type_name(self.keyword())
    }
}

/// String encodings supported by the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    #[serde(rename = "ascii")]
    Ascii,
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "utf-16le")]
    Utf16Le,
    #[serde(rename = "utf-16be")]
    Utf16Be,
}

impl Encoding {
    /// Parse an encoding name from a grammar document.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "ascii" => Encoding::Ascii,
            "utf-8" | "utf8" => Encoding::Utf8,
            "utf-16le" | "utf16le" => Encoding::Utf16Le,
            "utf-16be" | "utf16be" => Encoding::Utf16Be,
            _ => return None,
        })
    }

    /// Canonical grammar name.
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Ascii => "ascii",
            Encoding::Utf8 => "utf-8",
            Encoding::Utf16Le => "utf-16le",
            Encoding::Utf16Be => "utf-16be",
        }
    }
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::Ascii
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_as_count() {
        assert_eq!(Value::UInt(7).as_count(), Some(7));
        assert_eq!(Value::Int(3).as_count(), Some(3));
        assert_eq!(Value::Int(-1).as_count(), None);
        assert_eq!(Value::Str("3".into()).as_count(), None);
        assert_eq!(Value::Float(3.0).as_count(), None);
    }

    #[test]
    fn test_type_group_mapping() {
        assert_eq!(TypeGroup::from_type_name("u8"), TypeGroup::Int);
        assert_eq!(TypeGroup::from_type_name("i32"), TypeGroup::Int);
        assert_eq!(TypeGroup::from_type_name("f32"), TypeGroup::Float);
        assert_eq!(TypeGroup::from_type_name("string"), TypeGroup::Str);
        assert_eq!(TypeGroup::from_type_name("bytes"), TypeGroup::Bytes);
        assert_eq!(TypeGroup::from_type_name("weird"), TypeGroup::Unknown);
    }

    #[test]
    fn test_prim_widths() {
        assert_eq!(PrimType::U8.width(), Some(1));
        assert_eq!(PrimType::I64.width(), Some(8));
        assert_eq!(PrimType::F32.width(), Some(4));
        assert_eq!(PrimType::Bytes.width(), None);
        assert_eq!(PrimType::Str.width(), None);
    }

    #[test]
    fn test_endian_free_primitives() {
        assert!(!PrimType::U8.is_endian_sensitive());
        assert!(!PrimType::I8.is_endian_sensitive());
        assert!(!PrimType::Bytes.is_endian_sensitive());
        assert!(!PrimType::Str.is_endian_sensitive());
        assert!(PrimType::U16.is_endian_sensitive());
        assert!(PrimType::F64.is_endian_sensitive());
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!(Encoding::from_name("utf-16le"), Some(Encoding::Utf16Le));
        assert_eq!(Encoding::from_name("ASCII"), Some(Encoding::Ascii));
        assert_eq!(Encoding::from_name("latin-1"), None);
    }
}
