//! The resolved, immutable grammar model.
//!
//! Everything here comes out of [`crate::loader::load_grammar`] with
//! aliases expanded, `array of T` shorthand rewritten, and type
//! references inlined. The parser never touches the type registry at
//! runtime; record-stream grammars keep a map of resolved record
//! templates for switch dispatch.

use std::collections::BTreeMap;

use serde::Serialize;

use binmap_core::{Encoding, Endian, PrimType};

/// A loaded grammar: either a one-shot schema or a record stream.
#[derive(Debug, Clone, Serialize)]
pub struct Grammar {
    /// Root-level endianness declaration, lowest-priority candidate
    /// in the resolution hierarchy.
    pub root_endian: Option<Endian>,
    /// Schema or record-stream shape.
    pub kind: GrammarKind,
}

impl Grammar {
    /// Fields of a schema-mode grammar, empty for record streams.
    pub fn schema_fields(&self) -> &[Field] {
        match &self.kind {
            GrammarKind::Schema { fields } => fields,
            GrammarKind::RecordStream(_) => &[],
        }
    }
}

/// Top-level grammar shape.
#[derive(Debug, Clone, Serialize)]
pub enum GrammarKind {
    /// Ordered field list parsed once from offset 0.
    Schema {
        /// Root fields in document order
        fields: Vec<Field>,
    },
    /// Framed record repetition with dispatch.
    RecordStream(RecordStreamDef),
}

/// Record-stream framing and dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct RecordStreamDef {
    /// How repetition terminates
    pub framing: Framing,
    /// How each record's type is chosen
    pub record: RecordRule,
    /// Resolved record templates by type name. Each template is an
    /// anonymous struct field ready for the parser.
    pub types: BTreeMap<String, Field>,
}

/// Repetition bound for a record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Framing {
    /// Repeat until the reader is exhausted
    UntilEof,
    /// Exactly this many records
    Count(u64),
}

/// Record dispatch rule.
#[derive(Debug, Clone, Serialize)]
pub enum RecordRule {
    /// Every record uses one named type
    Use(String),
    /// Discriminated dispatch via a header sub-parse
    Switch(SwitchRule),
}

/// Switch dispatch: sub-parse `header_type` at the cursor, read
/// `discriminator`, match against `cases`, fall back to `default`.
#[derive(Debug, Clone, Serialize)]
pub struct SwitchRule {
    /// Header type sub-parsed without advancing the cursor
    pub header_type: String,
    /// Field name inside the header type carrying the discriminator
    pub discriminator: String,
    /// Case key → record type name, in document order
    pub cases: Vec<(CaseKey, String)>,
    /// Record type when no case matches
    pub default: Option<String>,
}

/// A switch case key, normalized at load time.
///
/// Numeric keys (decimal or `0x` hex, quoted or not) normalize to
/// integers so `"0x4E54"` and `20052` dispatch identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CaseKey {
    Int(u64),
    Text(String),
}

/// A positional entry within a struct or the grammar root.
#[derive(Debug, Clone, Serialize)]
pub struct Field {
    /// Field name; empty for anonymous array elements and record
    /// templates (paths are synthesized by the parser).
    pub name: String,
    /// Explicit absolute (root) or struct-relative offset. Absent
    /// means "at the running cursor".
    pub offset: Option<u64>,
    /// Field-level endian override (use site)
    pub endian: Option<Endian>,
    /// Endian carried by the type definition this field resolved
    /// through, the second candidate in the hierarchy.
    pub type_endian: Option<Endian>,
    /// Color override for span rendering (named or `#rrggbb`)
    pub color: Option<String>,
    /// Display type name (primitive keyword, `struct`, `array`, or
    /// the alias name the author wrote)
    pub type_name: String,
    /// Kind-specific definition
    pub kind: FieldKind,
}

/// Field kind after resolution.
#[derive(Debug, Clone, Serialize)]
pub enum FieldKind {
    Primitive(PrimDef),
    Struct(StructDef),
    Array(ArrayDef),
}

/// Primitive leaf definition.
#[derive(Debug, Clone, Serialize)]
pub struct PrimDef {
    /// Primitive type
    pub prim: PrimType,
    /// Length for `bytes` and fixed `string` (literal or sibling ref)
    pub length: Option<LengthSpec>,
    /// String encoding; ignored for non-strings
    pub encoding: Encoding,
    /// Null-terminated string scan instead of a fixed window
    pub null_terminated: bool,
    /// Scan bound, required when `null_terminated`
    pub max_length: Option<u64>,
}

/// Struct definition: ordered children.
#[derive(Debug, Clone, Serialize)]
pub struct StructDef {
    /// Children in document order
    pub fields: Vec<Field>,
}

/// Array definition.
#[derive(Debug, Clone, Serialize)]
pub struct ArrayDef {
    /// Element count (literal or sibling ref). Always present after
    /// validation.
    pub length: LengthSpec,
    /// Fixed element stride; absent means elements parse
    /// consecutively, each advancing by its consumed length.
    pub stride: Option<u64>,
    /// Row-major or column-major layout
    pub layout: Layout,
    /// Element template. Anonymous; for `soa` this is a struct whose
    /// fields are the columns.
    pub element: Box<Field>,
}

/// Array element layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Layout {
    /// Array-of-structs: elements are contiguous rows
    Aos,
    /// Struct-of-arrays: the file stores each column's values
    /// back-to-back; requires fixed-size columns
    Soa,
}

impl Layout {
    /// Parse a `layout:` value.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "aos" => Some(Layout::Aos),
            "soa" => Some(Layout::Soa),
            _ => None,
        }
    }
}

/// Length/count source for `bytes`, `string`, and arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LengthSpec {
    /// Literal byte length or element count
    Literal(u64),
    /// Reference to an earlier sibling field's decoded value
    Ref(String),
}

impl Field {
    /// Statically-known byte size, when every part of this field has
    /// a fixed width. Used for SoA column validation and
    /// explicit-offset overlap checks.
    pub fn static_size(&self) -> Option<u64> {
        match &self.kind {
            FieldKind::Primitive(p) => match p.prim.width() {
                Some(w) => Some(w),
                None => {
                    if p.null_terminated {
                        return None;
                    }
                    match &p.length {
                        Some(LengthSpec::Literal(n)) => Some(*n),
                        _ => None,
                    }
                }
            },
            FieldKind::Struct(s) => {
                let mut total = 0u64;
                for f in &s.fields {
                    // Explicit offsets break contiguity
                    if f.offset.is_some() {
                        return None;
                    }
                    total = total.checked_add(f.static_size()?)?;
                }
                Some(total)
            }
            FieldKind::Array(a) => {
                let count = match &a.length {
                    LengthSpec::Literal(n) => *n,
                    LengthSpec::Ref(_) => return None,
                };
                let per = match a.stride {
                    Some(s) => s,
                    None => a.element.static_size()?,
                };
                per.checked_mul(count)
            }
        }
    }
}
