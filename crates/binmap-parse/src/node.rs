//! Parse products: the node tree, leaf projection, and stream records.

use serde::Serialize;

use binmap_core::{Endian, EndianSource, TypeGroup, Value};

/// A node in the parse tree.
///
/// Leaves carry a decoded [`Value`]; containers (structs, arrays)
/// carry children instead. Offsets are absolute file offsets and
/// lengths are the byte spans actually consumed.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedNode {
    /// Dotted path with `[i]` segments for array elements
    pub path: String,
    /// Absolute file offset
    pub offset: u64,
    /// Bytes actually consumed
    pub length: u64,
    /// Display type name from the grammar
    pub type_name: String,
    /// Decoded value; `None` for containers and failed decodes
    pub value: Option<Value>,
    /// Children for containers
    pub children: Option<Vec<ParsedNode>>,
    /// Soft decode failure for this node
    pub error: Option<String>,
    /// Effective endianness (endian-sensitive leaves only)
    pub endian: Option<Endian>,
    /// Where the effective endianness came from
    pub endian_source: Option<EndianSource>,
    /// Color override from the grammar
    pub color: Option<String>,
}

impl ParsedNode {
    /// Whether this node is a leaf (no children).
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Byte offset one past the end of this node.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// Render this subtree as JSON for CLI output.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("path".into(), self.path.clone().into());
        map.insert("offset".into(), self.offset.into());
        map.insert("length".into(), self.length.into());
        map.insert("type".into(), self.type_name.clone().into());
        if let Some(value) = &self.value {
            map.insert("value".into(), value_json(value));
        }
        if let Some(error) = &self.error {
            map.insert("error".into(), error.clone().into());
        }
        if let Some(children) = &self.children {
            map.insert(
                "children".into(),
                children.iter().map(ParsedNode::to_json).collect(),
            );
        }
        serde_json::Value::Object(map)
    }
}

/// Flat projection of a parsed leaf, the unit consumed by span
/// indexing, coverage, and intersection.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedField {
    /// Dotted path of the leaf
    pub path: String,
    /// Absolute file offset
    pub offset: u64,
    /// Bytes actually consumed
    pub length: u64,
    /// Display type name from the grammar
    pub type_name: String,
    /// Decoded value, if the decode succeeded
    pub value: Option<Value>,
    /// Soft decode failure
    pub error: Option<String>,
    /// Effective endianness (endian-sensitive leaves only)
    pub endian: Option<Endian>,
    /// Where the effective endianness came from
    pub endian_source: Option<EndianSource>,
    /// Color override from the grammar
    pub color: Option<String>,
}

impl ParsedField {
    /// Semantic group for span coloring, from the decoded value when
    /// present, else from the type name.
    pub fn group(&self) -> TypeGroup {
        match &self.value {
            Some(v) => v.group(),
            None => TypeGroup::from_type_name(&self.type_name),
        }
    }

    /// Byte offset one past the end of this leaf.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// One record from a record-stream parse.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedRecord {
    /// Position in the stream, starting at 0
    pub index: usize,
    /// Absolute offset where the record starts
    pub offset: u64,
    /// Consumed length in bytes
    pub size: u64,
    /// Dispatched record type name
    pub type_name: String,
    /// Parsed field tree of the record
    pub node: ParsedNode,
    /// Leaf projection of the record's fields
    pub leaves: Vec<ParsedField>,
    /// Record-level failure (truncated body, failed dispatch, ...)
    pub error: Option<String>,
}

impl ParsedRecord {
    /// Byte offset one past the end of this record.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Render a decoded value as JSON; bytes become hex text.
pub fn value_json(value: &Value) -> serde_json::Value {
    match value {
        Value::UInt(v) => (*v).into(),
        Value::Int(v) => (*v).into(),
        Value::Float(v) => serde_json::json!(*v),
        Value::Str(s) => s.clone().into(),
        Value::Bytes(b) => {
            let hex: String = b.iter().map(|byte| format!("{byte:02x}")).collect();
            hex.into()
        }
    }
}
