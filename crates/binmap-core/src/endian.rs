//! Endianness: byte-order type, hierarchical resolution, provenance.

use serde::{Deserialize, Serialize};

/// Byte order for multi-byte primitive decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// Parse `little`/`big` from a grammar document.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "little" => Some(Endian::Little),
            "big" => Some(Endian::Big),
            _ => None,
        }
    }

    /// Canonical grammar name.
    pub fn name(&self) -> &'static str {
        match self {
            Endian::Little => "little",
            Endian::Big => "big",
        }
    }
}

impl std::fmt::Display for Endian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a field's effective endianness came from, for diagnostics
/// and UI provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndianSource {
    /// Field-level override
    Field,
    /// Carried by the resolved type definition
    Type,
    /// Inherited from the enclosing struct/container
    Parent,
    /// Grammar root declaration
    Root,
    /// Fallback when nothing is declared
    Default,
}

impl EndianSource {
    /// Lowercase label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            EndianSource::Field => "field",
            EndianSource::Type => "type",
            EndianSource::Parent => "parent",
            EndianSource::Root => "root",
            EndianSource::Default => "default",
        }
    }
}

/// Resolve effective endianness through the four-level hierarchy.
///
/// Priority: field > type > parent > root, defaulting to little.
pub fn resolve_endian(
    field: Option<Endian>,
    type_: Option<Endian>,
    parent: Option<Endian>,
    root: Option<Endian>,
) -> (Endian, EndianSource) {
    if let Some(e) = field {
        return (e, EndianSource::Field);
    }
    if let Some(e) = type_ {
        return (e, EndianSource::Type);
    }
    if let Some(e) = parent {
        return (e, EndianSource::Parent);
    }
    if let Some(e) = root {
        return (e, EndianSource::Root);
    }
    (Endian::Little, EndianSource::Default)
}
