//! binmap-grammar
//!
//! Loader for the declarative binary-format grammar: a YAML-shaped
//! text document describing either a one-shot `schema` (ordered field
//! tree parsed from offset 0) or a `record_stream` (framed repetition
//! with optional switch dispatch).
//!
//! The loader validates everything it can up front (type references,
//! alias chains and cycles, array lengths, null-terminated string
//! bounds) and aggregates every diagnostic into a single
//! [`SchemaError`] instead of failing on the first.

pub mod loader;
pub mod model;
pub mod scalar;

pub use loader::{load_grammar, SchemaError};
pub use model::{
    ArrayDef, CaseKey, Field, FieldKind, Framing, Grammar, GrammarKind, Layout, LengthSpec,
    PrimDef, RecordRule, RecordStreamDef, StructDef, SwitchRule,
};
