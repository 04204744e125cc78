//! binmap-parse
//!
//! The parser core: applies a loaded grammar to a reader and produces
//! a typed tree of parsed nodes plus a flat leaf projection.
//!
//! Schema mode parses a fixed field tree once from offset 0;
//! record-stream mode repeats a framed record decode, optionally
//! dispatching each record's type through a switch on a header
//! sub-parse. Parse errors are soft: failing nodes carry an `error`
//! and parsing continues with a best-effort cursor.

pub mod context;
pub mod node;
pub mod schema;
pub mod stream;

pub use context::ParseOptions;
pub use node::{ParsedField, ParsedNode, ParsedRecord};
pub use schema::{parse_schema, parse_schema_with, ParseOutcome};
pub use stream::{parse_stream, parse_stream_with, RecordStream};
