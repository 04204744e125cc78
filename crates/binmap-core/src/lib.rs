//! binmap-core
//!
//! Shared foundation for the binmap workspace: the `Value` sum type
//! produced by parsers, endianness resolution, primitive and string
//! decoders, and the `PagedReader` random-access file abstraction.

pub mod endian;
pub mod error;
pub mod primitives;
pub mod reader;
pub mod strings;
pub mod types;

pub use endian::{resolve_endian, Endian, EndianSource};
pub use error::{Error, Result};
pub use reader::PagedReader;
pub use types::{Encoding, PrimType, TypeGroup, Value};

/// Default safety cap for `bytes`/`string`/array lengths, in bytes.
///
/// A resolved length above this is reported as a node error instead of
/// being read; parsers accept an override for callers that know better.
pub const DEFAULT_LENGTH_CAP: u64 = 1_000_000;
