//! Record-stream parsing: framed repetition with switch dispatch.
//!
//! A pull-style iterator decodes one record per `next()` call so
//! callers can window or paginate without materializing the whole
//! stream. Dispatch sub-parses the header type at the cursor without
//! advancing, normalizes the discriminator and case keys to integers,
//! and falls back to `default`. A record that makes no forward
//! progress (or an unmatched switch with no default) terminates the
//! stream.

use tracing::{debug, warn};

use binmap_core::{Endian, Error, PagedReader, Result, Value};
use binmap_grammar::{CaseKey, Field, Framing, Grammar, GrammarKind, RecordRule, RecordStreamDef};

use crate::context::ParseOptions;
use crate::node::{ParsedNode, ParsedRecord};
use crate::schema::parse_template;

/// Pull-style iterator over the records of a record-stream grammar.
pub struct RecordStream<'a> {
    reader: &'a PagedReader,
    stream: &'a RecordStreamDef,
    root_endian: Option<Endian>,
    options: ParseOptions,
    cursor: u64,
    index: usize,
    finished: bool,
}

/// Begin iterating records. Fails when the grammar is not a
/// record stream.
pub fn parse_stream<'a>(reader: &'a PagedReader, grammar: &'a Grammar) -> Result<RecordStream<'a>> {
    parse_stream_with(reader, grammar, ParseOptions::default())
}

/// Begin iterating records with explicit options.
pub fn parse_stream_with<'a>(
    reader: &'a PagedReader,
    grammar: &'a Grammar,
    options: ParseOptions,
) -> Result<RecordStream<'a>> {
    match &grammar.kind {
        GrammarKind::RecordStream(stream) => Ok(RecordStream {
            reader,
            stream,
            root_endian: grammar.root_endian,
            options,
            cursor: 0,
            index: 0,
            finished: false,
        }),
        GrammarKind::Schema { .. } => Err(Error::schema(vec![
            "grammar is a schema; use parse_schema".into(),
        ])),
    }
}

impl<'a> RecordStream<'a> {
    /// Current cursor position (start of the next record).
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// Whether the stream hit a fatal error and stopped early.
    pub fn finished_with_error(&self) -> bool {
        self.finished && self.cursor < self.reader.size()
    }

    /// Dispatch the record type for the record starting at `offset`.
    fn dispatch(&self, offset: u64) -> std::result::Result<&'a str, String> {
        match &self.stream.record {
            RecordRule::Use(name) => Ok(name.as_str()),
            RecordRule::Switch(switch) => {
                let Some(header) = self.stream.types.get(&switch.header_type) else {
                    return Err(format!("unknown type reference: {}", switch.header_type));
                };
                // Speculative sub-parse; the cursor does not move
                let (node, _, _) = parse_template(
                    self.reader,
                    header,
                    offset,
                    &switch.header_type,
                    self.root_endian,
                    &self.options,
                );
                let discriminator = find_child_value(&node, &switch.discriminator);
                let Some(value) = discriminator else {
                    return Err(format!(
                        "switch discriminator '{}' unreadable at {offset:#x}",
                        switch.discriminator
                    ));
                };

                let matched = switch.cases.iter().find_map(|(key, target)| {
                    let hit = match (key, &value) {
                        (CaseKey::Int(k), v) => v.as_discriminant() == Some(*k),
                        (CaseKey::Text(k), Value::Str(s)) => k == s,
                        (CaseKey::Text(_), _) => false,
                    };
                    hit.then_some(target.as_str())
                });
                match matched {
                    Some(target) => Ok(target),
                    None => match &switch.default {
                        Some(default) => Ok(default.as_str()),
                        None => Err(format!(
                            "unmatched switch value {value:?} at {offset:#x} and no default"
                        )),
                    },
                }
            }
        }
    }

    fn template(&self, name: &str) -> Option<&'a Field> {
        self.stream.types.get(name)
    }

    /// Emit a terminal record carrying a fatal error and stop.
    fn fatal(&mut self, offset: u64, message: String) -> ParsedRecord {
        warn!(offset, %message, "record stream terminated");
        self.finished = true;
        ParsedRecord {
            index: self.index,
            offset,
            size: 0,
            type_name: String::new(),
            node: ParsedNode {
                path: String::new(),
                offset,
                length: 0,
                type_name: String::new(),
                value: None,
                children: Some(Vec::new()),
                error: Some(message.clone()),
                endian: None,
                endian_source: None,
                color: None,
            },
            leaves: Vec::new(),
            error: Some(message),
        }
    }
}

impl<'a> Iterator for RecordStream<'a> {
    type Item = ParsedRecord;

    fn next(&mut self) -> Option<ParsedRecord> {
        if self.finished || self.cursor >= self.reader.size() {
            return None;
        }
        if let Framing::Count(n) = self.stream.framing {
            if (self.index as u64) >= n {
                return None;
            }
        }
        if let Some(max) = self.options.max_records {
            if (self.index as u64) >= max {
                warn!(max, "record sanity cap reached, stopping stream");
                self.finished = true;
                return None;
            }
        }

        let offset = self.cursor;
        let type_name = match self.dispatch(offset) {
            Ok(name) => name,
            Err(message) => return Some(self.fatal(offset, message)),
        };
        let Some(template) = self.template(type_name) else {
            return Some(self.fatal(offset, format!("unknown type reference: {type_name}")));
        };

        let (node, leaves, errors) = parse_template(
            self.reader,
            template,
            offset,
            type_name,
            self.root_endian,
            &self.options,
        );
        let size = node.length;
        if size == 0 {
            return Some(self.fatal(offset, format!("zero-length record at {offset:#x}")));
        }

        let error = if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        };
        let record = ParsedRecord {
            index: self.index,
            offset,
            size,
            type_name: type_name.to_string(),
            node,
            leaves,
            error,
        };
        self.cursor = offset + size;
        self.index += 1;
        if self.cursor >= self.reader.size() {
            debug!(records = self.index, "record stream reached EOF");
        }
        Some(record)
    }
}

/// Direct child value of a parsed struct node, by field name.
fn find_child_value(node: &ParsedNode, name: &str) -> Option<Value> {
    let children = node.children.as_ref()?;
    children
        .iter()
        .find(|c| c.path.rsplit('.').next() == Some(name))
        .and_then(|c| c.value.clone())
}
