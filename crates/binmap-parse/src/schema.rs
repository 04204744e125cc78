//! Schema-mode parsing: a recursive decode of the grammar's field
//! tree against a reader, from offset 0.
//!
//! The parser keeps a running cursor, a per-struct symbol table of
//! decoded sibling values for length references, and an endian chain.
//! Failures are soft: the failing node records its error, the error
//! also lands in the flattened list, and parsing continues with a
//! best-effort cursor.

use tracing::debug;

use binmap_core::{
    primitives, resolve_endian, strings, Endian, EndianSource, PagedReader, PrimType, Value,
};
use binmap_grammar::{
    ArrayDef, Field, FieldKind, Grammar, GrammarKind, Layout, LengthSpec, PrimDef,
};

use crate::context::{ParseOptions, SymbolTable};
use crate::node::{ParsedField, ParsedNode};

/// Everything a schema parse produces: the node tree, the flat leaf
/// projection, and every soft error encountered.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    /// Root nodes in document order
    pub tree: Vec<ParsedNode>,
    /// Flattened leaves in parse order
    pub leaves: Vec<ParsedField>,
    /// Union of node errors and structural diagnostics (overlap)
    pub errors: Vec<String>,
}

/// Parse a schema grammar with default options.
pub fn parse_schema(reader: &PagedReader, grammar: &Grammar) -> ParseOutcome {
    parse_schema_with(reader, grammar, &ParseOptions::default(), None)
}

/// Parse a schema grammar with explicit options and an optional
/// cooperative-cancellation predicate, checked between top-level
/// fields.
pub fn parse_schema_with(
    reader: &PagedReader,
    grammar: &Grammar,
    options: &ParseOptions,
    cancel: Option<&dyn Fn() -> bool>,
) -> ParseOutcome {
    let fields = match &grammar.kind {
        GrammarKind::Schema { fields } => fields,
        GrammarKind::RecordStream(_) => {
            return ParseOutcome {
                tree: Vec::new(),
                leaves: Vec::new(),
                errors: vec!["grammar is a record stream; use parse_stream".into()],
            };
        }
    };

    let mut parser = FieldParser::new(reader, grammar.root_endian, options);
    let mut symbols = SymbolTable::new();
    let mut cursor = 0u64;
    let mut tree = Vec::with_capacity(fields.len());
    let mut extents = Vec::new();

    for field in fields {
        if let Some(cancel) = cancel {
            if cancel() {
                parser.errors.push("parse cancelled".into());
                break;
            }
        }
        let node = parser.parse_field(field, 0, cursor, "", None, &mut symbols);
        cursor = node.end();
        if node.length > 0 {
            extents.push((node.offset, node.end(), node.path.clone()));
        }
        if let Some(value) = &node.value {
            symbols.insert(&field.name, value.clone());
        }
        tree.push(node);
    }
    parser.check_overlap(&extents);

    debug!(
        leaves = parser.leaves.len(),
        errors = parser.errors.len(),
        "schema parse finished"
    );
    ParseOutcome {
        tree,
        leaves: parser.leaves,
        errors: parser.errors,
    }
}

/// Parse a single resolved field template at an absolute offset.
/// Used by the record-stream parser for headers and record bodies.
pub(crate) fn parse_template(
    reader: &PagedReader,
    template: &Field,
    offset: u64,
    path: &str,
    root_endian: Option<Endian>,
    options: &ParseOptions,
) -> (ParsedNode, Vec<ParsedField>, Vec<String>) {
    let mut parser = FieldParser::new(reader, root_endian, options);
    let mut symbols = SymbolTable::new();
    let node = parser.parse_field(template, offset, offset, path, None, &mut symbols);
    (node, parser.leaves, parser.errors)
}

struct FieldParser<'a> {
    reader: &'a PagedReader,
    root_endian: Option<Endian>,
    options: &'a ParseOptions,
    leaves: Vec<ParsedField>,
    errors: Vec<String>,
}

impl<'a> FieldParser<'a> {
    fn new(reader: &'a PagedReader, root_endian: Option<Endian>, options: &'a ParseOptions) -> Self {
        Self {
            reader,
            root_endian,
            options,
            leaves: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Parse one field. `scope_base` anchors explicit offsets (the
    /// enclosing struct's start), `cursor` is the running position.
    fn parse_field(
        &mut self,
        field: &Field,
        scope_base: u64,
        cursor: u64,
        prefix: &str,
        parent_endian: Option<Endian>,
        symbols: &mut SymbolTable,
    ) -> ParsedNode {
        let path = join_path(prefix, &field.name);
        let offset = match field.offset {
            Some(rel) => scope_base + rel,
            None => cursor,
        };
        match &field.kind {
            FieldKind::Primitive(prim) => {
                self.parse_primitive(field, prim, offset, path, parent_endian, symbols)
            }
            FieldKind::Struct(def) => {
                self.parse_struct(field, &def.fields, offset, path, parent_endian)
            }
            FieldKind::Array(def) => {
                self.parse_array(field, def, offset, path, parent_endian, symbols)
            }
        }
    }

    // ==================== primitives ====================

    fn parse_primitive(
        &mut self,
        field: &Field,
        prim: &PrimDef,
        offset: u64,
        path: String,
        parent_endian: Option<Endian>,
        symbols: &SymbolTable,
    ) -> ParsedNode {
        let (endian, source) =
            resolve_endian(field.endian, field.type_endian, parent_endian, self.root_endian);
        let endian_info = prim.prim.is_endian_sensitive().then_some((endian, source));

        match prim.prim {
            PrimType::Bytes => self.parse_sized(field, prim, offset, path, endian_info, symbols, false),
            PrimType::Str if !prim.null_terminated => {
                self.parse_sized(field, prim, offset, path, endian_info, symbols, true)
            }
            PrimType::Str => self.parse_cstring(field, prim, offset, path, symbols),
            _ => self.parse_numeric(field, prim, offset, path, endian, endian_info),
        }
    }

    fn parse_numeric(
        &mut self,
        field: &Field,
        prim: &PrimDef,
        offset: u64,
        path: String,
        endian: Endian,
        endian_info: Option<(Endian, EndianSource)>,
    ) -> ParsedNode {
        let width = prim.prim.width().unwrap_or(1) as usize;
        match self.read(offset, width) {
            Err(e) => self.leaf(field, path, offset, 0, None, Some(e), endian_info),
            Ok(data) if data.len() < width => {
                let error = format!(
                    "truncated at EOF: needed {width} bytes at {offset:#x}, got {}",
                    data.len()
                );
                self.leaf(field, path, offset, data.len() as u64, None, Some(error), endian_info)
            }
            Ok(data) => match primitives::decode_numeric(&data, prim.prim, endian) {
                Some(value) => {
                    self.leaf(field, path, offset, width as u64, Some(value), None, endian_info)
                }
                None => self.leaf(
                    field,
                    path,
                    offset,
                    0,
                    None,
                    Some(format!("failed to decode {}", prim.prim.keyword())),
                    endian_info,
                ),
            },
        }
    }

    /// Fixed-window `bytes` and `string` fields.
    fn parse_sized(
        &mut self,
        field: &Field,
        prim: &PrimDef,
        offset: u64,
        path: String,
        endian_info: Option<(Endian, EndianSource)>,
        symbols: &SymbolTable,
        as_string: bool,
    ) -> ParsedNode {
        let length = match prim.length.as_ref() {
            Some(spec) => self.resolve_length(spec, symbols),
            None => Err("length unresolved".to_string()),
        };
        let length = match length {
            Ok(n) => n,
            Err(e) => return self.leaf(field, path, offset, 0, None, Some(e), endian_info),
        };
        if length > self.options.length_cap {
            let error = format!(
                "length {length} exceeds safety cap ({})",
                self.options.length_cap
            );
            return self.leaf(field, path, offset, 0, None, Some(error), endian_info);
        }
        match self.read(offset, length as usize) {
            Err(e) => self.leaf(field, path, offset, 0, None, Some(e), endian_info),
            Ok(data) => {
                // Truncated at EOF: record what was actually read
                let consumed = data.len() as u64;
                let error = (consumed < length).then(|| {
                    format!("truncated at EOF: wanted {length} bytes, got {consumed}")
                });
                let value = if as_string {
                    Value::Str(strings::decode_string(&data, prim.encoding))
                } else {
                    Value::Bytes(data)
                };
                self.leaf(field, path, offset, consumed, Some(value), error, endian_info)
            }
        }
    }

    fn parse_cstring(
        &mut self,
        field: &Field,
        prim: &PrimDef,
        offset: u64,
        path: String,
        _symbols: &SymbolTable,
    ) -> ParsedNode {
        let max_length = match prim.max_length {
            Some(n) => n,
            None => {
                return self.leaf(
                    field,
                    path,
                    offset,
                    0,
                    None,
                    Some("null_terminated string missing max_length".into()),
                    None,
                )
            }
        };
        if max_length > self.options.length_cap {
            let error = format!(
                "length {max_length} exceeds safety cap ({})",
                self.options.length_cap
            );
            return self.leaf(field, path, offset, 0, None, Some(error), None);
        }
        match self.read(offset, max_length as usize) {
            Err(e) => self.leaf(field, path, offset, 0, None, Some(e), None),
            Ok(window) => {
                let scan = strings::scan_cstring(&window, max_length, prim.encoding);
                let error = scan
                    .capped
                    .then(|| "string not terminated within max_length (capped)".to_string());
                self.leaf(
                    field,
                    path,
                    offset,
                    scan.consumed,
                    Some(Value::Str(scan.text)),
                    error,
                    None,
                )
            }
        }
    }

    // ==================== containers ====================

    fn parse_struct(
        &mut self,
        field: &Field,
        fields: &[Field],
        offset: u64,
        path: String,
        parent_endian: Option<Endian>,
    ) -> ParsedNode {
        // The struct's own endianness becomes the children's parent link
        let struct_endian = field.endian.or(field.type_endian).or(parent_endian);
        let mut symbols = SymbolTable::new();
        let mut cursor = offset;
        let mut max_end = offset;
        let mut children = Vec::with_capacity(fields.len());
        let mut extents = Vec::new();

        for child in fields {
            let node = self.parse_field(child, offset, cursor, &path, struct_endian, &mut symbols);
            cursor = node.end();
            max_end = max_end.max(node.end());
            if node.length > 0 {
                extents.push((node.offset, node.end(), node.path.clone()));
            }
            if let Some(value) = &node.value {
                symbols.insert(&child.name, value.clone());
            }
            children.push(node);
        }
        self.check_overlap(&extents);

        ParsedNode {
            path,
            offset,
            length: max_end - offset,
            type_name: field.type_name.clone(),
            value: None,
            children: Some(children),
            error: None,
            endian: None,
            endian_source: None,
            color: field.color.clone(),
        }
    }

    fn parse_array(
        &mut self,
        field: &Field,
        def: &ArrayDef,
        offset: u64,
        path: String,
        parent_endian: Option<Endian>,
        symbols: &mut SymbolTable,
    ) -> ParsedNode {
        let count = match self.resolve_length(&def.length, symbols) {
            Ok(n) => n,
            Err(e) => return self.container_error(field, path, offset, e),
        };
        if count > self.options.length_cap {
            let error = format!(
                "count {count} exceeds safety cap ({})",
                self.options.length_cap
            );
            return self.container_error(field, path, offset, error);
        }
        let array_endian = field.endian.or(field.type_endian).or(parent_endian);

        match def.layout {
            Layout::Aos => self.parse_aos(field, def, offset, path, count, array_endian, symbols),
            Layout::Soa => self.parse_soa(field, def, offset, path, count, array_endian),
        }
    }

    fn parse_aos(
        &mut self,
        field: &Field,
        def: &ArrayDef,
        offset: u64,
        path: String,
        count: u64,
        array_endian: Option<Endian>,
        symbols: &mut SymbolTable,
    ) -> ParsedNode {
        let mut children = Vec::with_capacity(count.min(1024) as usize);
        let mut cursor = offset;
        let mut max_end = offset;

        for i in 0..count {
            let elem_offset = match def.stride {
                Some(stride) => offset + i * stride,
                None => cursor,
            };
            let elem_path = format!("{path}[{i}]");
            let node =
                self.parse_field(&def.element, elem_offset, elem_offset, &elem_path, array_endian, symbols);
            cursor = node.end();
            max_end = max_end.max(node.end());
            children.push(node);
        }

        ParsedNode {
            path,
            offset,
            length: max_end - offset,
            type_name: field.type_name.clone(),
            value: None,
            children: Some(children),
            error: None,
            endian: None,
            endian_source: None,
            color: field.color.clone(),
        }
    }

    /// Column-major layout: for columns of sizes `s1..sk` and count
    /// `N`, element `i` of column `j` sits at
    /// `base + Σ_{m<j}(sm·N) + i·sj`.
    fn parse_soa(
        &mut self,
        field: &Field,
        def: &ArrayDef,
        offset: u64,
        path: String,
        count: u64,
        array_endian: Option<Endian>,
    ) -> ParsedNode {
        let FieldKind::Struct(columns) = &def.element.kind else {
            return self.container_error(field, path, offset, "soa layout requires fields".into());
        };
        let mut sizes = Vec::with_capacity(columns.fields.len());
        for column in &columns.fields {
            match column.static_size() {
                Some(size) => sizes.push(size),
                None => {
                    let error = format!(
                        "soa layout requires fixed-size columns; '{}' is not",
                        column.name
                    );
                    return self.container_error(field, path, offset, error);
                }
            }
        }
        let element_size: u64 = sizes.iter().sum();

        let mut children = Vec::with_capacity(count.min(1024) as usize);
        for i in 0..count {
            let elem_path = format!("{path}[{i}]");
            let mut col_children = Vec::with_capacity(columns.fields.len());
            let mut col_base = offset;
            let mut symbols = SymbolTable::new();
            for (column, &size) in columns.fields.iter().zip(&sizes) {
                let col_offset = col_base + i * size;
                let node = self.parse_field(
                    column,
                    col_offset,
                    col_offset,
                    &elem_path,
                    array_endian,
                    &mut symbols,
                );
                col_children.push(node);
                col_base += size * count;
            }
            let elem_offset = col_children.first().map_or(offset, |c| c.offset);
            children.push(ParsedNode {
                path: elem_path,
                offset: elem_offset,
                length: element_size,
                type_name: "struct".into(),
                value: None,
                children: Some(col_children),
                error: None,
                endian: None,
                endian_source: None,
                color: None,
            });
        }

        ParsedNode {
            path,
            offset,
            length: element_size * count,
            type_name: field.type_name.clone(),
            value: None,
            children: Some(children),
            error: None,
            endian: None,
            endian_source: None,
            color: field.color.clone(),
        }
    }

    // ==================== shared helpers ====================

    fn resolve_length(&self, spec: &LengthSpec, symbols: &SymbolTable) -> Result<u64, String> {
        match spec {
            LengthSpec::Literal(n) => Ok(*n),
            LengthSpec::Ref(name) => match symbols.get(name) {
                None => Err(format!("length ref unresolved: {name}")),
                Some(value) => value
                    .as_count()
                    .ok_or_else(|| format!("length ref '{name}' is not a non-negative integer")),
            },
        }
    }

    fn read(&self, offset: u64, n: usize) -> Result<Vec<u8>, String> {
        self.reader
            .read(offset, n)
            .map_err(|e| format!("read failed at {offset:#x}: {e}"))
    }

    fn leaf(
        &mut self,
        field: &Field,
        path: String,
        offset: u64,
        length: u64,
        value: Option<Value>,
        error: Option<String>,
        endian_info: Option<(Endian, EndianSource)>,
    ) -> ParsedNode {
        if let Some(e) = &error {
            self.errors.push(format!("{path}: {e}"));
        }
        let (endian, endian_source) = match endian_info {
            Some((e, s)) => (Some(e), Some(s)),
            None => (None, None),
        };
        self.leaves.push(ParsedField {
            path: path.clone(),
            offset,
            length,
            type_name: field.type_name.clone(),
            value: value.clone(),
            error: error.clone(),
            endian,
            endian_source,
            color: field.color.clone(),
        });
        ParsedNode {
            path,
            offset,
            length,
            type_name: field.type_name.clone(),
            value,
            children: None,
            error,
            endian,
            endian_source,
            color: field.color.clone(),
        }
    }

    /// A container that could not even start parsing (unresolvable
    /// count, cap violation). Zero length keeps the cursor stable.
    fn container_error(
        &mut self,
        field: &Field,
        path: String,
        offset: u64,
        error: String,
    ) -> ParsedNode {
        self.errors.push(format!("{path}: {error}"));
        ParsedNode {
            path,
            offset,
            length: 0,
            type_name: field.type_name.clone(),
            value: None,
            children: Some(Vec::new()),
            error: Some(error),
            endian: None,
            endian_source: None,
            color: field.color.clone(),
        }
    }

    /// Overlap diagnostics within one struct scope. Explicit offsets
    /// in user grammars routinely collide; the spans are still
    /// produced, the collision is surfaced as a validation error.
    fn check_overlap(&mut self, extents: &[(u64, u64, String)]) {
        if extents.len() < 2 {
            return;
        }
        let mut sorted = extents.to_vec();
        sorted.sort_by_key(|(start, _, _)| *start);
        for pair in sorted.windows(2) {
            let (a_start, a_end, a_path) = &pair[0];
            let (b_start, b_end, b_path) = &pair[1];
            if b_start < a_end {
                self.errors.push(format!(
                    "Overlap: '{b_path}' [{b_start:#x}, {b_end:#x}) overlaps '{a_path}' [{a_start:#x}, {a_end:#x})"
                ));
            }
        }
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if name.is_empty() {
        prefix.to_string()
    } else if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
