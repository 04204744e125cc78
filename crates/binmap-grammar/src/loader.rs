//! Grammar document loader.
//!
//! Pipeline: YAML text → generic value tree → shape detection
//! (`format: record_stream` vs schema) → type-reference resolution
//! with alias chaining and cycle detection → attribute merge
//! (use-site overrides alias defaults) → validation. All diagnostics
//! are collected; a document either loads completely or returns one
//! [`SchemaError`] carrying every failure found.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::debug;

use binmap_core::{Encoding, Endian, PrimType};

use crate::model::{
    ArrayDef, CaseKey, Field, FieldKind, Framing, Grammar, GrammarKind, Layout, LengthSpec,
    PrimDef, RecordRule, RecordStreamDef, StructDef, SwitchRule,
};
use crate::scalar::{describe, is_identifier, parse_bool, parse_int, parse_length_spec, parse_u64};

/// Aggregated validation failures from [`load_grammar`].
///
/// The loader never fails fast; every problem in the document is
/// listed so an author can fix them in one pass.
#[derive(Error, Debug)]
#[error("invalid grammar: {}", .errors.join("; "))]
pub struct SchemaError {
    /// Human-readable diagnostics in discovery order
    pub errors: Vec<String>,
}

impl From<SchemaError> for binmap_core::Error {
    fn from(e: SchemaError) -> Self {
        binmap_core::Error::schema(e.errors)
    }
}

/// Type names an alias definition may not shadow.
static RESERVED_TYPE_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    let mut set: HashSet<&'static str> = [
        "u8", "u16", "u32", "u64", "i8", "i16", "i32", "i64", "f32", "f64", "bytes", "string",
        "struct", "array",
    ]
    .into();
    set.shrink_to_fit();
    set
});

/// Load a grammar document.
///
/// Returns the immutable [`Grammar`] or a [`SchemaError`] bundling
/// every validation failure. No partial grammar is ever produced.
pub fn load_grammar(text: &str) -> Result<Grammar, SchemaError> {
    let doc: Value = serde_yaml::from_str(text).map_err(|e| SchemaError {
        errors: vec![format!("invalid grammar document: {e}")],
    })?;
    let Some(root) = doc.as_mapping() else {
        return Err(SchemaError {
            errors: vec!["grammar document must be a mapping".into()],
        });
    };

    let mut loader = Loader::new(root);
    let root_endian = loader.root_endian(root);

    let is_stream = matches!(
        root.get("format"),
        Some(Value::String(s)) if s == "record_stream"
    );
    let kind = if is_stream {
        loader.load_stream(root).map(GrammarKind::RecordStream)
    } else {
        loader.load_schema(root)
    };

    if !loader.errors.is_empty() {
        return Err(SchemaError {
            errors: loader.errors,
        });
    }
    match kind {
        Some(kind) => {
            debug!(stream = is_stream, "grammar loaded");
            Ok(Grammar { root_endian, kind })
        }
        // Shape errors always leave a diagnostic behind
        None => Err(SchemaError {
            errors: vec!["grammar document is empty".into()],
        }),
    }
}

/// Attribute bag collected from a field or type-definition mapping.
/// `merge` applies alias defaults under use-site values.
#[derive(Debug, Default, Clone)]
struct Attrs<'a> {
    ty: Option<String>,
    fields: Option<&'a [Value]>,
    element: Option<&'a Value>,
    length: Option<LengthSpec>,
    stride: Option<u64>,
    layout: Option<Layout>,
    encoding: Option<Encoding>,
    endian: Option<Endian>,
    null_terminated: Option<bool>,
    max_length: Option<u64>,
    color: Option<String>,
}

impl<'a> Attrs<'a> {
    /// Layer alias defaults under this use site, attribute by
    /// attribute. The alias's own `type` always advances the chain;
    /// its `endian` is tracked separately as type-level.
    fn merge_defaults(&mut self, alias: Attrs<'a>) {
        self.ty = alias.ty;
        if self.fields.is_none() {
            self.fields = alias.fields;
        }
        if self.element.is_none() {
            self.element = alias.element;
        }
        if self.length.is_none() {
            self.length = alias.length;
        }
        if self.stride.is_none() {
            self.stride = alias.stride;
        }
        if self.layout.is_none() {
            self.layout = alias.layout;
        }
        if self.encoding.is_none() {
            self.encoding = alias.encoding;
        }
        if self.null_terminated.is_none() {
            self.null_terminated = alias.null_terminated;
        }
        if self.max_length.is_none() {
            self.max_length = alias.max_length;
        }
        if self.color.is_none() {
            self.color = alias.color;
        }
    }
}

struct Loader<'a> {
    types: BTreeMap<String, &'a Mapping>,
    errors: Vec<String>,
}

impl<'a> Loader<'a> {
    fn new(root: &'a Mapping) -> Self {
        let mut loader = Loader {
            types: BTreeMap::new(),
            errors: Vec::new(),
        };
        loader.collect_types(root);
        loader
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn collect_types(&mut self, root: &'a Mapping) {
        let Some(types_val) = root.get("types") else {
            return;
        };
        let Some(types) = types_val.as_mapping() else {
            self.error("'types' must be a mapping of name to definition");
            return;
        };
        for (key, def) in types {
            let Some(name) = key.as_str() else {
                self.error(format!("type name must be a string, got {}", describe(key)));
                continue;
            };
            if RESERVED_TYPE_NAMES.contains(name) {
                self.error(format!("type name '{name}' shadows a built-in type"));
                continue;
            }
            match def.as_mapping() {
                Some(map) => {
                    self.types.insert(name.to_string(), map);
                }
                None => self.error(format!(
                    "type '{name}' definition must be a mapping, got {}",
                    describe(def)
                )),
            }
        }
    }

    fn root_endian(&mut self, root: &Mapping) -> Option<Endian> {
        self.opt_endian(root, "root")
    }

    fn opt_endian(&mut self, map: &Mapping, ctx: &str) -> Option<Endian> {
        let value = map.get("endian")?;
        match value.as_str().and_then(Endian::from_name) {
            Some(e) => Some(e),
            None => {
                self.error(format!(
                    "invalid endian {} in {ctx}; expected 'little' or 'big'",
                    describe(value)
                ));
                None
            }
        }
    }

    // ==================== schema shape ====================

    fn load_schema(&mut self, root: &'a Mapping) -> Option<GrammarKind> {
        let Some(fields_val) = root.get("fields") else {
            self.error("grammar requires a 'fields' sequence");
            return None;
        };
        let Some(entries) = fields_val.as_sequence() else {
            self.error("'fields' must be a sequence");
            return None;
        };
        let mut chain = Vec::new();
        let fields = self.load_field_list(entries, "fields", &mut chain);
        Some(GrammarKind::Schema { fields })
    }

    fn load_field_list(
        &mut self,
        entries: &'a [Value],
        ctx: &str,
        chain: &mut Vec<String>,
    ) -> Vec<Field> {
        let mut fields = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let ctx = format!("{ctx}[{i}]");
            if let Some(field) = self.load_field(entry, &ctx, chain) {
                fields.push(field);
            }
        }
        fields
    }

    // ==================== record-stream shape ====================

    fn load_stream(&mut self, root: &'a Mapping) -> Option<RecordStreamDef> {
        let framing = self.load_framing(root);
        let record = self.load_record_rule(root);

        // Resolve every registered type into a record template
        let mut templates = BTreeMap::new();
        let names: Vec<String> = self.types.keys().cloned().collect();
        for name in names {
            let mut chain = Vec::new();
            if let Some(template) = self.load_type_template(&name, &mut chain) {
                templates.insert(name, template);
            }
        }

        let record = record?;
        self.check_stream_references(&record, &templates);

        Some(RecordStreamDef {
            framing: framing?,
            record,
            types: templates,
        })
    }

    fn load_framing(&mut self, root: &Mapping) -> Option<Framing> {
        let Some(framing_val) = root.get("framing") else {
            self.error("record_stream requires a 'framing' section");
            return None;
        };
        let Some(framing) = framing_val.as_mapping() else {
            self.error("'framing' must be a mapping");
            return None;
        };
        if let Some(repeat) = framing.get("repeat") {
            return match repeat.as_str() {
                Some("until_eof") => Some(Framing::UntilEof),
                _ => {
                    self.error(format!(
                        "framing repeat must be 'until_eof', got {}",
                        describe(repeat)
                    ));
                    None
                }
            };
        }
        if let Some(count) = framing.get("count") {
            return match parse_u64(count) {
                Some(n) => Some(Framing::Count(n)),
                None => {
                    self.error(format!(
                        "framing count must be a non-negative integer, got {}",
                        describe(count)
                    ));
                    None
                }
            };
        }
        self.error("framing requires 'repeat: until_eof' or 'count: N'");
        None
    }

    fn load_record_rule(&mut self, root: &Mapping) -> Option<RecordRule> {
        let Some(record_val) = root.get("record") else {
            self.error("record_stream requires a 'record' section");
            return None;
        };
        let Some(record) = record_val.as_mapping() else {
            self.error("'record' must be a mapping");
            return None;
        };
        if let Some(use_val) = record.get("use") {
            return match use_val.as_str() {
                Some(name) => Some(RecordRule::Use(name.to_string())),
                None => {
                    self.error(format!("record use must name a type, got {}", describe(use_val)));
                    None
                }
            };
        }
        if let Some(switch_val) = record.get("switch") {
            return self.load_switch(switch_val).map(RecordRule::Switch);
        }
        self.error("record requires 'use: <Type>' or 'switch: {...}'");
        None
    }

    fn load_switch(&mut self, value: &Value) -> Option<SwitchRule> {
        let Some(switch) = value.as_mapping() else {
            self.error("'switch' must be a mapping");
            return None;
        };

        let expr = match switch.get("expr").and_then(Value::as_str) {
            Some(e) => e,
            None => {
                self.error("switch requires 'expr: <HeaderType>.<field>'");
                return None;
            }
        };
        let (header_type, discriminator) = match expr.split_once('.') {
            Some((t, f)) if !t.is_empty() && !f.is_empty() && !f.contains('.') => {
                (t.to_string(), f.to_string())
            }
            _ => {
                self.error(format!(
                    "switch expr '{expr}' must be '<HeaderType>.<field>'"
                ));
                return None;
            }
        };

        let mut cases = Vec::new();
        match switch.get("cases").and_then(Value::as_mapping) {
            Some(case_map) => {
                for (key, target) in case_map {
                    let Some(target) = target.as_str() else {
                        self.error(format!(
                            "switch case {} must name a type, got {}",
                            describe(key),
                            describe(target)
                        ));
                        continue;
                    };
                    // Normalize numeric keys so "0x4E54" and 20052 match
                    let case_key = match parse_int(key) {
                        Some(v) if v >= 0 => CaseKey::Int(v as u64),
                        Some(v) => {
                            self.error(format!("switch case key {v} must be non-negative"));
                            continue;
                        }
                        None => match key.as_str() {
                            Some(s) => CaseKey::Text(s.to_string()),
                            None => {
                                self.error(format!(
                                    "switch case key must be a scalar, got {}",
                                    describe(key)
                                ));
                                continue;
                            }
                        },
                    };
                    cases.push((case_key, target.to_string()));
                }
            }
            None => self.error("switch requires a 'cases' mapping"),
        }

        let default = match switch.get("default") {
            Some(d) => match d.as_str() {
                Some(name) => Some(name.to_string()),
                None => {
                    self.error(format!(
                        "switch default must name a type, got {}",
                        describe(d)
                    ));
                    None
                }
            },
            None => None,
        };

        Some(SwitchRule {
            header_type,
            discriminator,
            cases,
            default,
        })
    }

    fn check_stream_references(
        &mut self,
        record: &RecordRule,
        templates: &BTreeMap<String, Field>,
    ) {
        let mut check = |name: &str, errors: &mut Vec<String>| {
            if !templates.contains_key(name) {
                errors.push(format!("unknown type reference: {name}"));
            }
        };
        match record {
            RecordRule::Use(name) => check(name, &mut self.errors),
            RecordRule::Switch(switch) => {
                check(&switch.header_type, &mut self.errors);
                for (_, target) in &switch.cases {
                    check(target, &mut self.errors);
                }
                if let Some(default) = &switch.default {
                    check(default, &mut self.errors);
                }
                // The discriminator must be a direct field of the header
                if let Some(header) = templates.get(&switch.header_type) {
                    let found = match &header.kind {
                        FieldKind::Struct(s) => {
                            s.fields.iter().any(|f| f.name == switch.discriminator)
                        }
                        _ => false,
                    };
                    if !found {
                        self.errors.push(format!(
                            "switch discriminator '{}' not found in type {}",
                            switch.discriminator, switch.header_type
                        ));
                    }
                }
            }
        }
    }

    /// Resolve a registered type into an anonymous record template.
    fn load_type_template(&mut self, name: &str, chain: &mut Vec<String>) -> Option<Field> {
        let attrs = Attrs {
            ty: Some(name.to_string()),
            ..Attrs::default()
        };
        let ctx = format!("types.{name}");
        self.build_field(String::new(), None, attrs, &ctx, chain)
            .map(|mut field| {
                field.type_name = name.to_string();
                field
            })
    }

    // ==================== field resolution ====================

    fn load_field(&mut self, entry: &'a Value, ctx: &str, chain: &mut Vec<String>) -> Option<Field> {
        let Some(map) = entry.as_mapping() else {
            self.error(format!("field in {ctx} must be a mapping, got {}", describe(entry)));
            return None;
        };
        let name = match map.get("name").and_then(Value::as_str) {
            Some(n) => n.to_string(),
            None => {
                self.error(format!("field in {ctx} is missing a name"));
                return None;
            }
        };
        let offset = self.load_offset(map, &name);
        let attrs = self.collect_attrs(map, ctx);
        self.build_field(name, offset, attrs, ctx, chain)
    }

    /// Load an array `element:` definition: same shape as a field but
    /// the name is optional (element paths are synthesized).
    fn load_element(&mut self, entry: &'a Value, ctx: &str, chain: &mut Vec<String>) -> Option<Field> {
        let Some(map) = entry.as_mapping() else {
            self.error(format!(
                "element in {ctx} must be a mapping, got {}",
                describe(entry)
            ));
            return None;
        };
        let name = map
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let attrs = self.collect_attrs(map, ctx);
        self.build_field(name, None, attrs, ctx, chain)
    }

    fn load_offset(&mut self, map: &Mapping, field: &str) -> Option<u64> {
        let value = map.get("offset")?;
        match parse_int(value) {
            Some(v) if v >= 0 => Some(v as u64),
            Some(v) => {
                self.error(format!("field '{field}' offset {v} must be non-negative"));
                None
            }
            None => {
                self.error(format!(
                    "field '{field}' offset must be an integer, got {}",
                    describe(value)
                ));
                None
            }
        }
    }

    fn collect_attrs(&mut self, map: &'a Mapping, ctx: &str) -> Attrs<'a> {
        let mut attrs = Attrs::default();

        if let Some(ty) = map.get("type") {
            match ty.as_str() {
                Some(s) => attrs.ty = Some(s.to_string()),
                None => self.error(format!("{ctx}: 'type' must be a string, got {}", describe(ty))),
            }
        }
        if let Some(fields) = map.get("fields") {
            match fields.as_sequence() {
                Some(seq) => attrs.fields = Some(seq),
                None => self.error(format!("{ctx}: 'fields' must be a sequence")),
            }
        }
        attrs.element = map.get("element");

        // length literal wins over length_from when both are present
        if let Some(length) = map.get("length") {
            match parse_length_spec(length) {
                Ok(spec) => attrs.length = Some(spec),
                Err(e) => self.error(format!("{ctx}: {e}")),
            }
        }
        if attrs.length.is_none() {
            if let Some(from) = map.get("length_from") {
                match from.as_str() {
                    Some(name) if is_identifier(name) => {
                        attrs.length = Some(LengthSpec::Ref(name.to_string()));
                    }
                    _ => self.error(format!(
                        "{ctx}: 'length_from' must name a sibling field, got {}",
                        describe(from)
                    )),
                }
            }
        }

        if let Some(stride) = map.get("stride") {
            match parse_u64(stride) {
                Some(n) => attrs.stride = Some(n),
                None => self.error(format!(
                    "{ctx}: 'stride' must be a non-negative integer, got {}",
                    describe(stride)
                )),
            }
        }
        if let Some(layout) = map.get("layout") {
            match layout.as_str().and_then(Layout::from_name) {
                Some(l) => attrs.layout = Some(l),
                None => self.error(format!(
                    "{ctx}: 'layout' must be 'aos' or 'soa', got {}",
                    describe(layout)
                )),
            }
        }
        if let Some(encoding) = map.get("encoding") {
            match encoding.as_str().and_then(Encoding::from_name) {
                Some(e) => attrs.encoding = Some(e),
                None => self.error(format!(
                    "{ctx}: unsupported encoding {}",
                    describe(encoding)
                )),
            }
        }
        attrs.endian = self.opt_endian(map, ctx);
        if let Some(nt) = map.get("null_terminated") {
            match parse_bool(nt) {
                Some(b) => attrs.null_terminated = Some(b),
                None => self.error(format!(
                    "{ctx}: 'null_terminated' must be a boolean, got {}",
                    describe(nt)
                )),
            }
        }
        if let Some(max_len) = map.get("max_length") {
            match parse_u64(max_len) {
                Some(n) => attrs.max_length = Some(n),
                None => self.error(format!(
                    "{ctx}: 'max_length' must be a non-negative integer, got {}",
                    describe(max_len)
                )),
            }
        }
        if let Some(color) = map.get("color") {
            match color.as_str() {
                Some(c) if !c.trim().is_empty() => {
                    attrs.color = Some(c.trim().to_ascii_lowercase());
                }
                _ => self.error(format!("{ctx}: 'color' must be a non-empty string")),
            }
        }

        attrs
    }

    /// Resolve a field's type reference to a concrete kind, following
    /// alias chains and merging defaults along the way.
    fn build_field(
        &mut self,
        name: String,
        offset: Option<u64>,
        mut attrs: Attrs<'a>,
        ctx: &str,
        chain: &mut Vec<String>,
    ) -> Option<Field> {
        let display_name = match &attrs.ty {
            Some(t) => t.clone(),
            None => {
                // A bare `fields:` block is an inline struct
                if attrs.fields.is_some() {
                    "struct".to_string()
                } else {
                    self.error(format!("field '{name}' ({ctx}) is missing a type"));
                    return None;
                }
            }
        };

        let field_endian = attrs.endian;
        let mut type_endian: Option<Endian> = None;
        let mut current = display_name.clone();
        let pushed_base = chain.len();

        let kind = loop {
            if let Some(prim) = PrimType::from_keyword(&current) {
                break self.build_primitive(&name, prim, &attrs, ctx);
            }
            if current == "struct" {
                break self.build_struct(&name, &attrs, ctx, chain);
            }
            if current == "array" {
                break self.build_array(&name, &attrs, ctx, chain);
            }
            if let Some(element_ty) = array_of_target(&current) {
                break self.build_array_shorthand(&name, element_ty, &attrs, ctx, chain);
            }

            // Alias chain step
            let Some(def_map) = self.types.get(&current).copied() else {
                self.error(format!("unknown type reference: {current} ({ctx})"));
                chain.truncate(pushed_base);
                return None;
            };
            if chain.contains(&current) {
                let mut path = chain.clone();
                path.push(current.clone());
                self.error(format!("type cycle detected: {}", path.join(" -> ")));
                chain.truncate(pushed_base);
                return None;
            }
            chain.push(current.clone());

            let alias_attrs = self.collect_attrs(def_map, &format!("types.{current}"));
            if type_endian.is_none() {
                type_endian = alias_attrs.endian;
            }
            let next = alias_attrs
                .ty
                .clone()
                .or_else(|| alias_attrs.fields.map(|_| "struct".to_string()));
            attrs.merge_defaults(alias_attrs);
            match next {
                Some(next_ty) => current = next_ty,
                None => {
                    self.error(format!(
                        "type '{current}' defines neither 'type' nor 'fields'"
                    ));
                    chain.truncate(pushed_base);
                    return None;
                }
            }
        };
        chain.truncate(pushed_base);

        kind.map(|kind| Field {
            name,
            offset,
            endian: field_endian,
            type_endian,
            color: attrs.color.clone(),
            type_name: display_name,
            kind,
        })
    }

    fn build_primitive(
        &mut self,
        name: &str,
        prim: PrimType,
        attrs: &Attrs<'a>,
        _ctx: &str,
    ) -> Option<FieldKind> {
        let null_terminated = attrs.null_terminated.unwrap_or(false);
        match prim {
            PrimType::Str => {
                if null_terminated {
                    if attrs.max_length.is_none() {
                        self.error(format!(
                            "null_terminated string '{name}' requires max_length"
                        ));
                        return None;
                    }
                } else if attrs.length.is_none() {
                    self.error(format!(
                        "string field '{name}' requires length (or null_terminated with max_length)"
                    ));
                    return None;
                }
            }
            PrimType::Bytes => {
                if attrs.length.is_none() {
                    self.error(format!("bytes field '{name}' requires length"));
                    return None;
                }
            }
            _ => {}
        }
        Some(FieldKind::Primitive(PrimDef {
            prim,
            length: attrs.length.clone(),
            encoding: attrs.encoding.unwrap_or_default(),
            null_terminated,
            max_length: attrs.max_length,
        }))
    }

    fn build_struct(
        &mut self,
        name: &str,
        attrs: &Attrs<'a>,
        ctx: &str,
        chain: &mut Vec<String>,
    ) -> Option<FieldKind> {
        let Some(entries) = attrs.fields else {
            self.error(format!("struct field '{name}' requires fields"));
            return None;
        };
        let fields = self.load_field_list(entries, ctx, chain);
        Some(FieldKind::Struct(StructDef { fields }))
    }

    fn build_array(
        &mut self,
        name: &str,
        attrs: &Attrs<'a>,
        ctx: &str,
        chain: &mut Vec<String>,
    ) -> Option<FieldKind> {
        let layout = attrs.layout.unwrap_or(Layout::Aos);
        let Some(length) = attrs.length.clone() else {
            self.error(format!("array field '{name}' requires length"));
            return None;
        };

        let element = match layout {
            Layout::Soa => {
                let Some(entries) = attrs.fields else {
                    self.error(format!("soa layout on '{name}' requires fields (columns)"));
                    return None;
                };
                let columns = self.load_field_list(entries, ctx, chain);
                for column in &columns {
                    if column.static_size().is_none() {
                        self.error(format!(
                            "soa layout requires fixed-size columns; '{}' in '{name}' is not",
                            column.name
                        ));
                    }
                }
                Field {
                    name: String::new(),
                    offset: None,
                    endian: None,
                    type_endian: None,
                    color: None,
                    type_name: "struct".into(),
                    kind: FieldKind::Struct(StructDef { fields: columns }),
                }
            }
            Layout::Aos => match (attrs.element, attrs.fields) {
                (Some(element), _) => {
                    self.load_element(element, &format!("{ctx}.element"), chain)?
                }
                // An inline `fields:` block makes each element a struct
                (None, Some(entries)) => {
                    let fields = self.load_field_list(entries, ctx, chain);
                    Field {
                        name: String::new(),
                        offset: None,
                        endian: None,
                        type_endian: None,
                        color: None,
                        type_name: "struct".into(),
                        kind: FieldKind::Struct(StructDef { fields }),
                    }
                }
                (None, None) => {
                    self.error(format!("array field '{name}' requires element"));
                    return None;
                }
            },
        };

        Some(FieldKind::Array(ArrayDef {
            length,
            stride: attrs.stride,
            layout,
            element: Box::new(element),
        }))
    }

    fn build_array_shorthand(
        &mut self,
        name: &str,
        element_ty: &str,
        attrs: &Attrs<'a>,
        ctx: &str,
        chain: &mut Vec<String>,
    ) -> Option<FieldKind> {
        if attrs.element.is_some() {
            self.error(format!(
                "array-of shorthand cannot also specify 'element' ('{name}')"
            ));
            return None;
        }
        let Some(length) = attrs.length.clone() else {
            self.error(format!("array-of shorthand on '{name}' requires length"));
            return None;
        };
        let element_attrs = Attrs {
            ty: Some(element_ty.to_string()),
            ..Attrs::default()
        };
        let element =
            self.build_field(String::new(), None, element_attrs, &format!("{ctx}.element"), chain)?;
        Some(FieldKind::Array(ArrayDef {
            length,
            stride: attrs.stride,
            layout: attrs.layout.unwrap_or(Layout::Aos),
            element: Box::new(element),
        }))
    }
}

/// Match the `array of T` shorthand. `T` must be a single type name;
/// anything else falls through to a (failing) registry lookup.
fn array_of_target(type_name: &str) -> Option<&str> {
    let rest = type_name.strip_prefix("array of ")?.trim();
    (is_identifier(rest)).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_err(text: &str) -> Vec<String> {
        match load_grammar(text) {
            Err(e) => e.errors,
            Ok(_) => panic!("expected schema error"),
        }
    }

    #[test]
    fn test_alias_fixed_length_string_expands() {
        let grammar = load_grammar(
            "types:\n  leader_name: { type: string, length: 14, encoding: ascii }\nfields:\n  - { name: leader, type: leader_name }\n",
        )
        .unwrap();
        let fields = grammar.schema_fields();
        let FieldKind::Primitive(prim) = &fields[0].kind else {
            panic!("expected primitive");
        };
        assert_eq!(prim.prim, PrimType::Str);
        assert_eq!(prim.length, Some(LengthSpec::Literal(14)));
        assert_eq!(prim.encoding, Encoding::Ascii);
        assert_eq!(fields[0].type_name, "leader_name");
    }

    #[test]
    fn test_call_site_override() {
        let grammar = load_grammar(
            "types:\n  leader_name: { type: string, length: 14, encoding: ascii }\nfields:\n  - name: leader\n    type: leader_name\n    encoding: utf-8\n",
        )
        .unwrap();
        let FieldKind::Primitive(prim) = &grammar.schema_fields()[0].kind else {
            panic!("expected primitive");
        };
        assert_eq!(prim.encoding, Encoding::Utf8);
        assert_eq!(prim.length, Some(LengthSpec::Literal(14)));
    }

    #[test]
    fn test_alias_chaining() {
        let grammar = load_grammar(
            "types:\n  money_base: { type: i16 }\n  money: { type: money_base }\nfields:\n  - { name: balances, type: array of money, length: 2 }\n",
        )
        .unwrap();
        let FieldKind::Array(arr) = &grammar.schema_fields()[0].kind else {
            panic!("expected array");
        };
        let FieldKind::Primitive(prim) = &arr.element.kind else {
            panic!("expected primitive element");
        };
        assert_eq!(prim.prim, PrimType::I16);
    }

    #[test]
    fn test_cycle_detection() {
        let errors = load_err(
            "types:\n  A: { type: B }\n  B: { type: A }\nfields:\n  - { name: x, type: A }\n",
        );
        assert!(errors.iter().any(|e| e.contains("type cycle detected")));
    }

    #[test]
    fn test_struct_cycle_detection() {
        let errors = load_err(
            "types:\n  A:\n    type: struct\n    fields:\n      - { name: b, type: B }\n  B:\n    type: struct\n    fields:\n      - { name: a, type: A }\nfields:\n  - { name: x, type: A }\n",
        );
        assert!(errors.iter().any(|e| e.contains("type cycle detected")));
    }

    #[test]
    fn test_unknown_type_reference() {
        let errors = load_err("fields:\n  - { name: x, type: UnknownAlias }\n");
        assert!(errors.iter().any(|e| e.contains("unknown type reference")));
    }

    #[test]
    fn test_bounded_string_rule_on_alias() {
        let errors = load_err(
            "types:\n  name_nt: { type: string, null_terminated: true }\nfields:\n  - { name: x, type: name_nt }\n",
        );
        assert!(errors.iter().any(|e| e.contains("max_length")));
    }

    #[test]
    fn test_shorthand_missing_length_errors() {
        let errors = load_err(
            "types:\n  Item:\n    type: struct\n    fields:\n      - { name: v, type: u8 }\nfields:\n  - name: inventory\n    type: array of Item\n    stride: 1\n",
        );
        assert!(errors.iter().any(|e| e.contains("requires length")));
    }

    #[test]
    fn test_shorthand_with_element_conflict_errors() {
        let errors = load_err(
            "types:\n  Item:\n    type: struct\n    fields:\n      - { name: v, type: u8 }\nfields:\n  - name: inventory\n    type: array of Item\n    length: 1\n    element:\n      type: Item\n",
        );
        assert!(errors
            .iter()
            .any(|e| e.contains("array-of shorthand cannot also specify 'element'")));
    }

    #[test]
    fn test_malformed_array_of_patterns_fail() {
        for bad in ["arrayof Item", "array Item", "array of Item stride 2"] {
            let text = format!(
                "fields:\n  - name: inv\n    type: {bad}\n    length: 1\n    stride: 1\n"
            );
            assert!(load_grammar(&text).is_err(), "{bad} should not load");
        }
    }

    #[test]
    fn test_error_aggregation_collects_all() {
        let errors = load_err(
            "fields:\n  - { name: a, type: Missing1 }\n  - { name: b, type: Missing2 }\n",
        );
        assert_eq!(
            errors
                .iter()
                .filter(|e| e.contains("unknown type reference"))
                .count(),
            2
        );
    }

    #[test]
    fn test_reserved_type_name_rejected() {
        let errors = load_err(
            "types:\n  u8: { type: u16 }\nfields:\n  - { name: x, type: u8 }\n",
        );
        assert!(errors.iter().any(|e| e.contains("shadows a built-in")));
    }

    #[test]
    fn test_record_stream_shape() {
        let grammar = load_grammar(
            "format: record_stream\nframing:\n  repeat: until_eof\nrecord:\n  switch:\n    expr: Header.type_raw\n    cases:\n      \"0x4E54\": NTRecord\n    default: GenericRecord\ntypes:\n  Header:\n    fields:\n      - { name: type_raw, type: u16 }\n      - { name: entity_id, type: u16 }\n  GenericRecord:\n    fields:\n      - { name: header, type: Header }\n      - { name: payload_len, type: u8 }\n      - { name: payload, type: bytes, length_from: payload_len }\n  NTRecord:\n    fields:\n      - { name: header, type: Header }\n      - { name: data, type: bytes, length: 10 }\n",
        )
        .unwrap();
        let GrammarKind::RecordStream(stream) = &grammar.kind else {
            panic!("expected record stream");
        };
        assert_eq!(stream.framing, Framing::UntilEof);
        let RecordRule::Switch(switch) = &stream.record else {
            panic!("expected switch");
        };
        assert_eq!(switch.header_type, "Header");
        assert_eq!(switch.discriminator, "type_raw");
        assert_eq!(switch.cases, vec![(CaseKey::Int(0x4E54), "NTRecord".into())]);
        assert_eq!(switch.default.as_deref(), Some("GenericRecord"));
        assert!(stream.types.contains_key("Header"));
        assert!(stream.types.contains_key("NTRecord"));
    }

    #[test]
    fn test_record_stream_unknown_case_target() {
        let errors = load_err(
            "format: record_stream\nframing:\n  repeat: until_eof\nrecord:\n  switch:\n    expr: Header.kind\n    cases:\n      1: Missing\n    default: Header\ntypes:\n  Header:\n    fields:\n      - { name: kind, type: u8 }\n",
        );
        assert!(errors.iter().any(|e| e.contains("unknown type reference: Missing")));
    }

    #[test]
    fn test_record_stream_bad_discriminator() {
        let errors = load_err(
            "format: record_stream\nframing:\n  repeat: until_eof\nrecord:\n  switch:\n    expr: Header.nope\n    cases:\n      1: Header\n    default: Header\ntypes:\n  Header:\n    fields:\n      - { name: kind, type: u8 }\n",
        );
        assert!(errors.iter().any(|e| e.contains("discriminator 'nope'")));
    }

    #[test]
    fn test_framing_count() {
        let grammar = load_grammar(
            "format: record_stream\nframing:\n  count: 5\nrecord:\n  use: Rec\ntypes:\n  Rec:\n    fields:\n      - { name: v, type: u8 }\n",
        )
        .unwrap();
        let GrammarKind::RecordStream(stream) = &grammar.kind else {
            panic!("expected record stream");
        };
        assert_eq!(stream.framing, Framing::Count(5));
    }

    #[test]
    fn test_soa_variable_columns_rejected() {
        let errors = load_err(
            "fields:\n  - name: civs\n    type: array\n    length: 3\n    layout: soa\n    fields:\n      - { name: label, type: string, null_terminated: true, max_length: 8 }\n      - { name: cash, type: i16 }\n",
        );
        assert!(errors.iter().any(|e| e.contains("fixed-size columns")));
    }

    #[test]
    fn test_type_endian_carried_from_alias() {
        let grammar = load_grammar(
            "types:\n  be_word: { type: u16, endian: big }\nfields:\n  - { name: x, type: be_word }\n",
        )
        .unwrap();
        let field = &grammar.schema_fields()[0];
        assert_eq!(field.endian, None);
        assert_eq!(field.type_endian, Some(Endian::Big));
    }

    #[test]
    fn test_root_endian() {
        let grammar = load_grammar("endian: big\nfields:\n  - { name: x, type: u16 }\n").unwrap();
        assert_eq!(grammar.root_endian, Some(Endian::Big));
        let errors = load_err("endian: middle\nfields:\n  - { name: x, type: u16 }\n");
        assert!(errors.iter().any(|e| e.contains("invalid endian")));
    }

    #[test]
    fn test_hex_offset_and_lengths() {
        let grammar = load_grammar(
            "fields:\n  - { name: count, offset: 0x30, type: u8 }\n  - { name: blob, offset: \"0x40\", type: bytes, length: \"0x10\" }\n",
        )
        .unwrap();
        let fields = grammar.schema_fields();
        assert_eq!(fields[0].offset, Some(0x30));
        assert_eq!(fields[1].offset, Some(0x40));
        let FieldKind::Primitive(prim) = &fields[1].kind else {
            panic!("expected primitive");
        };
        assert_eq!(prim.length, Some(LengthSpec::Literal(16)));
    }
}
