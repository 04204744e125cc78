//! End-to-end schema parsing against on-disk fixtures.

use std::collections::HashMap;
use std::io::Write;

use binmap_core::{PagedReader, Value};
use binmap_grammar::load_grammar;
use binmap_parse::{parse_schema, parse_schema_with, ParseOptions, ParsedField};

fn reader_for(data: &[u8]) -> (tempfile::NamedTempFile, PagedReader) {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(data).unwrap();
    f.flush().unwrap();
    let r = PagedReader::open(f.path()).unwrap();
    (f, r)
}

fn by_path(leaves: &[ParsedField]) -> HashMap<String, ParsedField> {
    leaves.iter().map(|l| (l.path.clone(), l.clone())).collect()
}

fn sample_file() -> Vec<u8> {
    let mut data = vec![0u8; 256];
    data[..4].copy_from_slice(b"MAGC");
    data[4..6].copy_from_slice(&5u16.to_le_bytes());
    // player struct at 0x20: hp=1000, mp=50
    data[0x20..0x22].copy_from_slice(&1000u16.to_le_bytes());
    data[0x22..0x24].copy_from_slice(&50u16.to_le_bytes());
    data[0x30] = 3; // count
    // items at 0x40: (id, qty) pairs
    for (i, (id, qty)) in [(1u8, 9u8), (2, 8), (3, 7)].iter().enumerate() {
        data[0x40 + i * 2] = *id;
        data[0x40 + i * 2 + 1] = *qty;
    }
    // utf-16le "ABC" at 0x10
    let abc: Vec<u8> = "ABC".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
    data[0x10..0x10 + abc.len()].copy_from_slice(&abc);
    // null-terminated ascii at 0x50
    data[0x50..0x58].copy_from_slice(b"HELLO\x00\xFF\xFF");
    data
}

#[test]
fn struct_array_and_length_from() {
    let grammar = load_grammar(
        "endian: little\nfields:\n  - { name: magic, type: bytes, length: 4 }\n  - { name: version, type: u16 }\n  - name: player\n    offset: 0x20\n    type: struct\n    fields:\n      - { name: hp, type: u16 }\n      - { name: mp, type: u16 }\n  - { name: count, offset: 0x30, type: u8 }\n  - name: items\n    offset: 0x40\n    type: array\n    length_from: count\n    element:\n      type: struct\n      fields:\n        - { name: id, type: u8 }\n        - { name: qty, type: u8 }\n",
    )
    .unwrap();
    let (_f, reader) = reader_for(&sample_file());
    let outcome = parse_schema(&reader, &grammar);
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);

    let by = by_path(&outcome.leaves);
    assert_eq!(by["magic"].value, Some(Value::Bytes(b"MAGC".to_vec())));
    assert_eq!(by["version"].value, Some(Value::UInt(5)));
    assert_eq!(by["player.hp"].value, Some(Value::UInt(1000)));
    assert_eq!(by["player.mp"].value, Some(Value::UInt(50)));
    assert_eq!(by["items[0].id"].value, Some(Value::UInt(1)));
    assert_eq!(by["items[1].qty"].value, Some(Value::UInt(8)));
    assert_eq!(by["items[2].qty"].value, Some(Value::UInt(7)));
    // Elements parsed consecutively after the array base
    assert_eq!(by["items[2].qty"].offset, 0x40 + 5);
}

#[test]
fn utf16_and_null_terminated_strings() {
    let grammar = load_grammar(
        "endian: little\nfields:\n  - { name: title, offset: 0x10, type: string, encoding: utf-16le, length: 6 }\n  - name: name_nt\n    offset: 0x50\n    type: string\n    encoding: ascii\n    null_terminated: true\n    max_length: 8\n",
    )
    .unwrap();
    let (_f, reader) = reader_for(&sample_file());
    let outcome = parse_schema(&reader, &grammar);
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);

    let by = by_path(&outcome.leaves);
    assert_eq!(by["title"].value, Some(Value::Str("ABC".into())));
    assert_eq!(by["name_nt"].value, Some(Value::Str("HELLO".into())));
    // Terminator included in consumed length
    assert_eq!(by["name_nt"].length, 6);
    assert!(by["name_nt"].error.is_none());
}

#[test]
fn overlap_detection_in_struct_scope() {
    let grammar = load_grammar(
        "endian: little\nfields:\n  - name: s\n    offset: 0x10\n    type: struct\n    fields:\n      - { name: a, offset: 0, type: u32 }\n      - { name: b, offset: 2, type: u16 }\n",
    )
    .unwrap();
    let (_f, reader) = reader_for(&sample_file());
    let outcome = parse_schema(&reader, &grammar);
    assert!(outcome.errors.iter().any(|e| e.contains("Overlap")));
    // Spans are still produced despite the diagnostic
    let by = by_path(&outcome.leaves);
    assert_eq!(by["s.a"].offset, 0x10);
    assert_eq!(by["s.b"].offset, 0x12);
}

#[test]
fn top_level_type_expansion() {
    let grammar = load_grammar(
        "types:\n  Header:\n    type: struct\n    fields:\n      - { name: magic, type: bytes, length: 4 }\n      - { name: version, type: u16 }\nfields:\n  - { name: header, type: Header }\n",
    )
    .unwrap();
    let mut data = b"MAGC".to_vec();
    data.extend(5u16.to_le_bytes());
    let (_f, reader) = reader_for(&data);
    let outcome = parse_schema(&reader, &grammar);
    assert!(outcome.errors.is_empty());
    let by = by_path(&outcome.leaves);
    assert_eq!(by["header.magic"].value, Some(Value::Bytes(b"MAGC".to_vec())));
    assert_eq!(by["header.version"].value, Some(Value::UInt(5)));
}

#[test]
fn array_shorthand_and_stride() {
    let grammar = load_grammar(
        "types:\n  Item:\n    type: struct\n    fields:\n      - { name: id, type: u8 }\n      - { name: qty, type: u8 }\nfields:\n  - name: inventory\n    type: array of Item\n    length: 2\n    stride: 2\n",
    )
    .unwrap();
    let (_f, reader) = reader_for(&[1, 9, 2, 8]);
    let outcome = parse_schema(&reader, &grammar);
    assert!(outcome.errors.is_empty());
    let by = by_path(&outcome.leaves);
    assert_eq!(by["inventory[0].id"].value, Some(Value::UInt(1)));
    assert_eq!(by["inventory[1].qty"].value, Some(Value::UInt(8)));
}

#[test]
fn length_reference_forms() {
    // literal number, numeric string, hex string, bare ref, mapping ref
    for (length, expected) in [
        ("3", 3usize),
        ("\"10\"", 10),
        ("\"0x0A\"", 10),
        ("num_rows", 3),
        ("{ ref: num_rows }", 3),
    ] {
        let text = format!(
            "fields:\n  - {{ name: num_rows, type: u8 }}\n  - name: items\n    type: array\n    length: {length}\n    element:\n      type: u8\n"
        );
        let grammar = load_grammar(&text).unwrap();
        let mut data = vec![3u8];
        data.extend(std::iter::repeat(0xAB).take(12));
        let (_f, reader) = reader_for(&data);
        let outcome = parse_schema(&reader, &grammar);
        assert!(outcome.errors.is_empty(), "length={length}: {:?}", outcome.errors);
        let elements = outcome
            .leaves
            .iter()
            .filter(|l| l.path.starts_with("items["))
            .count();
        assert_eq!(elements, expected, "length={length}");
    }
}

#[test]
fn unresolved_length_ref_is_reported() {
    let grammar = load_grammar(
        "fields:\n  - name: items\n    type: array\n    length: rows_count\n    element:\n      type: u8\n",
    )
    .unwrap();
    let (_f, reader) = reader_for(&[1, 2, 3]);
    let outcome = parse_schema(&reader, &grammar);
    assert!(outcome
        .errors
        .iter()
        .any(|e| e.contains("length ref unresolved")));
}

#[test]
fn non_integer_length_ref_is_reported() {
    let grammar = load_grammar(
        "fields:\n  - { name: other, type: string, length: 3, encoding: ascii }\n  - name: items\n    type: array\n    length: other\n    element:\n      type: u8\n",
    )
    .unwrap();
    let (_f, reader) = reader_for(b"ABC\x01\x02\x03");
    let outcome = parse_schema(&reader, &grammar);
    assert!(outcome.errors.iter().any(|e| e.contains("length ref")));
}

#[test]
fn later_sibling_reference_is_unresolved() {
    // References are visible only after the referent parsed
    let grammar = load_grammar(
        "fields:\n  - { name: blob, type: bytes, length_from: blob_len }\n  - { name: blob_len, type: u8 }\n",
    )
    .unwrap();
    let (_f, reader) = reader_for(&[4, 1, 2, 3, 4]);
    let outcome = parse_schema(&reader, &grammar);
    assert!(outcome
        .errors
        .iter()
        .any(|e| e.contains("length ref unresolved")));
}

#[test]
fn safety_cap_is_enforced() {
    let grammar = load_grammar(
        "fields:\n  - name: name\n    type: string\n    length: \"1000001\"\n    encoding: ascii\n",
    )
    .unwrap();
    let (_f, reader) = reader_for(b"AA");
    let outcome = parse_schema(&reader, &grammar);
    assert!(outcome
        .leaves
        .iter()
        .any(|l| matches!(&l.error, Some(e) if e.contains("exceeds safety cap"))));
}

#[test]
fn safety_cap_is_configurable() {
    let grammar = load_grammar(
        "fields:\n  - { name: blob, type: bytes, length: 100 }\n",
    )
    .unwrap();
    let (_f, reader) = reader_for(&[0u8; 128]);
    let options = ParseOptions {
        length_cap: 64,
        ..ParseOptions::default()
    };
    let outcome = parse_schema_with(&reader, &grammar, &options, None);
    assert!(outcome.errors.iter().any(|e| e.contains("exceeds safety cap")));
}

#[test]
fn tlv_length_from_inside_typedef() {
    let grammar = load_grammar(
        "types:\n  tlv_record:\n    type: struct\n    fields:\n      - { name: field_size, type: u16 }\n      - { name: field_payload, type: bytes, length_from: field_size }\nfields:\n  - { name: my_record, type: tlv_record }\n",
    )
    .unwrap();
    let (_f, reader) = reader_for(b"\x05\x00HELLO");
    let outcome = parse_schema(&reader, &grammar);
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    let by = by_path(&outcome.leaves);
    assert_eq!(
        by["my_record.field_payload"].value,
        Some(Value::Bytes(b"HELLO".to_vec()))
    );
}

#[test]
fn soa_layout_columns() {
    let grammar = load_grammar(
        "types:\n  leader_name: { type: string, length: 2, encoding: ascii }\nfields:\n  - name: civs\n    type: array\n    length: 3\n    layout: soa\n    fields:\n      - { name: leader, type: leader_name }\n      - { name: cash, type: i16 }\n",
    )
    .unwrap();
    // Column layout: leader×3 then cash×3
    let mut data = b"AABBCC".to_vec();
    for v in [1i16, 2, 3] {
        data.extend(v.to_le_bytes());
    }
    let (_f, reader) = reader_for(&data);
    let outcome = parse_schema(&reader, &grammar);
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);

    let civs = outcome.tree.iter().find(|n| n.path == "civs").unwrap();
    let children = civs.children.as_ref().unwrap();
    assert_eq!(children.len(), 3);
    let rec0 = &children[0];
    let rec0_children = rec0.children.as_ref().unwrap();
    let paths: Vec<&str> = rec0_children.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, vec!["civs[0].leader", "civs[0].cash"]);
    assert_eq!(rec0_children[0].value, Some(Value::Str("AA".into())));
    assert_eq!(rec0_children[1].value, Some(Value::Int(1)));

    let by = by_path(&outcome.leaves);
    // leader column at 0, 2, 4; cash column starts at 6
    assert_eq!(by["civs[0].leader"].offset, 0);
    assert_eq!(by["civs[1].leader"].offset, 2);
    assert_eq!(by["civs[0].cash"].offset, 6);
    assert_eq!(by["civs[2].cash"].offset, 10);
}

#[test]
fn endian_resolution_hierarchy() {
    // root big; type-level little on one alias; field override back to big
    let grammar = load_grammar(
        "endian: big\ntypes:\n  le_word: { type: u16, endian: little }\nfields:\n  - { name: from_root, type: u16 }\n  - { name: from_type, type: le_word }\n  - { name: from_field, type: le_word, endian: big }\n",
    )
    .unwrap();
    let data = [0x12u8, 0x34, 0x12, 0x34, 0x12, 0x34];
    let (_f, reader) = reader_for(&data);
    let outcome = parse_schema(&reader, &grammar);
    assert!(outcome.errors.is_empty());
    let by = by_path(&outcome.leaves);
    assert_eq!(by["from_root"].value, Some(Value::UInt(0x1234)));
    assert_eq!(by["from_type"].value, Some(Value::UInt(0x3412)));
    assert_eq!(by["from_field"].value, Some(Value::UInt(0x1234)));
    assert_eq!(
        by["from_root"].endian_source.map(|s| s.label()),
        Some("root")
    );
    assert_eq!(
        by["from_type"].endian_source.map(|s| s.label()),
        Some("type")
    );
    assert_eq!(
        by["from_field"].endian_source.map(|s| s.label()),
        Some("field")
    );
}

#[test]
fn struct_endian_inherited_by_children() {
    let grammar = load_grammar(
        "fields:\n  - name: s\n    type: struct\n    endian: big\n    fields:\n      - { name: a, type: u16 }\n",
    )
    .unwrap();
    let (_f, reader) = reader_for(&[0x12, 0x34]);
    let outcome = parse_schema(&reader, &grammar);
    let by = by_path(&outcome.leaves);
    assert_eq!(by["s.a"].value, Some(Value::UInt(0x1234)));
    assert_eq!(by["s.a"].endian_source.map(|s| s.label()), Some("parent"));
}

#[test]
fn truncated_numeric_records_error() {
    let grammar = load_grammar("fields:\n  - { name: big, type: u64 }\n").unwrap();
    let (_f, reader) = reader_for(&[1, 2, 3]);
    let outcome = parse_schema(&reader, &grammar);
    let by = by_path(&outcome.leaves);
    let leaf = &by["big"];
    assert!(leaf.value.is_none());
    assert!(matches!(&leaf.error, Some(e) if e.contains("truncated at EOF")));
    // Bounds invariant: offset + length never exceeds the file
    assert!(leaf.offset + leaf.length <= reader.size());
}

#[test]
fn bytes_truncated_at_eof_records_actual_length() {
    let grammar = load_grammar("fields:\n  - { name: blob, type: bytes, length: 100 }\n").unwrap();
    let (_f, reader) = reader_for(&[0xAA; 10]);
    let outcome = parse_schema(&reader, &grammar);
    let by = by_path(&outcome.leaves);
    assert_eq!(by["blob"].length, 10);
    assert_eq!(by["blob"].value, Some(Value::Bytes(vec![0xAA; 10])));
    assert!(matches!(&by["blob"].error, Some(e) if e.contains("truncated at EOF")));
}

#[test]
fn unterminated_cstring_is_capped() {
    let grammar = load_grammar(
        "fields:\n  - { name: tag, type: string, null_terminated: true, max_length: 4 }\n",
    )
    .unwrap();
    let (_f, reader) = reader_for(b"ABCDEFGH");
    let outcome = parse_schema(&reader, &grammar);
    let by = by_path(&outcome.leaves);
    assert_eq!(by["tag"].value, Some(Value::Str("ABCD".into())));
    assert_eq!(by["tag"].length, 4);
    assert!(matches!(&by["tag"].error, Some(e) if e.contains("capped")));
}

#[test]
fn cancellation_between_top_level_fields() {
    let grammar = load_grammar(
        "fields:\n  - { name: a, type: u8 }\n  - { name: b, type: u8 }\n  - { name: c, type: u8 }\n",
    )
    .unwrap();
    let (_f, reader) = reader_for(&[1, 2, 3]);
    let calls = std::cell::Cell::new(0usize);
    let cancel = || {
        calls.set(calls.get() + 1);
        calls.get() > 1
    };
    let cancel: &dyn Fn() -> bool = &cancel;
    let outcome = parse_schema_with(&reader, &grammar, &ParseOptions::default(), Some(cancel));
    assert_eq!(outcome.leaves.len(), 1);
    assert!(outcome.errors.iter().any(|e| e.contains("cancelled")));
}

#[test]
fn explicit_offset_rewind_is_legal() {
    // Union-like layout: two views of the same bytes
    let grammar = load_grammar(
        "fields:\n  - { name: as_u32, offset: 0, type: u32 }\n  - { name: lo, offset: 0, type: u16 }\n",
    )
    .unwrap();
    let (_f, reader) = reader_for(&[0x78, 0x56, 0x34, 0x12]);
    let outcome = parse_schema(&reader, &grammar);
    let by = by_path(&outcome.leaves);
    assert_eq!(by["as_u32"].value, Some(Value::UInt(0x12345678)));
    assert_eq!(by["lo"].value, Some(Value::UInt(0x5678)));
    // Flagged, not rejected
    assert!(outcome.errors.iter().any(|e| e.contains("Overlap")));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn leaf_bounds_hold_or_error_is_set(
            data in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            // A grammar that pushes past most file sizes in the range
            let grammar = load_grammar(
                "fields:\n  - { name: count, type: u8 }\n  - name: items\n    type: array\n    length_from: count\n    element:\n      type: u16\n  - { name: tail, type: bytes, length: 8 }\n",
            )
            .unwrap();
            let (_f, reader) = reader_for(&data);
            let outcome = parse_schema(&reader, &grammar);
            for leaf in &outcome.leaves {
                prop_assert!(
                    leaf.offset + leaf.length <= reader.size() || leaf.error.is_some(),
                    "leaf {} [{}, +{}] exceeds size {} without error",
                    leaf.path,
                    leaf.offset,
                    leaf.length,
                    reader.size()
                );
            }
        }
    }
}

#[test]
fn color_override_flows_to_leaves() {
    let grammar = load_grammar(
        "fields:\n  - { name: a, type: u8, color: Red }\n  - { name: b, type: u8, color: \"#00FF00\" }\n",
    )
    .unwrap();
    let (_f, reader) = reader_for(&[1, 2]);
    let outcome = parse_schema(&reader, &grammar);
    let by = by_path(&outcome.leaves);
    assert_eq!(by["a"].color.as_deref(), Some("red"));
    assert_eq!(by["b"].color.as_deref(), Some("#00ff00"));
}
