//! Numeric inspector: decode the bytes at an offset every way at
//! once. Pure; the UI renders the readout.

use binmap_core::{primitives, strings, Endian, PagedReader};

/// One inspector cell: display text plus whether enough bytes were
/// available. The sentinel text for a short read is `—`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumCell {
    pub text: String,
    pub ok: bool,
}

impl NumCell {
    fn missing() -> Self {
        NumCell {
            text: "—".into(),
            ok: false,
        }
    }

    fn value(text: String) -> Self {
        NumCell { text, ok: true }
    }
}

fn read_for(reader: &PagedReader, offset: u64, width: usize) -> Option<Vec<u8>> {
    let data = reader.read(offset, width).ok()?;
    (data.len() == width).then_some(data)
}

/// Decode an integer of `bits` width at `offset`.
pub fn decode_int_cell(
    reader: &PagedReader,
    offset: u64,
    bits: u32,
    signed: bool,
    endian: Endian,
) -> NumCell {
    let width = (bits / 8) as usize;
    let Some(data) = read_for(reader, offset, width) else {
        return NumCell::missing();
    };
    let text = if signed {
        primitives::decode_int(&data, width, endian).map(|v| v.to_string())
    } else {
        primitives::decode_uint(&data, width, endian).map(|v| v.to_string())
    };
    match text {
        Some(text) => NumCell::value(text),
        None => NumCell::missing(),
    }
}

/// Decode a float of `bits` width (32 or 64) at `offset`.
pub fn decode_float_cell(reader: &PagedReader, offset: u64, bits: u32, endian: Endian) -> NumCell {
    let width = (bits / 8) as usize;
    let Some(data) = read_for(reader, offset, width) else {
        return NumCell::missing();
    };
    let value = match bits {
        32 => primitives::decode_f32(&data, endian).map(f64::from),
        64 => primitives::decode_f64(&data, endian),
        _ => None,
    };
    match value {
        Some(v) => NumCell::value(format_float(v)),
        None => NumCell::missing(),
    }
}

fn format_float(v: f64) -> String {
    if v.is_nan() || v.is_infinite() {
        return v.to_string();
    }
    format!("{v}")
}

/// Decode every integer width and endianness plus both float widths
/// at `offset`. Entries are `(label, cell)`; a cell with `ok ==
/// false` means the file ended too soon for that width.
pub fn inspect_numbers(reader: &PagedReader, offset: u64) -> Vec<(&'static str, NumCell)> {
    use Endian::{Big, Little};
    vec![
        ("u8", decode_int_cell(reader, offset, 8, false, Little)),
        ("i8", decode_int_cell(reader, offset, 8, true, Little)),
        ("u16le", decode_int_cell(reader, offset, 16, false, Little)),
        ("i16le", decode_int_cell(reader, offset, 16, true, Little)),
        ("u16be", decode_int_cell(reader, offset, 16, false, Big)),
        ("i16be", decode_int_cell(reader, offset, 16, true, Big)),
        ("u32le", decode_int_cell(reader, offset, 32, false, Little)),
        ("i32le", decode_int_cell(reader, offset, 32, true, Little)),
        ("u32be", decode_int_cell(reader, offset, 32, false, Big)),
        ("i32be", decode_int_cell(reader, offset, 32, true, Big)),
        ("u64le", decode_int_cell(reader, offset, 64, false, Little)),
        ("i64le", decode_int_cell(reader, offset, 64, true, Little)),
        ("u64be", decode_int_cell(reader, offset, 64, false, Big)),
        ("i64be", decode_int_cell(reader, offset, 64, true, Big)),
        ("f32le", decode_float_cell(reader, offset, 32, Little)),
        ("f32be", decode_float_cell(reader, offset, 32, Big)),
        ("f64le", decode_float_cell(reader, offset, 64, Little)),
        ("f64be", decode_float_cell(reader, offset, 64, Big)),
    ]
}

/// Decode a run of `count` same-width integers at `offset`, or `None`
/// when the file ends too soon.
pub fn decode_int_array(
    reader: &PagedReader,
    offset: u64,
    bits: u32,
    signed: bool,
    endian: Endian,
    count: usize,
) -> Option<Vec<i64>> {
    let width = (bits / 8) as usize;
    let total = width.checked_mul(count)?;
    let data = read_for(reader, offset, total)?;
    let mut values = Vec::with_capacity(count);
    for chunk in data.chunks_exact(width) {
        let v = if signed {
            primitives::decode_int(chunk, width, endian)?
        } else {
            i64::try_from(primitives::decode_uint(chunk, width, endian)?).ok()?
        };
        values.push(v);
    }
    Some(values)
}

/// Compact one-line summary of an integer run: count, min, max, and
/// the first few values.
pub fn array_summary(values: &[i64]) -> String {
    if values.is_empty() {
        return "k=0".into();
    }
    let min = values.iter().min().unwrap_or(&0);
    let max = values.iter().max().unwrap_or(&0);
    let head: Vec<String> = values.iter().take(4).map(|v| v.to_string()).collect();
    let tail = if values.len() > 4 { ", …" } else { "" };
    format!(
        "k={}  min={min}  max={max}  [{}{tail}]",
        values.len(),
        head.join(", ")
    )
}

/// Render up to `limit` bytes at `offset` as ASCII glyphs
/// (non-printables as `·`).
pub fn ascii_preview(reader: &PagedReader, offset: u64, limit: usize) -> String {
    let data = reader.read(offset, limit).unwrap_or_default();
    strings::ascii_glyphs(&data)
}

/// Guess a C string at `offset`: a non-empty printable run ending in
/// a NUL within `limit` bytes. Returns `(text, consumed)` including
/// the terminator.
pub fn c_string_guess(reader: &PagedReader, offset: u64, limit: usize) -> Option<(String, u64)> {
    let view = reader.read(offset, limit).ok()?;
    let nul = view.iter().position(|&b| b == 0)?;
    if nul == 0 {
        return None;
    }
    let head = &view[..nul];
    if !head.iter().all(|&b| (32..=126).contains(&b)) {
        return None;
    }
    Some((strings::ascii_glyphs(head), (nul + 1) as u64))
}
