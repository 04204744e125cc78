//! String decoding: fixed-length and null-terminated, with
//! printable-ratio heuristics used when scouting unknown regions.

use crate::reader::PagedReader;
use crate::types::Encoding;

const PRINTABLE_MIN: u8 = 32;
const PRINTABLE_MAX: u8 = 126;

/// Render bytes as ASCII, substituting `·` for non-printables.
pub fn ascii_glyphs(data: &[u8]) -> String {
    data.iter()
        .map(|&c| {
            if (PRINTABLE_MIN..=PRINTABLE_MAX).contains(&c) {
                c as char
            } else {
                '·'
            }
        })
        .collect()
}

/// Decode bytes with the given encoding, replacing undecodable
/// sequences with a replacement glyph. Never fails.
pub fn decode_string(data: &[u8], encoding: Encoding) -> String {
    match encoding {
        Encoding::Ascii => ascii_glyphs(data),
        Encoding::Utf8 => String::from_utf8_lossy(data).into_owned(),
        Encoding::Utf16Le => decode_utf16_units(data, |pair| u16::from_le_bytes(pair)),
        Encoding::Utf16Be => decode_utf16_units(data, |pair| u16::from_be_bytes(pair)),
    }
}

fn decode_utf16_units(data: &[u8], unit: impl Fn([u8; 2]) -> u16) -> String {
    let mut units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    // Odd trailing byte cannot form a code unit
    if data.len() % 2 != 0 {
        units.push(0xFFFD);
    }
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Outcome of a null-terminated string scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CStringScan {
    /// Decoded text, excluding the terminator
    pub text: String,
    /// True when a 0x00 terminator was found within the window
    pub terminated: bool,
    /// Bytes consumed, including the terminator when present
    pub consumed: u64,
    /// True when the cap was reached without seeing a terminator
    pub capped: bool,
}

/// Scan a window (already clipped to `max_len` and EOF) for a
/// null-terminated string.
///
/// When a zero byte sits at index `i`, the text is the decoded bytes
/// `[0, i)` and `i + 1` bytes are consumed. Without a terminator the
/// whole window decodes and `capped` reports whether the window
/// actually filled `max_len`.
pub fn scan_cstring(window: &[u8], max_len: u64, encoding: Encoding) -> CStringScan {
    if window.is_empty() || max_len == 0 {
        return CStringScan {
            text: String::new(),
            terminated: false,
            consumed: 0,
            capped: false,
        };
    }
    match window.iter().position(|&b| b == 0) {
        Some(i) => CStringScan {
            text: decode_string(&window[..i], encoding),
            terminated: true,
            consumed: (i + 1) as u64,
            capped: false,
        },
        None => {
            let consumed = window.len() as u64;
            CStringScan {
                text: decode_string(window, encoding),
                terminated: false,
                consumed,
                capped: consumed >= max_len,
            }
        }
    }
}

/// Fraction of printable bytes (space included) in a window.
pub fn printable_ratio(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let n = data
        .iter()
        .filter(|&&c| (PRINTABLE_MIN..=PRINTABLE_MAX).contains(&c))
        .count();
    n as f64 / data.len() as f64
}

/// Probe mode for [`stringy_heuristic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringProbe {
    /// Fixed-window ASCII text (possibly space-padded)
    Ascii,
    /// Null-terminated text expected within the basis window
    CString,
}

/// Heuristic string-likeness over the first `min(32, basis)` bytes.
pub fn stringy_heuristic(
    reader: &PagedReader,
    offset: u64,
    length_basis: u64,
    mode: StringProbe,
) -> bool {
    let window = length_basis.clamp(1, 32) as usize;
    let Ok(head) = reader.read(offset, window) else {
        return false;
    };
    if head.is_empty() || printable_ratio(&head) < 0.70 {
        return false;
    }
    match mode {
        StringProbe::Ascii => {
            // Space padding suggests a fixed text slot
            let trailing_spaces = head.len() - trim_end_spaces(&head).len();
            if trailing_spaces >= (window / 4).max(1) {
                return true;
            }
            // Or a long printable run before the first non-printable
            let run = head
                .iter()
                .take_while(|&&c| (PRINTABLE_MIN..=PRINTABLE_MAX).contains(&c))
                .count();
            run >= (window / 2).max(8)
        }
        StringProbe::CString => {
            let Ok(tail) = reader.read(offset, length_basis.max(1) as usize) else {
                return false;
            };
            tail.contains(&0)
        }
    }
}

/// Whether any of the readers look text-like at `offset`, probing a
/// fixed window of `n` and a terminator cap of `m`.
pub fn any_stringy(readers: &[&PagedReader], offset: u64, n: u64, m: u64) -> bool {
    readers.iter().any(|r| {
        stringy_heuristic(r, offset, m, StringProbe::CString)
            || stringy_heuristic(r, offset, n, StringProbe::Ascii)
    })
}

fn trim_end_spaces(data: &[u8]) -> &[u8] {
    let mut end = data.len();
    while end > 0 && data[end - 1] == b' ' {
        end -= 1;
    }
    &data[..end]
}
