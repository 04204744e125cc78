//! Forward byte and text search over a reader.
//!
//! Chunked scan with an overlap of `len(needle) - 1` bytes between
//! chunks so matches straddling a boundary are still found.

use binmap_core::{Encoding, PagedReader, Result};

use crate::DEFAULT_CHUNK_SIZE;

/// Find `needle` at or after `start`. Returns the first match offset
/// or `None`.
pub fn find_bytes(reader: &PagedReader, needle: &[u8], start: u64) -> Result<Option<u64>> {
    find_bytes_chunked(reader, needle, start, DEFAULT_CHUNK_SIZE)
}

/// [`find_bytes`] with an explicit chunk size.
pub fn find_bytes_chunked(
    reader: &PagedReader,
    needle: &[u8],
    start: u64,
    chunk_size: usize,
) -> Result<Option<u64>> {
    let size = reader.size();
    if needle.is_empty() {
        return Ok((start <= size).then_some(start));
    }
    if start >= size {
        return Ok(None);
    }

    let chunk_size = chunk_size.max(needle.len());
    let overlap = (needle.len() - 1) as u64;
    let mut pos = start;
    while pos < size {
        let end = size.min(pos + chunk_size as u64);
        let data = reader.read(pos, (end - pos) as usize)?;
        if let Some(i) = find_subslice(&data, needle) {
            return Ok(Some(pos + i as u64));
        }
        if end >= size {
            break;
        }
        // Step back so a needle split by the boundary is seen whole
        pos = end - overlap;
    }
    Ok(None)
}

/// Find encoded text at or after `start`. Text that cannot be
/// represented in the encoding never matches.
pub fn find_text(
    reader: &PagedReader,
    text: &str,
    start: u64,
    encoding: Encoding,
) -> Result<Option<u64>> {
    let Some(needle) = encode_needle(text, encoding) else {
        return Ok(None);
    };
    find_bytes(reader, &needle, start)
}

fn encode_needle(text: &str, encoding: Encoding) -> Option<Vec<u8>> {
    match encoding {
        Encoding::Ascii => text.is_ascii().then(|| text.as_bytes().to_vec()),
        Encoding::Utf8 => Some(text.as_bytes().to_vec()),
        Encoding::Utf16Le => Some(
            text.encode_utf16()
                .flat_map(|unit| unit.to_le_bytes())
                .collect(),
        ),
        Encoding::Utf16Be => Some(
            text.encode_utf16()
                .flat_map(|unit| unit.to_be_bytes())
                .collect(),
        ),
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn reader_for(data: &[u8]) -> (tempfile::NamedTempFile, PagedReader) {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(data).unwrap();
        f.flush().unwrap();
        let r = PagedReader::open(f.path()).unwrap();
        (f, r)
    }

    #[test]
    fn test_find_basic() {
        let (_f, r) = reader_for(b"hello world hello");
        assert_eq!(find_bytes(&r, b"hello", 0).unwrap(), Some(0));
        assert_eq!(find_bytes(&r, b"hello", 1).unwrap(), Some(12));
        assert_eq!(find_bytes(&r, b"absent", 0).unwrap(), None);
    }

    #[test]
    fn test_find_across_chunk_boundary() {
        let mut data = vec![0u8; 100];
        data[14..18].copy_from_slice(b"NEED");
        let (_f, r) = reader_for(&data);
        // Chunk of 16 splits the needle at 14..18
        assert_eq!(find_bytes_chunked(&r, b"NEED", 0, 16).unwrap(), Some(14));
    }

    #[test]
    fn test_empty_needle() {
        let (_f, r) = reader_for(b"abc");
        assert_eq!(find_bytes(&r, b"", 2).unwrap(), Some(2));
        assert_eq!(find_bytes(&r, b"", 4).unwrap(), None);
    }

    #[test]
    fn test_find_text_utf16le() {
        let mut data = vec![0xFFu8; 8];
        data.extend("HI".encode_utf16().flat_map(|u| u.to_le_bytes()));
        let (_f, r) = reader_for(&data);
        assert_eq!(
            find_text(&r, "HI", 0, Encoding::Utf16Le).unwrap(),
            Some(8)
        );
    }

    #[test]
    fn test_find_text_non_ascii_needle() {
        let (_f, r) = reader_for(b"plain");
        assert_eq!(find_text(&r, "é", 0, Encoding::Ascii).unwrap(), None);
    }
}
