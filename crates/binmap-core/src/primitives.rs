//! Bounds-checked primitive numeric decoding.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::endian::Endian;
use crate::types::{PrimType, Value};

/// Decode an unsigned integer of `width` bytes (1, 2, 4, or 8).
///
/// Returns `None` when `data` is shorter than `width`.
pub fn decode_uint(data: &[u8], width: usize, endian: Endian) -> Option<u64> {
    if data.len() < width {
        return None;
    }
    let d = &data[..width];
    Some(match (width, endian) {
        (1, _) => u64::from(d[0]),
        (2, Endian::Little) => u64::from(LittleEndian::read_u16(d)),
        (2, Endian::Big) => u64::from(BigEndian::read_u16(d)),
        (4, Endian::Little) => u64::from(LittleEndian::read_u32(d)),
        (4, Endian::Big) => u64::from(BigEndian::read_u32(d)),
        (8, Endian::Little) => LittleEndian::read_u64(d),
        (8, Endian::Big) => BigEndian::read_u64(d),
        _ => return None,
    })
}

/// Decode a signed integer of `width` bytes (1, 2, 4, or 8).
pub fn decode_int(data: &[u8], width: usize, endian: Endian) -> Option<i64> {
    if data.len() < width {
        return None;
    }
    let d = &data[..width];
    Some(match (width, endian) {
        (1, _) => i64::from(d[0] as i8),
        (2, Endian::Little) => i64::from(LittleEndian::read_i16(d)),
        (2, Endian::Big) => i64::from(BigEndian::read_i16(d)),
        (4, Endian::Little) => i64::from(LittleEndian::read_i32(d)),
        (4, Endian::Big) => i64::from(BigEndian::read_i32(d)),
        (8, Endian::Little) => LittleEndian::read_i64(d),
        (8, Endian::Big) => BigEndian::read_i64(d),
        _ => return None,
    })
}

/// Decode a 32-bit float.
pub fn decode_f32(data: &[u8], endian: Endian) -> Option<f32> {
    if data.len() < 4 {
        return None;
    }
    Some(match endian {
        Endian::Little => LittleEndian::read_f32(&data[..4]),
        Endian::Big => BigEndian::read_f32(&data[..4]),
    })
}

/// Decode a 64-bit float.
pub fn decode_f64(data: &[u8], endian: Endian) -> Option<f64> {
    if data.len() < 8 {
        return None;
    }
    Some(match endian {
        Endian::Little => LittleEndian::read_f64(&data[..8]),
        Endian::Big => BigEndian::read_f64(&data[..8]),
    })
}

/// Decode a fixed-width numeric primitive into a [`Value`].
///
/// Returns `None` for insufficient bytes, and for `bytes`/`string`
/// which are not numeric primitives.
pub fn decode_numeric(data: &[u8], prim: PrimType, endian: Endian) -> Option<Value> {
    let width = prim.width()? as usize;
    match prim {
        PrimType::F32 => decode_f32(data, endian).map(|v| Value::Float(f64::from(v))),
        PrimType::F64 => decode_f64(data, endian).map(Value::Float),
        _ if prim.is_signed() => decode_int(data, width, endian).map(Value::Int),
        _ => decode_uint(data, width, endian).map(Value::UInt),
    }
}
