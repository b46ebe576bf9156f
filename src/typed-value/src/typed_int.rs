//! `typed_int64`: a typed value reduced to a single signed integer, written
//! in the narrowest width (1/2/4/8 bytes) that holds it. Used to encode the
//! typed-value length scalar, the sparse physical count, and (as
//! `typed_int32` in the site-info codec) dictionary key references — the
//! wire mechanism is identical regardless of the field's natural domain.

use crate::error::TypedValueError;
use crate::scalar::{TYPE_FLOAT32, TYPE_FLOAT64, TYPE_INT16, TYPE_INT32, TYPE_INT64, TYPE_INT8, TYPE_UTF8};

/// Write `value` as a header byte `(1 << 4) | type_code` followed by the
/// narrowest signed-integer body that can hold it.
pub fn write_typed_int(value: i64, out: &mut Vec<u8>) {
    if value >= i64::from(i8::MIN) + 1 && value <= i64::from(i8::MAX) {
        out.push((1u8 << 4) | TYPE_INT8);
        out.push(value as i8 as u8);
    } else if value >= i64::from(i16::MIN) + 1 && value <= i64::from(i16::MAX) {
        out.push((1u8 << 4) | TYPE_INT16);
        out.extend_from_slice(&(value as i16).to_le_bytes());
    } else if value >= i64::from(i32::MIN) + 1 && value <= i64::from(i32::MAX) {
        out.push((1u8 << 4) | TYPE_INT32);
        out.extend_from_slice(&(value as i32).to_le_bytes());
    } else {
        out.push((1u8 << 4) | TYPE_INT64);
        out.extend_from_slice(&value.to_le_bytes());
    }
}

/// Read a `typed_int64` from the front of `bytes`, returning the value and
/// the number of bytes consumed (header byte included).
pub fn read_typed_int(bytes: &[u8]) -> Result<(i64, usize), TypedValueError> {
    let header = *bytes.first().ok_or(TypedValueError::TruncatedRecord)?;
    let type_code = header & 0x0F;
    let width = match type_code {
        TYPE_INT8 => 1,
        TYPE_INT16 => 2,
        TYPE_INT32 => 4,
        TYPE_INT64 => 8,
        TYPE_FLOAT32 | TYPE_FLOAT64 | TYPE_UTF8 => {
            return Err(TypedValueError::UnknownTypeCode(type_code))
        }
        other => return Err(TypedValueError::UnknownTypeCode(other)),
    };
    let body = bytes.get(1..1 + width).ok_or(TypedValueError::TruncatedRecord)?;
    let value: i64 = match width {
        1 => i64::from(body[0] as i8),
        2 => i64::from(i16::from_le_bytes([body[0], body[1]])),
        4 => i64::from(i32::from_le_bytes(body.try_into().unwrap())),
        8 => i64::from_le_bytes(body.try_into().unwrap()),
        _ => unreachable!(),
    };
    Ok((value, 1 + width))
}
