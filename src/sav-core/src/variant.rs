//! The individual block: an ordered list of `(FORMAT-key, typed-value)`
//! pairs, plus the dense-`i64` view PBWT encoding operates over.

use typed_value::{convert_ints, read_typed_int, write_typed_int, TypedValue, ValueVec};

use crate::error::SavError;
use crate::site_info::SiteInfo;

#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub site: SiteInfo,
    pub format: Vec<(i32, TypedValue)>,
}

impl Variant {
    pub fn serialize_individual(&self, out: &mut Vec<u8>) {
        for &(key, ref value) in &self.format {
            write_typed_int(i64::from(key), out);
            value.serialize(out);
        }
    }

    pub fn deserialize_individual(bytes: &[u8], n_fmt: u32) -> Result<(Vec<(i32, TypedValue)>, usize), SavError> {
        let mut pos = 0usize;
        let mut format = Vec::with_capacity(n_fmt as usize);
        for _ in 0..n_fmt {
            let (key, consumed) = read_typed_int(&bytes[pos..]).map_err(SavError::from)?;
            pos += consumed;
            let (value, consumed) = TypedValue::deserialize(&bytes[pos..])?;
            pos += consumed;
            format.push((key as i32, value));
        }
        Ok((format, pos))
    }
}

/// Materializes a FORMAT value's dense elements as `i64`, the width PBWT
/// counting-sort operates over. Non-integer fields are never PBWT targets.
pub fn dense_i64(value: &TypedValue) -> Result<Vec<i64>, SavError> {
    match value {
        TypedValue::Int8(v) => Ok(v.to_dense().into_iter().map(i64::from).collect()),
        TypedValue::Int16(v) => Ok(v.to_dense().into_iter().map(i64::from).collect()),
        TypedValue::Int32(v) => Ok(v.to_dense().into_iter().map(i64::from).collect()),
        TypedValue::Int64(v) => Ok(v.to_dense()),
        _ => Err(SavError::PbwtLengthMismatch("PBWT target is not an integer FORMAT field".into())),
    }
}

/// Rebuilds a typed value of the same element width as `template`, from a
/// dense `i64` vector produced by PBWT encode/decode. PBWT only permutes an
/// existing set of values, so narrowing back to `template`'s width never
/// drops magnitude in practice; the conversion is still checked rather than
/// cast, since a corrupt frame could otherwise alias a value onto the
/// narrower width's missing sentinel undetected.
pub fn rewrap_i64(template: &TypedValue, values: Vec<i64>) -> Result<TypedValue, SavError> {
    Ok(match template {
        TypedValue::Int8(_) => TypedValue::Int8(ValueVec::Dense(convert_ints::<i64, i8>(&values)?)),
        TypedValue::Int16(_) => TypedValue::Int16(ValueVec::Dense(convert_ints::<i64, i16>(&values)?)),
        TypedValue::Int64(_) => TypedValue::Int64(ValueVec::Dense(values)),
        _ => TypedValue::Int32(ValueVec::Dense(convert_ints::<i64, i32>(&values)?)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_format() -> Vec<(i32, TypedValue)> {
        vec![
            (0, TypedValue::Int8(ValueVec::Dense(vec![0, 1, 0, 1]))),
            (1, TypedValue::Float32(ValueVec::Dense(vec![1.5, 2.0]))),
        ]
    }

    #[test]
    fn round_trips_format_pairs() {
        let format = sample_format();
        let mut buf = Vec::new();
        for (key, value) in &format {
            write_typed_int(i64::from(*key), &mut buf);
            value.serialize(&mut buf);
        }
        let (decoded, consumed) = Variant::deserialize_individual(&buf, format.len() as u32).unwrap();
        assert_eq!(decoded, format);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn dense_i64_round_trips_through_rewrap() {
        let gt = TypedValue::Int8(ValueVec::Dense(vec![0, 1, 2, 3]));
        let values = dense_i64(&gt).unwrap();
        assert_eq!(values, vec![0, 1, 2, 3]);
        let rewrapped = rewrap_i64(&gt, values).unwrap();
        assert_eq!(rewrapped, gt);
    }

    #[test]
    fn dense_i64_rejects_non_integer_fields() {
        let ds = TypedValue::Float32(ValueVec::Dense(vec![1.5]));
        assert!(dense_i64(&ds).is_err());
    }
}
