//! `into<T>` conversions between element widths: widening preserves the
//! missing sentinel, narrowing fails if it would alias a real value onto
//! the destination's missing sentinel or drop magnitude the destination
//! can't represent.

use crate::error::TypedValueError;
use crate::scalar::{FloatScalar, IntScalar};

pub fn convert_ints<S: IntScalar, D: IntScalar>(values: &[S]) -> Result<Vec<D>, TypedValueError> {
    values.iter().map(|&v| convert_int_scalar::<S, D>(v)).collect()
}

pub fn convert_int_scalar<S: IntScalar, D: IntScalar>(v: S) -> Result<D, TypedValueError> {
    if v.is_missing() {
        return Ok(D::missing());
    }
    let raw = v.to_i64();
    let narrowed = D::from_i64(raw);
    if narrowed.to_i64() != raw {
        return Err(TypedValueError::NarrowingLoss);
    }
    if narrowed.is_missing() {
        // A real value aliased onto the destination's reserved sentinel.
        return Err(TypedValueError::NarrowingLoss);
    }
    Ok(narrowed)
}

pub fn convert_floats<S: FloatScalar, D: FloatScalar>(values: &[S]) -> Vec<D> {
    values.iter().map(|&v| convert_float_scalar::<S, D>(v)).collect()
}

pub fn convert_float_scalar<S: FloatScalar, D: FloatScalar>(v: S) -> D {
    if v.is_missing() {
        return D::missing();
    }
    D::from_f64(v.to_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widening_preserves_missing() {
        let v: i8 = i8::MIN;
        let widened: i32 = convert_int_scalar(v).unwrap();
        assert_eq!(widened, i32::MIN);
    }

    #[test]
    fn narrowing_real_value_into_range_succeeds() {
        let v: i32 = 10;
        let narrowed: i8 = convert_int_scalar(v).unwrap();
        assert_eq!(narrowed, 10);
    }

    #[test]
    fn narrowing_out_of_range_fails() {
        let v: i32 = 1000;
        let result: Result<i8, _> = convert_int_scalar(v);
        assert!(matches!(result, Err(TypedValueError::NarrowingLoss)));
    }

    #[test]
    fn narrowing_aliasing_missing_sentinel_fails() {
        // i8::MIN is the i8 missing sentinel; a real i32 value of exactly
        // i8::MIN as i64 must not silently become "missing" once narrowed.
        let v: i32 = i64::from(i8::MIN) as i32;
        let result: Result<i8, _> = convert_int_scalar(v);
        assert!(matches!(result, Err(TypedValueError::NarrowingLoss)));
    }
}
