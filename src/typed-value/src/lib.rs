//! Self-describing typed-value wire format shared by site-info and per-sample
//! fields: a header byte carrying an inline length (or a `typed_int64` scalar
//! for longer vectors), a type code selecting one of six numeric widths or a
//! UTF-8 byte string, and an optional sparse encoding layered over any of
//! them.

mod compressed_vector;
mod convert;
mod error;
mod scalar;
mod sentinel;
mod typed_int;
mod value;

pub use compressed_vector::{dense_stride_reduce, CompressedVector};
pub use convert::{convert_float_scalar, convert_floats, convert_int_scalar, convert_ints};
pub use error::TypedValueError;
pub use scalar::{
    narrowest_offset_code, offset_width_for_code, FloatScalar, IntScalar, WireOffset, WireScalar, TYPE_FLOAT32,
    TYPE_FLOAT64, TYPE_INT16, TYPE_INT32, TYPE_INT64, TYPE_INT8, TYPE_SPARSE, TYPE_UTF8,
};
pub use sentinel::{
    end_of_vector_f32, end_of_vector_f64, is_missing_f32, is_missing_f64, missing_f32, missing_f64, missing_i16,
    missing_i32, missing_i64, missing_i8, MISSING_STRING_BYTE,
};
pub use typed_int::{read_typed_int, write_typed_int};
pub use value::{TypedValue, Utf8Value, ValueVec, SENTINEL};
