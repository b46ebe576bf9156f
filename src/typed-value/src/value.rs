use crate::compressed_vector::CompressedVector;
use crate::error::TypedValueError;
use crate::scalar::{
    narrowest_offset_code, offset_width_for_code, WireOffset, WireScalar, TYPE_FLOAT32, TYPE_FLOAT64, TYPE_INT16,
    TYPE_INT32, TYPE_INT64, TYPE_INT8, TYPE_SPARSE, TYPE_UTF8,
};
use crate::sentinel::MISSING_STRING_BYTE;
use crate::typed_int::{read_typed_int, write_typed_int};

/// Marks "no destination slot" in a [`TypedValue::subset`] index map.
pub const SENTINEL: u64 = u64::MAX;

/// Dense-or-sparse storage for one numeric element width.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueVec<T> {
    Dense(Vec<T>),
    Sparse(CompressedVector<T>),
}

impl<T: Copy> ValueVec<T> {
    pub fn logical_len(&self) -> u64 {
        match self {
            ValueVec::Dense(v) => v.len() as u64,
            ValueVec::Sparse(cv) => cv.logical_len(),
        }
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, ValueVec::Sparse(_))
    }
}

impl<T: Copy + Default + PartialEq> ValueVec<T> {
    pub fn to_dense(&self) -> Vec<T> {
        match self {
            ValueVec::Dense(v) => v.clone(),
            ValueVec::Sparse(cv) => cv.to_dense(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Utf8Value {
    Dense(Vec<u8>),
    Sparse(CompressedVector<u8>),
}

impl Utf8Value {
    pub fn logical_len(&self) -> u64 {
        match self {
            Utf8Value::Dense(v) => v.len() as u64,
            Utf8Value::Sparse(cv) => cv.logical_len(),
        }
    }

    pub fn to_dense(&self) -> Vec<u8> {
        match self {
            Utf8Value::Dense(v) => v.clone(),
            Utf8Value::Sparse(cv) => cv.to_dense(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Int8(ValueVec<i8>),
    Int16(ValueVec<i16>),
    Int32(ValueVec<i32>),
    Int64(ValueVec<i64>),
    Float32(ValueVec<f32>),
    Float64(ValueVec<f64>),
    Utf8(Utf8Value),
}

fn header_size_for_len(len: u64) -> usize {
    if len >= 15 {
        let mut scratch = Vec::new();
        write_typed_int(len as i64, &mut scratch);
        1 + scratch.len()
    } else {
        1
    }
}

fn write_header(type_code: u8, len: u64, out: &mut Vec<u8>) {
    out.push(((len.min(15) as u8) << 4) | type_code);
    if len >= 15 {
        write_typed_int(len as i64, out);
    }
}

/// Reads the header byte (and, if `LEN == 15`, the length scalar). Returns
/// `(type_code, logical_len, bytes_consumed)`.
fn read_header(bytes: &[u8]) -> Result<(u8, u64, usize), TypedValueError> {
    let header = *bytes.first().ok_or(TypedValueError::TruncatedRecord)?;
    let len_nibble = header >> 4;
    let type_code = header & 0x0F;
    if len_nibble < 15 {
        Ok((type_code, u64::from(len_nibble), 1))
    } else {
        let (len, consumed) = read_typed_int(&bytes[1..])?;
        Ok((type_code, len as u64, 1 + consumed))
    }
}

fn write_dense_body<T: WireScalar>(values: &[T], out: &mut Vec<u8>) {
    for &v in values {
        v.write_le(out);
    }
}

fn read_dense_body<T: WireScalar>(bytes: &[u8], len: u64) -> Result<Vec<T>, TypedValueError> {
    let len = len as usize;
    let total = len * T::WIDTH;
    let body = bytes.get(..total).ok_or(TypedValueError::TruncatedRecord)?;
    Ok((0..len).map(|i| T::read_le(&body[i * T::WIDTH..(i + 1) * T::WIDTH])).collect())
}

fn write_offsets(offsets: &[u64], off_code: u8, out: &mut Vec<u8>) {
    match off_code {
        TYPE_INT8 => offsets.iter().for_each(|&o| u8::from_u64(o).write_le(out)),
        TYPE_INT16 => offsets.iter().for_each(|&o| u16::from_u64(o).write_le(out)),
        TYPE_INT32 => offsets.iter().for_each(|&o| u32::from_u64(o).write_le(out)),
        TYPE_INT64 => offsets.iter().for_each(|&o| u64::from_u64(o).write_le(out)),
        other => unreachable!("offset type code restricted to 1..=4, got {other}"),
    }
}

fn read_offsets(bytes: &[u8], off_code: u8, count: u64, logical_len: u64) -> Result<Vec<u64>, TypedValueError> {
    let width = offset_width_for_code(off_code);
    let count = count as usize;
    let total = count * width;
    let body = bytes.get(..total).ok_or(TypedValueError::TruncatedRecord)?;
    let mut offsets = Vec::with_capacity(count);
    for i in 0..count {
        let chunk = &body[i * width..(i + 1) * width];
        let off = match off_code {
            TYPE_INT8 => u64::from(u8::read_le(chunk)),
            TYPE_INT16 => u64::from(u16::read_le(chunk)),
            TYPE_INT32 => u64::from(u32::read_le(chunk)),
            TYPE_INT64 => u64::read_le(chunk),
            other => unreachable!("offset type code restricted to 1..=4, got {other}"),
        };
        if off >= logical_len {
            return Err(TypedValueError::NonMonotonicOffsets);
        }
        if let Some(&last) = offsets.last() {
            if off <= last {
                return Err(TypedValueError::NonMonotonicOffsets);
            }
        }
        offsets.push(off);
    }
    Ok(offsets)
}

fn write_value_vec<T: WireScalar>(v: &ValueVec<T>, out: &mut Vec<u8>) {
    match v {
        ValueVec::Dense(values) => {
            write_header(T::TYPE_CODE, values.len() as u64, out);
            write_dense_body(values, out);
        }
        ValueVec::Sparse(cv) => {
            write_header(TYPE_SPARSE, cv.logical_len(), out);
            let off_code = narrowest_offset_code(cv.logical_len().saturating_sub(1));
            out.push((off_code << 4) | T::TYPE_CODE);
            write_typed_int(cv.physical_len() as i64, out);
            write_offsets(cv.offsets(), off_code, out);
            write_dense_body(cv.values(), out);
        }
    }
}

/// Serialized byte length `write_value_vec` would produce, without writing.
fn value_vec_wire_len<T: WireScalar>(v: &ValueVec<T>) -> usize {
    match v {
        ValueVec::Dense(values) => header_size_for_len(values.len() as u64) + values.len() * T::WIDTH,
        ValueVec::Sparse(cv) => {
            let off_code = narrowest_offset_code(cv.logical_len().saturating_sub(1));
            let off_width = offset_width_for_code(off_code);
            let mut phys_scratch = Vec::new();
            write_typed_int(cv.physical_len() as i64, &mut phys_scratch);
            header_size_for_len(cv.logical_len()) + 1 + phys_scratch.len() + cv.physical_len() * (off_width + T::WIDTH)
        }
    }
}

impl TypedValue {
    pub fn type_code(&self) -> u8 {
        match self {
            TypedValue::Int8(_) => TYPE_INT8,
            TypedValue::Int16(_) => TYPE_INT16,
            TypedValue::Int32(_) => TYPE_INT32,
            TypedValue::Int64(_) => TYPE_INT64,
            TypedValue::Float32(_) => TYPE_FLOAT32,
            TypedValue::Float64(_) => TYPE_FLOAT64,
            TypedValue::Utf8(_) => TYPE_UTF8,
        }
    }

    pub fn logical_len(&self) -> u64 {
        match self {
            TypedValue::Int8(v) => v.logical_len(),
            TypedValue::Int16(v) => v.logical_len(),
            TypedValue::Int32(v) => v.logical_len(),
            TypedValue::Int64(v) => v.logical_len(),
            TypedValue::Float32(v) => v.logical_len(),
            TypedValue::Float64(v) => v.logical_len(),
            TypedValue::Utf8(v) => v.logical_len(),
        }
    }

    pub fn is_sparse(&self) -> bool {
        match self {
            TypedValue::Int8(v) => v.is_sparse(),
            TypedValue::Int16(v) => v.is_sparse(),
            TypedValue::Int32(v) => v.is_sparse(),
            TypedValue::Int64(v) => v.is_sparse(),
            TypedValue::Float32(v) => v.is_sparse(),
            TypedValue::Float64(v) => v.is_sparse(),
            TypedValue::Utf8(Utf8Value::Sparse(_)) => true,
            TypedValue::Utf8(Utf8Value::Dense(_)) => false,
        }
    }

    /// A single missing string scalar: a length-1 value whose sole byte is `0x07`.
    pub fn missing_string() -> TypedValue {
        TypedValue::Utf8(Utf8Value::Dense(vec![MISSING_STRING_BYTE]))
    }

    pub fn is_missing_string(&self) -> bool {
        matches!(self, TypedValue::Utf8(Utf8Value::Dense(bytes)) if bytes.as_slice() == [MISSING_STRING_BYTE])
    }

    pub fn string(bytes: impl Into<Vec<u8>>) -> TypedValue {
        TypedValue::Utf8(Utf8Value::Dense(bytes.into()))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        match self {
            TypedValue::Int8(v) => write_value_vec(v, out),
            TypedValue::Int16(v) => write_value_vec(v, out),
            TypedValue::Int32(v) => write_value_vec(v, out),
            TypedValue::Int64(v) => write_value_vec(v, out),
            TypedValue::Float32(v) => write_value_vec(v, out),
            TypedValue::Float64(v) => write_value_vec(v, out),
            TypedValue::Utf8(v) => match v {
                Utf8Value::Dense(bytes) => {
                    write_header(TYPE_UTF8, bytes.len() as u64, out);
                    out.extend_from_slice(bytes);
                }
                Utf8Value::Sparse(cv) => {
                    write_header(TYPE_SPARSE, cv.logical_len(), out);
                    let off_code = narrowest_offset_code(cv.logical_len().saturating_sub(1));
                    out.push((off_code << 4) | TYPE_UTF8);
                    write_typed_int(cv.physical_len() as i64, out);
                    write_offsets(cv.offsets(), off_code, out);
                    out.extend_from_slice(cv.values());
                }
            },
        }
    }

    pub fn deserialize(bytes: &[u8]) -> Result<(TypedValue, usize), TypedValueError> {
        let (type_code, len, mut consumed) = read_header(bytes)?;

        if type_code == TYPE_SPARSE {
            let sub_header = *bytes.get(consumed).ok_or(TypedValueError::TruncatedRecord)?;
            consumed += 1;
            let off_code = sub_header >> 4;
            let val_code = sub_header & 0x0F;
            let (phys_len, c) = read_typed_int(&bytes[consumed..])?;
            consumed += c;
            let phys_len = phys_len as u64;

            let offsets = read_offsets(&bytes[consumed..], off_code, phys_len, len)?;
            consumed += phys_len as usize * offset_width_for_code(off_code);

            macro_rules! sparse_arm {
                ($variant:ident, $t:ty) => {{
                    let values = read_dense_body::<$t>(&bytes[consumed..], phys_len)?;
                    consumed += phys_len as usize * <$t as WireScalar>::WIDTH;
                    TypedValue::$variant(ValueVec::Sparse(CompressedVector::from_parts(len, offsets, values)))
                }};
            }

            let value = match val_code {
                TYPE_INT8 => sparse_arm!(Int8, i8),
                TYPE_INT16 => sparse_arm!(Int16, i16),
                TYPE_INT32 => sparse_arm!(Int32, i32),
                TYPE_INT64 => sparse_arm!(Int64, i64),
                TYPE_FLOAT32 => sparse_arm!(Float32, f32),
                TYPE_FLOAT64 => sparse_arm!(Float64, f64),
                TYPE_UTF8 => {
                    let width = 1usize;
                    let total = phys_len as usize * width;
                    let body = bytes.get(consumed..consumed + total).ok_or(TypedValueError::TruncatedRecord)?;
                    consumed += total;
                    TypedValue::Utf8(Utf8Value::Sparse(CompressedVector::from_parts(len, offsets, body.to_vec())))
                }
                other => return Err(TypedValueError::UnknownTypeCode(other)),
            };
            return Ok((value, consumed));
        }

        macro_rules! dense_arm {
            ($variant:ident, $t:ty) => {{
                let values = read_dense_body::<$t>(&bytes[consumed..], len)?;
                consumed += len as usize * <$t as WireScalar>::WIDTH;
                TypedValue::$variant(ValueVec::Dense(values))
            }};
        }

        let value = match type_code {
            TYPE_INT8 => dense_arm!(Int8, i8),
            TYPE_INT16 => dense_arm!(Int16, i16),
            TYPE_INT32 => dense_arm!(Int32, i32),
            TYPE_INT64 => dense_arm!(Int64, i64),
            TYPE_FLOAT32 => dense_arm!(Float32, f32),
            TYPE_FLOAT64 => dense_arm!(Float64, f64),
            TYPE_UTF8 => {
                let total = len as usize;
                let body = bytes.get(consumed..consumed + total).ok_or(TypedValueError::TruncatedRecord)?;
                consumed += total;
                TypedValue::Utf8(Utf8Value::Dense(body.to_vec()))
            }
            other => return Err(TypedValueError::UnknownTypeCode(other)),
        };
        Ok((value, consumed))
    }

    /// Convert to whichever of dense/sparse serializes smaller. The choice
    /// is not part of the wire format: both encodings of the same logical
    /// vector are valid and compare equal under `to_dense()`.
    pub fn minimize(&self) -> TypedValue {
        macro_rules! minimize_numeric {
            ($variant:ident, $v:expr) => {{
                let dense_form = ValueVec::Dense($v.to_dense());
                let sparse_form = ValueVec::Sparse(
                    crate::compressed_vector::CompressedVector::from_dense(&$v.to_dense()),
                );
                if value_vec_wire_len(&sparse_form) < value_vec_wire_len(&dense_form) {
                    TypedValue::$variant(sparse_form)
                } else {
                    TypedValue::$variant(dense_form)
                }
            }};
        }
        match self {
            TypedValue::Int8(v) => minimize_numeric!(Int8, v),
            TypedValue::Int16(v) => minimize_numeric!(Int16, v),
            TypedValue::Int32(v) => minimize_numeric!(Int32, v),
            TypedValue::Int64(v) => minimize_numeric!(Int64, v),
            TypedValue::Float32(v) => minimize_numeric!(Float32, v),
            TypedValue::Float64(v) => minimize_numeric!(Float64, v),
            TypedValue::Utf8(v) => TypedValue::Utf8(Utf8Value::Dense(v.to_dense())),
        }
    }

    /// Reindex a vector-typed value: output position `i` gets the entry
    /// whose source index maps to `i` via `index_map` (entries with
    /// `index_map[source] == SENTINEL` are dropped).
    pub fn subset(&self, index_map: &[u64], new_len: u64) -> TypedValue {
        macro_rules! subset_numeric {
            ($variant:ident, $v:expr) => {{
                match $v {
                    ValueVec::Dense(values) => {
                        let mut out = vec![Default::default(); new_len as usize];
                        for (src, &val) in values.iter().enumerate() {
                            let dst = index_map[src];
                            if dst != SENTINEL {
                                out[dst as usize] = val;
                            }
                        }
                        TypedValue::$variant(ValueVec::Dense(out))
                    }
                    ValueVec::Sparse(cv) => {
                        let mut pairs: Vec<(u64, _)> = cv
                            .offsets()
                            .iter()
                            .zip(cv.values())
                            .filter_map(|(&off, &val)| {
                                let dst = index_map[off as usize];
                                (dst != SENTINEL).then_some((dst, val))
                            })
                            .collect();
                        pairs.sort_by_key(|&(off, _)| off);
                        let (offsets, values) = pairs.into_iter().unzip();
                        TypedValue::$variant(ValueVec::Sparse(
                            crate::compressed_vector::CompressedVector::from_parts(new_len, offsets, values),
                        ))
                    }
                }
            }};
        }
        match self {
            TypedValue::Int8(v) => subset_numeric!(Int8, v),
            TypedValue::Int16(v) => subset_numeric!(Int16, v),
            TypedValue::Int32(v) => subset_numeric!(Int32, v),
            TypedValue::Int64(v) => subset_numeric!(Int64, v),
            TypedValue::Float32(v) => subset_numeric!(Float32, v),
            TypedValue::Float64(v) => subset_numeric!(Float64, v),
            TypedValue::Utf8(v) => {
                let dense = v.to_dense();
                let mut out = vec![0u8; new_len as usize];
                for (src, &val) in dense.iter().enumerate() {
                    let dst = index_map[src];
                    if dst != SENTINEL {
                        out[dst as usize] = val;
                    }
                }
                TypedValue::Utf8(Utf8Value::Dense(out))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trip_dense_int() {
        let v = TypedValue::Int32(ValueVec::Dense(vec![0, 1, -1, 1000]));
        let mut out = Vec::new();
        v.serialize(&mut out);
        let (decoded, consumed) = TypedValue::deserialize(&out).unwrap();
        assert_eq!(consumed, out.len());
        assert_eq!(decoded, v);
    }

    #[test]
    fn round_trip_sparse_dosage() {
        // scenario (c): 10 samples, DS ploidy 1, only samples 7 and 9 non-zero.
        let mut dense = vec![0.0f32; 10];
        dense[7] = 1.5;
        dense[9] = 2.0;
        let cv = CompressedVector::from_dense(&dense);
        assert_eq!(cv.physical_len(), 2);
        let v = TypedValue::Float32(ValueVec::Sparse(cv));
        let mut out = Vec::new();
        v.serialize(&mut out);
        let (decoded, consumed) = TypedValue::deserialize(&out).unwrap();
        assert_eq!(consumed, out.len());
        assert_eq!(decoded, v);
        if let TypedValue::Float32(ValueVec::Sparse(cv)) = &decoded {
            assert_eq!(cv.offsets(), &[7, 9]);
            assert_eq!(cv.values(), &[1.5, 2.0]);
        } else {
            panic!("expected sparse float32");
        }
    }

    #[test]
    fn round_trip_string_and_missing() {
        let v = TypedValue::string("GTCT".as_bytes());
        let mut out = Vec::new();
        v.serialize(&mut out);
        let (decoded, _) = TypedValue::deserialize(&out).unwrap();
        assert_eq!(decoded, v);

        let missing = TypedValue::missing_string();
        assert!(missing.is_missing_string());
        let mut out = Vec::new();
        missing.serialize(&mut out);
        let (decoded, _) = TypedValue::deserialize(&out).unwrap();
        assert!(decoded.is_missing_string());
    }

    #[test]
    fn round_trip_length_above_15_uses_length_scalar() {
        let values: Vec<i8> = (0..40).map(|i| (i % 5) as i8).collect();
        let v = TypedValue::Int8(ValueVec::Dense(values.clone()));
        let mut out = Vec::new();
        v.serialize(&mut out);
        assert_eq!(out[0] >> 4, 15);
        let (decoded, consumed) = TypedValue::deserialize(&out).unwrap();
        assert_eq!(consumed, out.len());
        assert_eq!(decoded, TypedValue::Int8(ValueVec::Dense(values)));
    }

    #[test]
    fn truncated_input_is_truncated_record() {
        let v = TypedValue::Int32(ValueVec::Dense(vec![1, 2, 3]));
        let mut out = Vec::new();
        v.serialize(&mut out);
        out.truncate(out.len() - 1);
        assert!(matches!(TypedValue::deserialize(&out), Err(TypedValueError::TruncatedRecord)));
    }

    #[test]
    fn sparse_offsets_must_be_strictly_increasing() {
        // Hand-craft a sparse payload with a non-increasing offset pair.
        let mut out = Vec::new();
        write_header(TYPE_SPARSE, 10, &mut out); // logical len 10
        out.push((TYPE_INT8 << 4) | TYPE_FLOAT32); // off_type=int8, val_type=float32
        write_typed_int(2, &mut out); // physical count
        out.push(3u8); // offsets[0] = 3
        out.push(3u8); // offsets[1] = 3 (not strictly increasing)
        out.extend_from_slice(&1.0f32.to_le_bytes());
        out.extend_from_slice(&2.0f32.to_le_bytes());
        assert!(matches!(TypedValue::deserialize(&out), Err(TypedValueError::NonMonotonicOffsets)));
    }

    #[test]
    fn minimize_chooses_smaller_encoding() {
        let mut dense = vec![0i32; 1000];
        dense[3] = 7;
        let v = TypedValue::Int32(ValueVec::Dense(dense.clone()));
        let minimized = v.minimize();
        assert!(minimized.is_sparse());
        assert_eq!(minimized.to_dense_i32(), dense);
    }

    #[test]
    fn subset_reindexes_vector() {
        // scenario (f): 5 diploid samples subset to {S1, S3}.
        let gt: Vec<i8> = vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9];
        let v = TypedValue::Int8(ValueVec::Dense(gt));
        let mut index_map = vec![SENTINEL; 10];
        index_map[2] = 0;
        index_map[3] = 1;
        index_map[6] = 2;
        index_map[7] = 3;
        let subset = v.subset(&index_map, 4);
        assert_eq!(subset.to_dense_i8(), vec![2, 3, 6, 7]);
    }

    impl TypedValue {
        fn to_dense_i32(&self) -> Vec<i32> {
            match self {
                TypedValue::Int32(v) => v.to_dense(),
                _ => panic!("not int32"),
            }
        }
        fn to_dense_i8(&self) -> Vec<i8> {
            match self {
                TypedValue::Int8(v) => v.to_dense(),
                _ => panic!("not int8"),
            }
        }
    }
}
