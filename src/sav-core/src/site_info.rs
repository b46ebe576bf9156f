//! The chromosome-through-INFO portion of a record ("shared block").

use typed_value::{read_typed_int, write_typed_int, TypedValue, ValueVec};

use crate::error::SavError;

const PBWT_RESET_BIT: u32 = 1 << 23;

fn as_utf8_bytes(value: &TypedValue) -> Result<Vec<u8>, SavError> {
    match value {
        TypedValue::Utf8(v) => Ok(v.to_dense()),
        _ => Err(SavError::TruncatedRecord),
    }
}

fn as_i32_vec(value: &TypedValue) -> Result<Vec<i32>, SavError> {
    match value {
        TypedValue::Int8(v) => Ok(v.to_dense().into_iter().map(i32::from).collect()),
        TypedValue::Int16(v) => Ok(v.to_dense().into_iter().map(i32::from).collect()),
        TypedValue::Int32(v) => Ok(v.to_dense()),
        TypedValue::Int64(v) => Ok(v.to_dense().into_iter().map(|x| x as i32).collect()),
        _ => Err(SavError::TruncatedRecord),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteInfo {
    pub chrom_code: i32,
    /// Zero-based on the wire; callers see one-based through [`SiteInfo::pos_one_based`].
    pub pos_zero_based: u32,
    pub id: Vec<u8>,
    pub reference: Vec<u8>,
    pub alts: Vec<Vec<u8>>,
    pub qual: f32,
    pub filter_codes: Vec<i32>,
    pub info: Vec<(i32, TypedValue)>,
}

impl SiteInfo {
    pub fn pos_one_based(&self) -> u64 {
        u64::from(self.pos_zero_based) + 1
    }

    pub fn record_end(&self) -> u64 {
        crate::region::record_end(self.pos_one_based(), &self.reference, &self.alts)
    }

    pub fn serialize(&self, pbwt_reset: bool, n_fmt: u32, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.chrom_code.to_le_bytes());
        out.extend_from_slice(&self.pos_zero_based.to_le_bytes());
        out.extend_from_slice(&(self.reference.len() as i32).to_le_bytes());
        out.extend_from_slice(&self.qual.to_le_bytes());

        let n_allele = 1 + self.alts.len() as u32;
        let n_info = self.info.len() as u32;
        out.extend_from_slice(&((n_allele << 16) | (n_info & 0xFFFF)).to_le_bytes());

        let reset_bit = if pbwt_reset { PBWT_RESET_BIT } else { 0 };
        out.extend_from_slice(&((n_fmt << 24) | reset_bit).to_le_bytes());

        let wire_id = if self.id.is_empty() { b".".to_vec() } else { self.id.clone() };
        TypedValue::string(wire_id).serialize(out);
        TypedValue::string(self.reference.clone()).serialize(out);
        for alt in &self.alts {
            TypedValue::string(alt.clone()).serialize(out);
        }

        let filters = TypedValue::Int32(ValueVec::Dense(self.filter_codes.clone()));
        filters.serialize(out);

        for &(key, ref value) in &self.info {
            write_typed_int(i64::from(key), out);
            value.serialize(out);
        }
    }

    /// Returns the decoded site info, whether the PBWT-reset bit was set,
    /// the declared FORMAT-pair count (consumed by the individual block),
    /// and the number of bytes read.
    pub fn deserialize(bytes: &[u8]) -> Result<(SiteInfo, bool, u32, usize), SavError> {
        let mut pos = 0usize;
        let take4 = |bytes: &[u8], pos: &mut usize| -> Result<[u8; 4], SavError> {
            let chunk = bytes.get(*pos..*pos + 4).ok_or(SavError::TruncatedRecord)?;
            *pos += 4;
            Ok(chunk.try_into().unwrap())
        };

        let chrom_code = i32::from_le_bytes(take4(bytes, &mut pos)?);
        let pos_zero_based = u32::from_le_bytes(take4(bytes, &mut pos)?);
        let _ref_length = i32::from_le_bytes(take4(bytes, &mut pos)?);
        let qual = f32::from_le_bytes(take4(bytes, &mut pos)?);
        let allele_info_word = u32::from_le_bytes(take4(bytes, &mut pos)?);
        let fmt_sample_word = u32::from_le_bytes(take4(bytes, &mut pos)?);

        let n_allele = allele_info_word >> 16;
        let n_info = allele_info_word & 0xFFFF;
        let n_fmt = fmt_sample_word >> 24;
        let pbwt_reset = (fmt_sample_word & PBWT_RESET_BIT) != 0;

        let (id_value, consumed) = TypedValue::deserialize(&bytes[pos..])?;
        pos += consumed;
        let id = as_utf8_bytes(&id_value)?;
        let id = if id == b"." { Vec::new() } else { id };

        let (ref_value, consumed) = TypedValue::deserialize(&bytes[pos..])?;
        pos += consumed;
        let reference = as_utf8_bytes(&ref_value)?;

        let mut alts = Vec::with_capacity(n_allele.saturating_sub(1) as usize);
        for _ in 0..n_allele.saturating_sub(1) {
            let (alt_value, consumed) = TypedValue::deserialize(&bytes[pos..])?;
            pos += consumed;
            alts.push(as_utf8_bytes(&alt_value)?);
        }

        let (filters_value, consumed) = TypedValue::deserialize(&bytes[pos..])?;
        pos += consumed;
        let filter_codes = as_i32_vec(&filters_value)?;

        let mut info = Vec::with_capacity(n_info as usize);
        for _ in 0..n_info {
            let (key, consumed) = read_typed_int(&bytes[pos..]).map_err(SavError::from)?;
            pos += consumed;
            let (value, consumed) = TypedValue::deserialize(&bytes[pos..])?;
            pos += consumed;
            info.push((key as i32, value));
        }

        let site = SiteInfo { chrom_code, pos_zero_based, id, reference, alts, qual, filter_codes, info };
        Ok((site, pbwt_reset, n_fmt, pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_site() -> SiteInfo {
        SiteInfo {
            chrom_code: 0,
            pos_zero_based: 99,
            id: Vec::new(),
            reference: b"A".to_vec(),
            alts: vec![b"G".to_vec()],
            qual: 30.0,
            filter_codes: vec![0],
            info: Vec::new(),
        }
    }

    #[test]
    fn round_trips_a_biallelic_snp() {
        let site = sample_site();
        let mut buf = Vec::new();
        site.serialize(false, 2, &mut buf);
        let (decoded, reset, n_fmt, consumed) = SiteInfo::deserialize(&buf).unwrap();
        assert_eq!(decoded, site);
        assert!(!reset);
        assert_eq!(n_fmt, 2);
        assert_eq!(consumed, buf.len());
        assert_eq!(decoded.pos_one_based(), 100);
    }

    #[test]
    fn pbwt_reset_bit_round_trips() {
        let site = sample_site();
        let mut buf = Vec::new();
        site.serialize(true, 0, &mut buf);
        let (_, reset, _, _) = SiteInfo::deserialize(&buf).unwrap();
        assert!(reset);
    }

    #[test]
    fn multiallelic_indel_preserves_allele_order() {
        let mut site = sample_site();
        site.reference = b"GTC".to_vec();
        site.alts = vec![b"G".to_vec(), b"GTCT".to_vec()];
        site.filter_codes = vec![1];
        let mut buf = Vec::new();
        site.serialize(false, 0, &mut buf);
        let (decoded, ..) = SiteInfo::deserialize(&buf).unwrap();
        assert_eq!(decoded.alts, site.alts);
    }
}
