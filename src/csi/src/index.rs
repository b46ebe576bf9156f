//! Parses a CSI (or TBI-derived) binning index and resolves region queries
//! into merged lists of bgzf virtual-offset chunks.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use ahash::AHashMap;

use crate::bin::{bin_first, bin_limit, bin_parent, reg2bins};
use crate::error::CsiError;

pub const MAGIC: [u8; 4] = *b"CSI\x01";

#[derive(Debug, Clone, Default)]
struct Bin {
    loff: u64,
    chunks: Vec<(u64, u64)>,
}

/// A parsed CSI index: per-contig hash of bin id to the chunks it covers.
pub struct Index {
    min_shift: i32,
    depth: i32,
    aux_contigs: Vec<String>,
    indices: Vec<AHashMap<u32, Bin>>,
}

impl Index {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CsiError> {
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;
        Self::parse(&bytes)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, CsiError> {
        let mut pos = 0usize;
        let take = |pos: &mut usize, n: usize| -> Result<&[u8], CsiError> {
            let slice = bytes.get(*pos..*pos + n).ok_or(CsiError::Truncated)?;
            *pos += n;
            Ok(slice)
        };

        let magic = take(&mut pos, 4)?;
        if magic != MAGIC {
            return Err(CsiError::BadMagic);
        }
        let min_shift = i32::from_le_bytes(take(&mut pos, 4)?.try_into().unwrap());
        let depth = i32::from_le_bytes(take(&mut pos, 4)?.try_into().unwrap());

        let aux_len = u32::from_le_bytes(take(&mut pos, 4)?.try_into().unwrap()) as usize;
        let aux = take(&mut pos, aux_len)?;

        let mut aux_contigs = Vec::new();
        let mut off = 28usize.min(aux.len());
        while off < aux.len() {
            let nul = aux[off..].iter().position(|&b| b == 0).map(|i| off + i).unwrap_or(aux.len());
            aux_contigs.push(String::from_utf8_lossy(&aux[off..nul]).into_owned());
            off = nul + 1;
        }

        let n_indices = u32::from_le_bytes(take(&mut pos, 4)?.try_into().unwrap()) as usize;
        let mut indices = Vec::with_capacity(n_indices);
        for _ in 0..n_indices {
            let n_bins = u32::from_le_bytes(take(&mut pos, 4)?.try_into().unwrap()) as usize;
            let mut bins = AHashMap::with_capacity(n_bins);
            for _ in 0..n_bins {
                let bin_id = u32::from_le_bytes(take(&mut pos, 4)?.try_into().unwrap());
                let loff = u64::from_le_bytes(take(&mut pos, 8)?.try_into().unwrap());
                let n_chunks = u32::from_le_bytes(take(&mut pos, 4)?.try_into().unwrap()) as usize;
                let mut chunks = Vec::with_capacity(n_chunks);
                for _ in 0..n_chunks {
                    let begin = u64::from_le_bytes(take(&mut pos, 8)?.try_into().unwrap());
                    let end = u64::from_le_bytes(take(&mut pos, 8)?.try_into().unwrap());
                    chunks.push((begin, end));
                }
                bins.insert(bin_id, Bin { loff, chunks });
            }
            indices.push(bins);
        }

        Ok(Self { min_shift, depth, aux_contigs, indices })
    }

    fn contig_id(&self, contig: &str, external: Option<&AHashMap<String, u32>>) -> Option<usize> {
        if !self.aux_contigs.is_empty() {
            return self.aux_contigs.iter().position(|c| c == contig);
        }
        external.and_then(|map| map.get(contig)).map(|&id| id as usize)
    }

    /// Bgzf virtual-offset chunks that may hold records overlapping
    /// `[beg, end)` on `contig`, merged and de-duplicated the way htslib's
    /// `hts_itr_query` does.
    pub fn query_intervals(&self, contig: &str, external: Option<&AHashMap<String, u32>>, beg: i64, end: i64) -> Result<Vec<(u64, u64)>, CsiError> {
        let contig_id = self.contig_id(contig, external).ok_or_else(|| CsiError::UnknownContig(contig.to_string()))?;
        let bidx = match self.indices.get(contig_id) {
            Some(b) => b,
            None => return Ok(Vec::new()),
        };
        let bin_ids = reg2bins(self.min_shift, self.depth, beg, end);
        if bin_ids.is_empty() {
            return Ok(Vec::new());
        }

        let min_off = self.compute_min_off(bidx, beg);
        let max_off = self.compute_max_off(bidx, end);

        let mut ret: Vec<(u64, u64)> = Vec::new();
        for bin_id in &bin_ids {
            if let Some(bin) = bidx.get(&(*bin_id as u32)) {
                for &(cbeg, cend) in &bin.chunks {
                    if cend > min_off && cbeg < max_off {
                        ret.push((min_off.max(cbeg), max_off.min(cend)));
                    }
                }
            }
        }
        if ret.is_empty() {
            return Ok(ret);
        }

        ret.sort_by_key(|c| c.0);
        let mut merged: Vec<(u64, u64)> = Vec::with_capacity(ret.len());
        for chunk in ret {
            merged.push(chunk);
            while merged.len() >= 2 {
                let n = merged.len();
                if merged[n - 2].1 < merged[n - 1].1 {
                    break;
                }
                merged.pop();
            }
        }
        for i in 1..merged.len() {
            if merged[i - 1].1 >= merged[i].0 {
                merged[i - 1].1 = merged[i].0;
            }
        }
        let mut out: Vec<(u64, u64)> = Vec::with_capacity(merged.len());
        for chunk in merged {
            if let Some(last) = out.last_mut() {
                if (last.1 >> 16) == (chunk.0 >> 16) {
                    last.1 = chunk.1;
                    continue;
                }
            }
            out.push(chunk);
        }
        Ok(out)
    }

    fn compute_min_off(&self, bidx: &AHashMap<u32, Bin>, beg: i64) -> u64 {
        let mut bin = bin_first(self.depth) + (beg >> self.min_shift);
        loop {
            if let Some(b) = bidx.get(&(bin as u32)) {
                return b.loff;
            }
            if bin == 0 {
                return 0;
            }
            let first = (bin_parent(bin) << 3) + 1;
            bin = if bin > first { bin - 1 } else { bin_parent(bin) };
        }
    }

    fn compute_max_off(&self, bidx: &AHashMap<u32, Bin>, end: i64) -> u64 {
        let mut bin = bin_first(self.depth) + ((end - 1) >> self.min_shift) + 1;
        if bin >= bin_limit(self.depth) {
            bin = 0;
        }
        loop {
            while bin % 8 == 1 {
                bin = bin_parent(bin);
            }
            if bin == 0 {
                return u64::MAX;
            }
            if let Some(b) = bidx.get(&(bin as u32)) {
                if let Some(first_chunk) = b.chunks.first() {
                    return first_chunk.0;
                }
            }
            bin += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn build_minimal_index() -> Vec<u8> {
        let min_shift = 14i32;
        let depth = 5i32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&min_shift.to_le_bytes());
        bytes.extend_from_slice(&depth.to_le_bytes());

        let mut aux = vec![0u8; 28];
        aux.extend_from_slice(b"chr1\0");
        bytes.extend_from_slice(&(aux.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&aux);

        bytes.extend_from_slice(&1u32.to_le_bytes()); // n_indices
        bytes.extend_from_slice(&1u32.to_le_bytes()); // n_bins for contig 0
        let bin_id = (bin_first(depth)) as u32; // leftmost leaf bin covers pos 0
        bytes.extend_from_slice(&bin_id.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes()); // loff
        bytes.extend_from_slice(&1u32.to_le_bytes()); // n_chunks
        bytes.extend_from_slice(&0u64.to_le_bytes()); // chunk begin
        bytes.extend_from_slice(&1000u64.to_le_bytes()); // chunk end
        bytes
    }

    #[test]
    fn parses_header_and_contig_table() {
        let index = Index::parse(&build_minimal_index()).unwrap();
        assert_eq!(index.aux_contigs, vec!["chr1".to_string()]);
        assert_eq!(index.min_shift, 14);
        assert_eq!(index.depth, 5);
    }

    #[test]
    fn query_returns_the_covering_chunk() {
        let index = Index::parse(&build_minimal_index()).unwrap();
        let chunks = index.query_intervals("chr1", None, 0, 100).unwrap();
        assert_eq!(chunks, vec![(0u64, 1000u64)]);
    }

    #[test]
    fn unknown_contig_is_an_error() {
        let index = Index::parse(&build_minimal_index()).unwrap();
        assert!(matches!(index.query_intervals("chr2", None, 0, 1), Err(CsiError::UnknownContig(_))));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = build_minimal_index();
        bytes[0] = b'X';
        assert!(matches!(Index::parse(&bytes), Err(CsiError::BadMagic)));
    }
}
