//! The whole-file S1R layout: a header naming each chromosome's tree, the
//! trees themselves, and a trailing empty sentinel tree that lets readers
//! detect end-of-forest without a separate end-of-file marker.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use uuid::Uuid;

use crate::entry::LeafEntry;
use crate::error::S1rError;
use crate::layout::{SortTieBreak, TreeLayout};
use crate::query::query_tree;

pub const MAGIC: [u8; 7] = *b"s1r\0\x01\0\0";

enum Backing {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl AsRef<[u8]> for Backing {
    fn as_ref(&self) -> &[u8] {
        match self {
            Backing::Mmap(m) => &m[..],
            Backing::Owned(v) => &v[..],
        }
    }
}

/// A parsed, queryable S1R index. Holds its bytes either memory-mapped from
/// disk or as an owned in-memory buffer, and one [`TreeLayout`] per named
/// chromosome plus the trailing sentinel.
pub struct Forest {
    backing: Backing,
    pub uuid: Uuid,
    pub sort_tie_break: SortTieBreak,
    pub block_size: u32,
    trees: Vec<TreeLayout>,
    header_blocks: u64,
}

impl Forest {
    pub fn open_mmap(path: impl AsRef<Path>) -> Result<Self, S1rError> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Self::parse(Backing::Mmap(mmap))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, S1rError> {
        Self::parse(Backing::Owned(bytes))
    }

    fn parse(backing: Backing) -> Result<Self, S1rError> {
        let bytes = backing.as_ref();
        if bytes.len() < 7 + 16 + 2 {
            return Err(S1rError::TruncatedHeader);
        }
        if bytes[0..7] != MAGIC {
            return Err(S1rError::BadMagic);
        }
        let uuid = Uuid::from_slice(&bytes[7..23]).map_err(|_| S1rError::TruncatedHeader)?;
        let sort_tie_break = SortTieBreak::from_byte(bytes[23]);
        let block_size = (u32::from(bytes[24]) + 1) * 1024;

        let mut pos = 25usize;
        let mut chrom_headers: Vec<(String, u64)> = Vec::new();
        loop {
            let name_len = *bytes.get(pos).ok_or(S1rError::TruncatedHeader)? as usize;
            pos += 1;
            if name_len == 0 {
                break;
            }
            let name_bytes = bytes.get(pos..pos + name_len).ok_or(S1rError::TruncatedHeader)?;
            let name = String::from_utf8_lossy(name_bytes).into_owned();
            pos += name_len;
            let count_bytes = bytes.get(pos..pos + 8).ok_or(S1rError::TruncatedHeader)?;
            let entry_count = u64::from_be_bytes(count_bytes.try_into().unwrap());
            pos += 8;
            chrom_headers.push((name, entry_count));
        }

        let header_blocks = crate::layout::ceil_div(pos as u64, u64::from(block_size));

        let mut trees = Vec::with_capacity(chrom_headers.len() + 1);
        let mut next_block = header_blocks;
        for (name, entry_count) in chrom_headers {
            let layout = TreeLayout::new(entry_count, block_size, next_block, name);
            next_block += layout.block_count();
            trees.push(layout);
        }
        // Sentinel "end of forest" tree: always empty, so it occupies zero
        // blocks and its end position equals its start position.
        trees.push(TreeLayout::new(0, block_size, next_block, String::new()));

        Ok(Self { backing, uuid, sort_tie_break, block_size, trees, header_blocks })
    }

    pub fn header_blocks(&self) -> u64 {
        self.header_blocks
    }

    pub fn chromosomes(&self) -> impl Iterator<Item = &str> {
        self.trees.iter().filter(|t| !t.name.is_empty()).map(|t| t.name.as_str())
    }

    fn tree(&self, chrom: &str) -> Result<&TreeLayout, S1rError> {
        self.trees.iter().find(|t| t.name == chrom).ok_or_else(|| S1rError::UnknownChromosome(chrom.to_string()))
    }

    /// Entries on `chrom` whose interval intersects `[begin, end]`.
    pub fn query<'a>(&'a self, chrom: &str, begin: u64, end: u64) -> Result<impl Iterator<Item = LeafEntry> + 'a, S1rError> {
        let layout = self.tree(chrom)?;
        Ok(query_tree(self.backing.as_ref(), layout, begin, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::build_tree;
    use pretty_assertions::assert_eq;

    fn sample_forest_bytes() -> Vec<u8> {
        let block_size = 4096u32;
        let chr1_entries = vec![LeafEntry::new(100, 200, 1), LeafEntry::new(300, 400, 2)];
        let chr2_entries = vec![LeafEntry::new(50, 60, 3)];

        let (chr1_layout, chr1_blocks) = build_tree(&chr1_entries, block_size);
        let (chr2_layout, chr2_blocks) = build_tree(&chr2_entries, block_size);

        let mut header = Vec::new();
        header.extend_from_slice(&MAGIC);
        header.extend_from_slice(Uuid::nil().as_bytes());
        header.push(SortTieBreak::Midpoint.to_byte());
        header.push((block_size / 1024 - 1) as u8);
        for (name, layout) in [("chr1", &chr1_layout), ("chr2", &chr2_layout)] {
            header.push(name.len() as u8);
            header.extend_from_slice(name.as_bytes());
            header.extend_from_slice(&layout.entry_count().to_be_bytes());
        }
        header.push(0);
        header.resize(crate::layout::ceil_div(header.len() as u64, u64::from(block_size)) as usize * block_size as usize, 0);

        header.extend_from_slice(&chr1_blocks);
        header.extend_from_slice(&chr2_blocks);
        header
    }

    #[test]
    fn parses_header_and_queries_both_chromosomes() {
        let forest = Forest::from_bytes(sample_forest_bytes()).unwrap();
        assert_eq!(forest.chromosomes().collect::<Vec<_>>(), vec!["chr1", "chr2"]);

        let hits: Vec<_> = forest.query("chr1", 150, 350).unwrap().collect();
        assert_eq!(hits, vec![LeafEntry::new(100, 200, 1), LeafEntry::new(300, 400, 2)]);

        let hits: Vec<_> = forest.query("chr2", 0, 1000).unwrap().collect();
        assert_eq!(hits, vec![LeafEntry::new(50, 60, 3)]);
    }

    #[test]
    fn unknown_chromosome_is_an_error() {
        let forest = Forest::from_bytes(sample_forest_bytes()).unwrap();
        assert!(matches!(forest.query("chrX", 0, 10), Err(S1rError::UnknownChromosome(_))));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = sample_forest_bytes();
        bytes[0] = b'x';
        assert!(matches!(Forest::from_bytes(bytes), Err(S1rError::BadMagic)));
    }
}
