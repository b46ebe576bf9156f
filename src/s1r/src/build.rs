//! Bottom-up bulk construction of one chromosome's tree: entries are laid
//! into leaf blocks in order, and each full (or final) block's bounding
//! interval is folded into its parent as soon as the block is written.

use crate::entry::{InternalEntry, LeafEntry};
use crate::layout::TreeLayout;

struct LevelState {
    entries: Vec<InternalEntry>,
    node_offset: u64,
    entry_offset: usize,
}

/// Serializes `entries` (already sorted by the chosen tie-break key) into a
/// self-contained byte buffer as if this tree's root were block 0. The
/// caller is responsible for placing this buffer at the tree's real
/// `root_block_offset` when assembling the whole forest.
pub fn build_tree(entries: &[LeafEntry], block_size: u32) -> (TreeLayout, Vec<u8>) {
    let layout = TreeLayout::new(entries.len() as u64, block_size, 0, String::new());
    let mut buf = vec![0u8; (layout.block_count() * u64::from(block_size)) as usize];
    if entries.is_empty() {
        return (layout, buf);
    }

    let entries_per_leaf = layout.entries_per_leaf() as usize;
    let entries_per_internal = layout.entries_per_internal() as usize;
    let internal_level_count = (layout.height() - 1) as usize;

    let mut internal_levels: Vec<LevelState> = (0..internal_level_count)
        .map(|_| LevelState { entries: vec![InternalEntry::default(); entries_per_internal], node_offset: 0, entry_offset: 0 })
        .collect();

    let mut leaf_buf = vec![LeafEntry::default(); entries_per_leaf];
    let mut leaf_node_offset = 0u64;
    let mut leaf_entry_offset = 0usize;
    let leaf_level = layout.leaf_level();

    for (i, &e) in entries.iter().enumerate() {
        let last_entry = i + 1 == entries.len();
        leaf_buf[leaf_entry_offset] = e;

        if leaf_entry_offset + 1 == leaf_buf.len() || last_entry {
            write_leaf_block(&mut buf, &layout, leaf_node_offset, &leaf_buf[..=leaf_entry_offset]);

            let (mut range_min, mut range_max) = bounding_range(leaf_buf[..=leaf_entry_offset].iter().map(|e| (e.region_start, e.region_end())));

            for level_idx in (0..internal_levels.len()).rev() {
                let level = internal_level_count - 1 - level_idx;
                let lvl = &mut internal_levels[level_idx];
                lvl.entries[lvl.entry_offset] = InternalEntry::new(range_min, range_max);

                if lvl.entry_offset + 1 == lvl.entries.len() || last_entry {
                    write_internal_block(&mut buf, &layout, level as u64, lvl.node_offset, &lvl.entries[..=lvl.entry_offset]);

                    let (r_min, r_max) =
                        bounding_range(lvl.entries[..=lvl.entry_offset].iter().map(|e| (e.region_start, e.region_end())));
                    lvl.entries = vec![InternalEntry::default(); entries_per_internal];
                    lvl.node_offset += 1;
                    lvl.entry_offset = 0;
                    range_min = r_min;
                    range_max = r_max;
                } else {
                    lvl.entry_offset += 1;
                    break;
                }
            }

            leaf_buf = vec![LeafEntry::default(); entries_per_leaf];
            leaf_node_offset += 1;
            leaf_entry_offset = 0;
        } else {
            leaf_entry_offset += 1;
        }
    }

    let _ = leaf_level;
    (layout, buf)
}

fn bounding_range(items: impl Iterator<Item = (u64, u64)>) -> (u64, u64) {
    let mut min = u64::MAX;
    let mut max = 0u64;
    for (start, end) in items {
        min = min.min(start);
        max = max.max(end);
    }
    (min, max)
}

fn write_leaf_block(buf: &mut [u8], layout: &TreeLayout, node_offset: u64, entries: &[LeafEntry]) {
    let offset = layout.file_byte_offset(layout.leaf_level(), node_offset) as usize;
    for (i, e) in entries.iter().enumerate() {
        let pos = offset + i * LeafEntry::WIRE_SIZE;
        e.write_be(&mut buf[pos..pos + LeafEntry::WIRE_SIZE]);
    }
}

fn write_internal_block(buf: &mut [u8], layout: &TreeLayout, level: u64, node_offset: u64, entries: &[InternalEntry]) {
    let offset = layout.file_byte_offset(level, node_offset) as usize;
    for (i, e) in entries.iter().enumerate() {
        let pos = offset + i * InternalEntry::WIRE_SIZE;
        e.write_be(&mut buf[pos..pos + InternalEntry::WIRE_SIZE]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::query_tree;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_leaf_tree_round_trips_through_query() {
        let entries = vec![LeafEntry::new(10, 20, 1), LeafEntry::new(30, 40, 2), LeafEntry::new(50, 60, 3)];
        let (layout, buf) = build_tree(&entries, 4096);
        let hits: Vec<_> = query_tree(&buf, &layout, 25, 45).collect();
        assert_eq!(hits, vec![LeafEntry::new(30, 40, 2)]);
    }

    #[test]
    fn multi_level_tree_finds_entries_across_leaf_nodes() {
        // entries_per_leaf = 170 at block_size 4096; build enough entries to
        // span three leaf nodes and exercise the internal level.
        let entries: Vec<LeafEntry> =
            (0..500u64).map(|i| LeafEntry::new(i * 10, i * 10 + 5, i)).collect();
        let (layout, buf) = build_tree(&entries, 4096);
        assert!(layout.height() >= 2);

        let hits: Vec<_> = query_tree(&buf, &layout, 4995, 5005).collect();
        assert_eq!(hits, vec![LeafEntry::new(4990, 4995, 499)]);
    }
}
