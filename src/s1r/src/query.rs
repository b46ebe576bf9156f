//! Iterative depth-first traversal of a single tree's blocks, pruning any
//! subtree whose bounding interval misses the query region.

use crate::entry::{InternalEntry, LeafEntry};
use crate::layout::TreeLayout;

/// Walks `buf` (a byte slice holding this tree's blocks, indexed relative to
/// the layout's own `root_block_offset`) and yields every leaf entry whose
/// interval intersects `[begin, end]`.
pub fn query_tree<'a>(buf: &'a [u8], layout: &'a TreeLayout, begin: u64, end: u64) -> impl Iterator<Item = LeafEntry> + 'a {
    let mut stack: Vec<(u64, u64)> = Vec::new();
    if !layout.is_empty() {
        stack.push((0, 0));
    }
    let mut pending: Vec<LeafEntry> = Vec::new();

    std::iter::from_fn(move || {
        loop {
            if let Some(e) = pending.pop() {
                return Some(e);
            }
            let (level, node_offset) = stack.pop()?;
            let node_size = layout.node_size(level, node_offset) as usize;
            if node_size == 0 {
                continue;
            }
            let offset = layout.file_byte_offset(level, node_offset) as usize;

            if level + 1 == layout.height() {
                for i in (0..node_size).rev() {
                    let pos = offset + i * LeafEntry::WIRE_SIZE;
                    let e = LeafEntry::read_be(&buf[pos..pos + LeafEntry::WIRE_SIZE]);
                    if e.intersects(begin, end) {
                        pending.push(e);
                    }
                }
            } else {
                for i in (0..node_size).rev() {
                    let pos = offset + i * InternalEntry::WIRE_SIZE;
                    let e = InternalEntry::read_be(&buf[pos..pos + InternalEntry::WIRE_SIZE]);
                    if e.intersects(begin, end) {
                        let (child_level, child_offset) = layout.child_position(level, node_offset, i as u64);
                        stack.push((child_level, child_offset));
                    }
                }
            }
        }
    })
}
