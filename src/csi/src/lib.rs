//! Reader for the external CSI/TBI binning index format, plus the bgzf
//! virtual-offset plumbing needed to act on what it returns.

mod bgzf;
mod bin;
mod error;
mod index;

pub use bgzf::{pack_virtual_offset, read_block, read_from_virtual_offset, split_virtual_offset};
pub use bin::{bin_first, bin_limit, bin_parent, reg2bins};
pub use error::CsiError;
pub use index::{Index, MAGIC};
