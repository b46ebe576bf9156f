//! Block-structured interval-tree forest: one bulk-built tree per
//! chromosome, queried by bounded region, with a trailing empty sentinel
//! tree marking the end of the forest.

mod build;
mod entry;
mod error;
mod forest;
mod layout;
mod query;

pub use build::build_tree;
pub use entry::{InternalEntry, LeafEntry};
pub use error::S1rError;
pub use forest::{Forest, MAGIC};
pub use layout::{SortTieBreak, TreeLayout};
