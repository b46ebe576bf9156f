//! Variant record codec, PBWT-aware reader/writer drivers, and S1R-backed
//! random access over the SAV binary format.

mod dictionary;
mod error;
mod frame;
mod header;
mod reader;
mod region;
mod site_info;
mod variant;
mod writer;

pub use dictionary::DictionaryBundle;
pub use error::SavError;
pub use header::{Header, HeaderLine};
pub use reader::{ReadOutcome, Reader};
pub use region::{BoundingPoint, Region};
pub use site_info::SiteInfo;
pub use variant::Variant;
pub use writer::Writer;
