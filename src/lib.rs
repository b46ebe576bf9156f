//! Public facade over the SAV variant codec: re-exports the reader/writer
//! driver types from `sav-core` as the crate's stable surface.

pub use sav_core::{BoundingPoint, Header, HeaderLine, ReadOutcome, Reader, Region, SavError, SiteInfo, Variant, Writer};
