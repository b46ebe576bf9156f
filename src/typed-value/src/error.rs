use thiserror::Error;

#[derive(Error, Debug)]
pub enum TypedValueError {
    #[error("Declared length exceeds the bytes remaining in the input")]
    TruncatedRecord,

    #[error("Type-code byte {0} is outside the valid range 1..=8")]
    UnknownTypeCode(u8),

    #[error("Sparse offsets must be strictly increasing and below the logical length")]
    NonMonotonicOffsets,

    #[error("Narrowing this value into the destination type would alias a non-missing value onto the destination's missing sentinel")]
    NarrowingLoss,

    #[error("stride_reduce factor {k} does not evenly divide logical length {len}")]
    StrideMismatch { k: u64, len: u64 },

    #[error("Subset index map entry {0} is out of bounds for new length {1}")]
    SubsetIndexOutOfBounds(u64, u64),
}
