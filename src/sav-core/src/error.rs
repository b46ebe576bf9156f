use thiserror::Error;

use sav_dictionary::DictionaryError;
use typed_value::TypedValueError;

/// The error kinds enumerated in the core's design: every failure a reader
/// or writer can report, wrapping the originating leaf-crate error where
/// one exists.
#[derive(Error, Debug)]
pub enum SavError {
    #[error("record declares a length that exceeds the bytes available")]
    TruncatedRecord,

    #[error("header is malformed: {0}")]
    CorruptHeader(String),

    #[error("typed-value type field outside 1..=8")]
    UnknownTypeCode(#[source] TypedValueError),

    #[error("record references a dictionary code with no resolved entry")]
    UnknownDictionaryKey(#[source] DictionaryError),

    #[error("PBWT-tracked FORMAT field {0:?} changed effective length without a reset")]
    PbwtLengthMismatch(String),

    #[error("conversion would alias a non-missing value to the destination's missing sentinel")]
    NarrowingLoss,

    #[error("record count or file offset exceeds the S1R packing limits")]
    IndexOverflow,

    #[error("requested sample subset intersected no samples")]
    SampleSubsetEmpty,

    #[error("no .s1r or .csi/.tbi sidecar found for indexed access")]
    NoIndex,

    #[error("unknown chromosome {0:?}")]
    UnknownChromosome(String),

    #[error(transparent)]
    CsiIndex(#[from] csi::CsiError),

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl From<TypedValueError> for SavError {
    fn from(e: TypedValueError) -> Self {
        match e {
            TypedValueError::UnknownTypeCode(_) => SavError::UnknownTypeCode(e),
            TypedValueError::NarrowingLoss => SavError::NarrowingLoss,
            _ => SavError::TruncatedRecord,
        }
    }
}

impl From<DictionaryError> for SavError {
    fn from(e: DictionaryError) -> Self {
        SavError::UnknownDictionaryKey(e)
    }
}

impl From<pbwt::PbwtError> for SavError {
    fn from(e: pbwt::PbwtError) -> Self {
        match e {
            pbwt::PbwtError::LengthMismatch { .. } => SavError::PbwtLengthMismatch(e.to_string()),
        }
    }
}

impl From<s1r::S1rError> for SavError {
    fn from(e: s1r::S1rError) -> Self {
        match e {
            s1r::S1rError::Io(io) => SavError::Io(io),
            s1r::S1rError::IndexOverflow(_) => SavError::IndexOverflow,
            other => SavError::CorruptHeader(other.to_string()),
        }
    }
}
