use thiserror::Error;

#[derive(Error, Debug)]
pub enum S1rError {
    #[error("I/O error while reading or writing an S1R index")]
    Io(#[from] std::io::Error),

    #[error("S1R header is truncated or malformed")]
    TruncatedHeader,

    #[error("S1R header magic does not match \"s1r\\0\\x01\\0\\0\"")]
    BadMagic,

    #[error("chromosome {0:?} has no tree in this index")]
    UnknownChromosome(String),

    #[error("chromosome name {0:?} exceeds 255 bytes")]
    NameTooLong(String),

    #[error("block entry count {0} exceeds the 16-bit record-count field")]
    IndexOverflow(u64),
}
