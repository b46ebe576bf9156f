use thiserror::Error;

#[derive(Error, Debug)]
pub enum CsiError {
    #[error("I/O error while reading a CSI index or bgzf stream")]
    Io(#[from] std::io::Error),

    #[error("CSI index is truncated or malformed")]
    Truncated,

    #[error("CSI magic does not match \"CSI\\x01\"")]
    BadMagic,

    #[error("contig {0:?} is not present in this index")]
    UnknownContig(String),

    #[error("bgzf block at offset {0} has a malformed header")]
    BadBgzfBlock(u64),
}
