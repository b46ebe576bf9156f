use thiserror::Error;

#[derive(Error, Debug)]
pub enum VarintError {
    #[error("Varint input ended before a terminating byte was read")]
    UnexpectedEof,

    #[error("Varint value does not fit within 64 bits")]
    Overflow,
}
