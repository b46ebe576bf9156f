use thiserror::Error;

#[derive(Error, Debug)]
pub enum PbwtError {
    #[error("PBWT field length changed from {prev} to {got} haplotypes without a reset")]
    LengthMismatch { prev: usize, got: usize },
}
