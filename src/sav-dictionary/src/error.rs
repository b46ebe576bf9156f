use thiserror::Error;

#[derive(Error, Debug)]
pub enum DictionaryError {
    #[error("Dictionary code {0} does not resolve to an entry")]
    UnresolvedCode(u32),

    #[error("Name {0:?} is already registered under code {1}")]
    DuplicateName(String, u32),

    #[error("Explicit IDX={0} collides with an already-registered entry")]
    IndexCollision(u32),
}
