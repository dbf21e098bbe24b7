use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("storage failure: {0}")]
    Storage(String),
}
