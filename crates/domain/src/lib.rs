pub mod clock;
pub mod content;
pub mod error;
pub mod likes;
pub mod metrics;
pub mod ports;
pub mod reconciliation;
pub mod relations;
pub mod util;
pub mod views;

pub type DomainResult<T> = Result<T, error::DomainError>;
