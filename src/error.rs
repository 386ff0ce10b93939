//! Crate-wide error type.

use thiserror::Error;

pub type SolverResult<T> = Result<T, SolverError>;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("invalid card '{0}'")]
    InvalidCard(String),

    #[error("invalid hand '{0}' (expected two cards like \"AcKd\")")]
    InvalidHand(String),

    #[error("invalid board '{0}': {1}")]
    InvalidBoard(String, String),

    #[error("range '{0}' produced no valid combinations")]
    EmptyRange(String),

    #[error("cards conflict between hands and board")]
    CardConflict,

    #[error("{0}")]
    Usage(String),

    #[error("hand rank table file '{path}': {reason}")]
    TableFile { path: String, reason: String },

    #[error("hand rank tables failed verification: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
