use errors::{PersistenceError, ToolError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Invalid rating {0}: must be a number within [0, 1]")]
    InvalidRating(f64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Ledger document is corrupt: {0}")]
    Corrupt(String),

    /// The in-memory mutation was applied but did not reach durable storage.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The event was counted and written to the ledger; only its mirror in
    /// semantic memory is missing. Recording it again counts it twice.
    #[error("Feedback for {key} was recorded but not indexed: {source}")]
    NotIndexed {
        key: String,
        #[source]
        source: PersistenceError
    }
}

impl LedgerError {
    /// Whether the ledger already holds the event despite the error.
    pub fn is_recorded(&self) -> bool {
        matches!(self, LedgerError::Persistence(_) | LedgerError::NotIndexed { .. })
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<LedgerError> for ToolError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidRating(rating) => {
                ToolError::invalid_input("user_rating", format!("{rating} is outside [0, 1]"))
            }
            LedgerError::InvalidInput(reason) => ToolError::invalid_input("feedback", reason),
            LedgerError::Corrupt(reason) => {
                ToolError::Persistence(PersistenceError::new("feedback ledger", reason))
            }
            LedgerError::Persistence(err) => ToolError::Persistence(err),
            LedgerError::NotIndexed { key, source } => ToolError::Persistence(PersistenceError::new(
                source.target,
                format!("feedback for {key} recorded but not indexed: {}", source.reason)
            ))
        }
    }
}
