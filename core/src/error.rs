use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoanError {
    #[error("{entity} with ID {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Duplicate {field}: {value} is already taken")]
    ConstraintViolation { field: &'static str, value: String },

    #[error("Loan ID space {min}..={max} exhausted after {attempts} attempts")]
    IdSpaceExhausted { min: i64, max: i64, attempts: u64 },

    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LoanError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn customer_not_found(id: i64) -> Self {
        Self::NotFound { entity: "Customer", id }
    }

    pub fn loan_not_found(id: i64) -> Self {
        Self::NotFound { entity: "Loan", id }
    }

    /// True for collaborator I/O failures the engine never retries.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store(_) | Self::StoreUnavailable(_))
    }
}

pub type LoanResult<T> = Result<T, LoanError>;
