use planbot_core::LedgerError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Ledger(e) => e.error_kind(),
            Self::Unavailable(_) => "storage_unavailable",
            Self::Serialization(_) => "serialization",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Ledger(LedgerError::NotFound(_)))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
