use thiserror::Error;

#[derive(Error, Debug)]
pub enum PnlError {
    #[error("Classifier not configured: {0}")]
    ClassifierNotConfigured(String),

    #[error("Invalid lexicon: {0}")]
    InvalidLexicon(String),

    #[error("Empty ledger: no valid account rows survived ingestion")]
    EmptyLedger,

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PnlError>;
