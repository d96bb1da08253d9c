use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComboError {
    #[error("I/O error: {0}")]
    Io(Box<std::io::Error>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Table already exists: {0}")]
    DuplicateTable(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Requested version {requested} is lower than the stored version {current}")]
    VersionError { requested: u32, current: u32 },

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Player error: {0}")]
    Player(String),

    #[error("ComboError: {0}")]
    Custom(String),
}

impl From<std::io::Error> for ComboError {
    fn from(error: std::io::Error) -> Self {
        ComboError::Io(Box::new(error))
    }
}
