pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(String),
    
    #[error("Catalog header is missing required column `{0}`")]
    MissingColumn(&'static str),
    
    #[error("Invalid client command: {0}")]
    InvalidCommand(String),
    
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
