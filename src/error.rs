use thiserror::Error;

/// Errors raised by the fetch / clean / store stages.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Column not found: {0}")]
    MissingColumn(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EtlError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn fetch(url: &str, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = EtlError> = std::result::Result<T, E>;
