/// Domain-specific error types for the valuation streamer.
/// All external failures must be handled. The refresh loop must:
/// - Continue running on recoverable errors (fetch gaps, bad rows)
/// - Exit non-zero only on unrecoverable startup conditions
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("quote provider error: {0}")]
    Quote(String),

    #[error("positions file error: {0}")]
    Positions(String),

    #[error("invalid pricing input: {0}")]
    Pricing(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("config error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Parse(e.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(e: csv::Error) -> Self {
        AppError::Positions(e.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Network(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
