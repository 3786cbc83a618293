use thiserror::Error;

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Solve error: {0}")]
    Solve(String),

    #[error("Communication error: {0}")]
    Comm(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RankingError>;
