use thiserror::Error;

#[derive(Error, Debug)]
pub enum VrtsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path error: {0}")]
    Path(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("{0} CLI not found")]
    CliNotFound(String),

    #[error("Comparison error: {0}")]
    Comparison(String),
}

pub type Result<T> = std::result::Result<T, VrtsError>;
