use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("index error: {0}")]
    Index(#[from] w3ml_index::IndexError),

    #[error("store error: {0}")]
    Store(#[from] w3ml_store::StoreError),

    #[error(transparent)]
    Type(#[from] w3ml_types::TypeError),

    /// The external replay parser failed or produced unusable output.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SdkResult<T> = Result<T, SdkError>;
