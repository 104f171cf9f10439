use rust_tokenizers::error::TokenizerError;
use tch::TchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KoreanLmError {
    #[error("IO error: {0}")]
    IOError(String),

    #[error("Tch tensor error: {0}")]
    TchError(String),

    #[error("Tokenizer error: {0}")]
    TokenizerError(String),

    #[error("Invalid configuration error: {0}")]
    InvalidConfigurationError(String),

    #[error("Value error: {0}")]
    ValueError(String),

    #[error("Hidden layer error: {0}")]
    HiddenLayerError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<std::io::Error> for KoreanLmError {
    fn from(error: std::io::Error) -> Self {
        KoreanLmError::IOError(error.to_string())
    }
}

impl From<TokenizerError> for KoreanLmError {
    fn from(error: TokenizerError) -> Self {
        KoreanLmError::TokenizerError(error.to_string())
    }
}

impl From<TchError> for KoreanLmError {
    fn from(error: TchError) -> Self {
        KoreanLmError::TchError(error.to_string())
    }
}

impl From<serde_json::Error> for KoreanLmError {
    fn from(error: serde_json::Error) -> Self {
        KoreanLmError::SerializationError(error.to_string())
    }
}
