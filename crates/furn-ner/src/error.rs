use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// A checkpoint directory, or one of its files, that cannot be used.
#[derive(Debug, thiserror::Error)]
#[error("model unavailable at {}: {reason}", path.display())]
pub struct ModelUnavailableError {
    pub path: PathBuf,
    pub reason: String,
}

impl ModelUnavailableError {
    pub(crate) fn new(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    ModelUnavailable(#[from] ModelUnavailableError),

    #[error(transparent)]
    Corpus(#[from] furn_corpus::Error),

    #[error("tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("none of the tags {0:?} is in the label set")]
    UnknownTag(Vec<String>),

    #[error("label id {0} is outside the label set")]
    UnknownLabelId(i64),

    #[error("label set mismatch: {0}")]
    LabelSetMismatch(String),

    #[error("no labeled sequences to train on in {}", .0.display())]
    EmptyCorpus(PathBuf),
}

impl Error {
    pub(crate) fn tokenizer(e: tokenizers::Error) -> Self {
        Self::Tokenizer(e.to_string())
    }
}
