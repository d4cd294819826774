use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// A non-blank line of a labeled file that is not exactly `word tag`.
#[derive(Debug, thiserror::Error)]
#[error("{}:{line}: expected `word tag`, got {content:?}", path.display())]
pub struct CorpusFormatError {
    pub path: PathBuf,
    pub line: usize,
    pub content: String,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    CorpusFormat(#[from] CorpusFormatError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error on {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error on {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("a drain of the queue is unfinished, see {}", journal.display())]
    PendingDrain { journal: PathBuf },

    #[error("queue changed since the drain recorded in {}, resolve it by hand", journal.display())]
    UnresolvedDrain { journal: PathBuf },

    #[error("label set mismatch: expected {expected:?}, found {found:?}")]
    LabelSetMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}
