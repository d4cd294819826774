use furn_corpus::{LabelSet, TaggedSequence};

use crate::error::Result;
use crate::words::reconstruct_words;

/// Label id of positions that carry no prediction (special tokens, padding).
pub const IGNORE_INDEX: i64 = -100;

/// Arg-max label of one sub-word piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub token: String,
    pub label_id: i64,
}

impl Prediction {
    pub fn new(token: impl Into<String>, label_id: i64) -> Self {
        Self {
            token: token.into(),
            label_id,
        }
    }

    pub fn is_ignored(&self) -> bool {
        self.label_id == IGNORE_INDEX
    }
}

/// Anything that labels the sub-word pieces of a text span.
pub trait Tagger {
    /// One prediction per sub-word piece, in order. Special positions carry
    /// [`IGNORE_INDEX`].
    fn predict(&self, text: &str) -> Result<Vec<Prediction>>;

    /// Tags designated by the predicted label ids.
    fn labels(&self) -> &LabelSet;

    /// Marker of a piece that continues the previous word.
    fn continuation_prefix(&self) -> &str {
        "##"
    }

    /// Whole words of `text` with the tag of their first piece.
    fn tag_words(&self, text: &str) -> Result<TaggedSequence> {
        let predictions = self.predict(text)?;
        reconstruct_words(&predictions, self.labels(), self.continuation_prefix())
    }
}

impl<T: Tagger + ?Sized> Tagger for &T {
    fn predict(&self, text: &str) -> Result<Vec<Prediction>> {
        (**self).predict(text)
    }

    fn labels(&self) -> &LabelSet {
        (**self).labels()
    }

    fn continuation_prefix(&self) -> &str {
        (**self).continuation_prefix()
    }
}
