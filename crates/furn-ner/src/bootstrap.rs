use furn_corpus::{DrainReport, LabelStore, TaggedSequence};

use crate::error::Result;
use crate::tagger::Tagger;

/// Pre-labels the first `limit` rows of the queue (all rows when `None`) with
/// `tagger` and moves them to the labeled file, one sequence per row.
///
/// Words past the tokenizer's length limit get no tag and are not written.
pub fn bootstrap<T>(store: &LabelStore, tagger: &T, limit: Option<usize>) -> Result<DrainReport>
where
    T: Tagger + ?Sized,
{
    store.drain(limit, |rows| {
        rows.iter()
            .map(|row| tagger.tag_words(&row.text()))
            .collect::<Result<Vec<TaggedSequence>>>()
    })
}
