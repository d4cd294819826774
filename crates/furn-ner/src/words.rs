use furn_corpus::{LabelSet, TaggedSequence};

use crate::error::{Error, Result};
use crate::tagger::Prediction;

/// Glues sub-word pieces back into words.
///
/// Ignored positions are dropped. A piece starting with `prefix` is appended
/// to the current word and its own label is discarded; any other piece starts
/// a new word tagged with that piece's label. A leading continuation piece
/// with no word before it starts a word of its own.
pub fn reconstruct_words(
    predictions: &[Prediction],
    labels: &LabelSet,
    prefix: &str,
) -> Result<TaggedSequence> {
    let mut words: Vec<(String, &str)> = vec![];

    for p in predictions.iter().filter(|p| !p.is_ignored()) {
        let tag = usize::try_from(p.label_id)
            .ok()
            .and_then(|id| labels.tag(id))
            .ok_or(Error::UnknownLabelId(p.label_id))?;

        let rest = if prefix.is_empty() {
            None
        } else {
            p.token.strip_prefix(prefix)
        };
        match rest {
            Some(rest) => match words.last_mut() {
                Some((word, _)) => word.push_str(rest),
                None => words.push((rest.to_string(), tag)),
            },
            None => words.push((p.token.clone(), tag)),
        }
    }

    Ok(words.into_iter().collect())
}
