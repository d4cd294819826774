use crate::error::{Error, Result};
use crate::tagger::Tagger;

/// Words of `text` tagged with any of `product_tags`, joined by spaces.
///
/// Tags are resolved against the tagger's label set on every call; it is an
/// error when none of them is known.
pub fn product_names<T>(tagger: &T, text: &str, product_tags: &[String]) -> Result<String>
where
    T: Tagger + ?Sized,
{
    let wanted = product_tags
        .iter()
        .filter(|tag| tagger.labels().index_of(tag).is_some())
        .collect::<Vec<_>>();
    if wanted.is_empty() {
        return Err(Error::UnknownTag(product_tags.to_vec()));
    }

    let words = tagger.tag_words(text)?;
    Ok(words
        .iter()
        .filter(|(_, tag)| wanted.iter().any(|w| w == tag))
        .map(|(word, _)| word)
        .collect::<Vec<_>>()
        .join(" "))
}
