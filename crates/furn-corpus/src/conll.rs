use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{CorpusFormatError, Error, Result};

/// One labeled example: words aligned with their tags.
///
/// Both vectors always have the same length, construction goes through
/// [`TaggedSequence::new`] or [`FromIterator`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaggedSequence {
    tokens: Vec<String>,
    tags: Vec<String>,
}

impl TaggedSequence {
    /// Returns `None` when `tokens` and `tags` differ in length.
    pub fn new(tokens: Vec<String>, tags: Vec<String>) -> Option<Self> {
        (tokens.len() == tags.len()).then_some(Self { tokens, tags })
    }

    pub fn push(&mut self, token: impl Into<String>, tag: impl Into<String>) {
        self.tokens.push(token.into());
        self.tags.push(tag.into());
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tokens
            .iter()
            .zip(self.tags.iter())
            .map(|(w, t)| (w.as_str(), t.as_str()))
    }
}

impl<W, T> FromIterator<(W, T)> for TaggedSequence
where
    W: Into<String>,
    T: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (W, T)>>(iter: I) -> Self {
        let mut seq = Self::default();
        for (w, t) in iter {
            seq.push(w, t);
        }
        seq
    }
}

/// Loads every sequence of a CoNLL file.
pub fn load_sequences<P: AsRef<Path>>(path: P) -> Result<Vec<TaggedSequence>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    parse_sequences(BufReader::new(file), path)
}

/// Parses `word tag` lines separated by blank lines.
///
/// A trailing sequence without a closing blank line is kept. `origin` is only
/// used to report errors.
pub fn parse_sequences<R: BufRead>(reader: R, origin: &Path) -> Result<Vec<TaggedSequence>> {
    let mut sequences = vec![];
    let mut current = TaggedSequence::default();

    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| Error::io(origin, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !current.is_empty() {
                sequences.push(std::mem::take(&mut current));
            }
            continue;
        }

        let mut fields = trimmed.split_whitespace();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(token), Some(tag), None) => current.push(token, tag),
            _ => {
                return Err(CorpusFormatError {
                    path: origin.to_path_buf(),
                    line: i + 1,
                    content: line,
                }
                .into())
            }
        }
    }

    if !current.is_empty() {
        sequences.push(current);
    }

    Ok(sequences)
}

/// Writes one sequence followed by its blank-line terminator.
pub fn write_sequence<W: Write>(mut wtr: W, seq: &TaggedSequence) -> io::Result<()> {
    for (token, tag) in seq.iter() {
        writeln!(wtr, "{token} {tag}")?;
    }
    writeln!(wtr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Vec<TaggedSequence>> {
        parse_sequences(s.as_bytes(), Path::new("test.conll"))
    }

    #[test]
    fn sequences_are_split_on_blank_lines() {
        let seqs = parse("Malm B-PRODUCT\nbed O\n\n\nKivik B-PRODUCT\n").unwrap();
        assert_eq!(seqs.len(), 2);
        assert_eq!(seqs[0].tokens(), ["Malm", "bed"]);
        assert_eq!(seqs[0].tags(), ["B-PRODUCT", "O"]);
        assert_eq!(seqs[1].tokens(), ["Kivik"]);
    }

    #[test]
    fn missing_tag_is_reported_with_line() {
        let err = parse("Malm B-PRODUCT\n\nsofa\n").unwrap_err();
        match err {
            Error::CorpusFormat(e) => {
                assert_eq!(e.line, 3);
                assert_eq!(e.content, "sofa");
            }
            e => panic!("unexpected error {e}"),
        }
    }

    #[test]
    fn extra_field_is_rejected() {
        assert!(parse("Malm B-PRODUCT O\n").is_err());
    }

    #[test]
    fn write_then_parse_gives_back_the_sequence() {
        let seq: TaggedSequence = [("Ektorp", "B-PRODUCT"), ("Sofa", "I-PRODUCT"), ("Sale", "O")]
            .into_iter()
            .collect();
        let mut buf = vec![];
        write_sequence(&mut buf, &seq).unwrap();
        assert_eq!(String::from_utf8_lossy(&buf), "Ektorp B-PRODUCT\nSofa I-PRODUCT\nSale O\n\n");
        assert_eq!(parse(&String::from_utf8_lossy(&buf)).unwrap(), vec![seq]);
    }

    #[test]
    fn mismatched_lengths_are_refused() {
        assert!(TaggedSequence::new(vec!["a".into()], vec![]).is_none());
    }
}
