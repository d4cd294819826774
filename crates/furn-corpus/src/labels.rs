use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::conll::TaggedSequence;
use crate::error::{Error, Result};

/// Ordered list of tags; a tag's position is the label id used by a checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(Vec<String>);

impl LabelSet {
    /// Sorted distinct tags observed in `sequences`.
    pub fn from_sequences<'a, I>(sequences: I) -> Self
    where
        I: IntoIterator<Item = &'a TaggedSequence>,
    {
        let tags = sequences
            .into_iter()
            .flat_map(|seq| seq.tags().iter().cloned())
            .collect::<BTreeSet<_>>();
        Self(tags.into_iter().collect())
    }

    /// Keeps every existing index and appends unseen tags in sorted order.
    pub fn extended_with<'a, I>(&self, sequences: I) -> Self
    where
        I: IntoIterator<Item = &'a TaggedSequence>,
    {
        let fresh = Self::from_sequences(sequences);
        let mut tags = self.0.clone();
        tags.extend(fresh.0.into_iter().filter(|t| !self.0.contains(t)));
        Self(tags)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn index_of(&self, tag: &str) -> Option<usize> {
        self.0.iter().position(|t| t == tag)
    }

    pub fn tag(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn tags(&self) -> &[String] {
        &self.0
    }

    /// Fails unless `self` is a prefix of `newer`, i.e. every label id of
    /// `self` still designates the same tag in `newer`.
    pub fn ensure_prefix_of(&self, newer: &LabelSet) -> Result<()> {
        if newer.0.starts_with(&self.0) {
            Ok(())
        } else {
            Err(Error::LabelSetMismatch {
                expected: self.0.clone(),
                found: newer.0.clone(),
            })
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::json(path, e))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string(&self.0).map_err(|e| Error::json(path, e))?;
        fs::write(path, json).map_err(|e| Error::io(path, e))
    }
}

impl<S: Into<String>> FromIterator<S> for LabelSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
