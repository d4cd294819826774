//! Persistent state of the annotation loop.
//!
//! Two files make up the label store: a CSV queue of unlabeled candidate words
//! produced by the crawler, and an append-only CoNLL file of tagged tokens
//! produced by the bootstrap annotator and corrected by hand.

mod conll;
mod error;
mod labels;
mod queue;
mod store;

pub use conll::{load_sequences, parse_sequences, write_sequence, TaggedSequence};
pub use error::{CorpusFormatError, Error, Result};
pub use labels::LabelSet;
pub use queue::{FileMode, QueueWriter, Row, UnlabeledQueue, QUEUE_HEADER};
pub use store::{DrainReport, LabelStore};
