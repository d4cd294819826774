//! Product-name tagging on top of a BERT token classifier.
//!
//! [`Annotator`] owns a checkpoint loaded from disk and implements
//! [`Tagger`], the seam used by [`bootstrap`] to pre-label the unlabeled
//! queue and by [`product_names`] to pull product words out of free text.
//! [`train`] produces the checkpoints both consume.

mod bootstrap;
mod checkpoint;
mod config;
mod error;
mod model;
mod products;
mod tagger;
mod train;
mod words;

pub use bootstrap::bootstrap;
pub use checkpoint::{Checkpoint, CONFIG_FILE, LABELS_FILE, TOKENIZER_FILE, WEIGHTS_FILE};
pub use config::{AnnotatorConfig, TrainerConfig};
pub use error::{Error, ModelUnavailableError, Result};
pub use model::Annotator;
pub use products::product_names;
pub use tagger::{Prediction, Tagger, IGNORE_INDEX};
pub use train::{train, TrainReport};
pub use words::reconstruct_words;

pub use furn_corpus::{LabelSet, TaggedSequence};
