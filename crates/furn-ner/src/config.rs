use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatorConfig {
    /// Rows labeled per pass, `None` drains the whole queue
    #[serde(default = "default_limit")]
    pub limit: Option<usize>,

    /// Sub-word pieces per span, longer spans are truncated
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    #[serde(default = "default_continuation_prefix")]
    pub continuation_prefix: String,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            max_length: default_max_length(),
            continuation_prefix: default_continuation_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainerConfig {
    /// Directory of the pretrained encoder to fine-tune
    #[serde(default = "default_base")]
    pub base: PathBuf,

    #[serde(default = "default_epochs")]
    pub epochs: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    #[serde(default = "default_weight_decay")]
    pub weight_decay: f64,

    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Shuffling seed
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            base: default_base(),
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            weight_decay: default_weight_decay(),
            max_length: default_max_length(),
            seed: default_seed(),
        }
    }
}

fn default_limit() -> Option<usize> {
    Some(1000)
}

fn default_max_length() -> usize {
    512
}

fn default_continuation_prefix() -> String {
    String::from("##")
}

fn default_base() -> PathBuf {
    PathBuf::from("bert-base-cased")
}

fn default_epochs() -> usize {
    3
}

fn default_batch_size() -> usize {
    8
}

fn default_learning_rate() -> f64 {
    5e-5
}

fn default_weight_decay() -> f64 {
    0.01
}

fn default_seed() -> u64 {
    42
}
