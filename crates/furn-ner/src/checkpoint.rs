use std::fs;
use std::path::{Path, PathBuf};

use candle_transformers::models::bert::Config as BertConfig;
use furn_corpus::LabelSet;
use serde_json::{Map, Value};
use tokenizers::{Tokenizer, TruncationParams};

use crate::error::{Error, ModelUnavailableError, Result};

pub const WEIGHTS_FILE: &str = "model.safetensors";
pub const CONFIG_FILE: &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
/// Ordered tags, position = label id.
pub const LABELS_FILE: &str = "label_list.json";

/// A directory holding model weights, encoder config, tokenizer and the label
/// set the classifier was trained with.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    dir: PathBuf,
}

impl Checkpoint {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Whether every file an [`Annotator`](crate::Annotator) needs is present.
    pub fn is_complete(&self) -> bool {
        [WEIGHTS_FILE, CONFIG_FILE, TOKENIZER_FILE, LABELS_FILE]
            .iter()
            .all(|file| self.path(file).is_file())
    }

    pub(crate) fn require(&self, file: &str) -> Result<PathBuf> {
        let path = self.path(file);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ModelUnavailableError::new(&self.dir, format!("missing {file}")).into())
        }
    }

    pub fn labels(&self) -> Result<LabelSet> {
        let path = self.require(LABELS_FILE)?;
        Ok(LabelSet::load(path)?)
    }

    /// The label set, when the checkpoint has one. A pretrained encoder
    /// without a classification head has none.
    pub fn labels_if_present(&self) -> Result<Option<LabelSet>> {
        if self.path(LABELS_FILE).is_file() {
            self.labels().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Tokenizer truncating at `max_length` pieces, without padding.
    pub(crate) fn tokenizer(&self, max_length: usize) -> Result<Tokenizer> {
        let path = self.require(TOKENIZER_FILE)?;
        let mut tokenizer =
            Tokenizer::from_file(&path).map_err(|e| ModelUnavailableError::new(&path, e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(Error::tokenizer)?;
        tokenizer.with_padding(None);
        Ok(tokenizer)
    }

    pub(crate) fn model_config(&self) -> Result<ModelConfig> {
        let path = self.require(CONFIG_FILE)?;
        let bytes = fs::read(&path).map_err(|e| ModelUnavailableError::new(&path, e))?;
        let raw: Map<String, Value> =
            serde_json::from_slice(&bytes).map_err(|e| ModelUnavailableError::new(&path, e))?;
        let bert = serde_json::from_value(Value::Object(raw.clone()))
            .map_err(|e| ModelUnavailableError::new(&path, e))?;
        Ok(ModelConfig { raw, bert })
    }
}

/// `config.json` of a checkpoint, kept whole so unknown keys survive a save.
#[derive(Debug, Clone)]
pub(crate) struct ModelConfig {
    raw: Map<String, Value>,
    pub(crate) bert: BertConfig,
}

impl ModelConfig {
    /// `id2label` ordered by id, when present.
    fn id2label(&self) -> Option<Vec<String>> {
        let map = self.raw.get("id2label")?.as_object()?;
        let mut entries = map
            .iter()
            .filter_map(|(id, tag)| Some((id.parse::<usize>().ok()?, tag.as_str()?.to_string())))
            .collect::<Vec<_>>();
        entries.sort();
        Some(entries.into_iter().map(|(_, tag)| tag).collect())
    }

    /// Rejects an `id2label` that disagrees with `labels`. Placeholder names
    /// (`LABEL_0`, `LABEL_1`, ...) only have to match in count.
    pub(crate) fn check_labels(&self, labels: &LabelSet) -> Result<()> {
        let Some(id2label) = self.id2label() else {
            return Ok(());
        };
        let consistent = id2label.len() == labels.len()
            && id2label.iter().enumerate().all(|(id, tag)| {
                labels.tag(id) == Some(tag.as_str()) || *tag == format!("LABEL_{id}")
            });
        if consistent {
            Ok(())
        } else {
            Err(Error::LabelSetMismatch(format!(
                "{CONFIG_FILE} maps {id2label:?}, {LABELS_FILE} lists {:?}",
                labels.tags()
            )))
        }
    }

    /// Writes the config with its classification labels set to `labels`.
    pub(crate) fn save_with_labels(&self, path: &Path, labels: &LabelSet) -> Result<()> {
        let mut raw = self.raw.clone();
        let id2label = labels
            .tags()
            .iter()
            .enumerate()
            .map(|(id, tag)| (id.to_string(), Value::from(tag.as_str())))
            .collect::<Map<_, _>>();
        let label2id = labels
            .tags()
            .iter()
            .enumerate()
            .map(|(id, tag)| (tag.clone(), Value::from(id)))
            .collect::<Map<_, _>>();
        raw.insert("id2label".into(), Value::Object(id2label));
        raw.insert("label2id".into(), Value::Object(label2id));
        raw.insert("num_labels".into(), Value::from(labels.len()));
        raw.insert(
            "architectures".into(),
            Value::from(vec!["BertForTokenClassification"]),
        );

        let json = serde_json::to_string_pretty(&raw)
            .map_err(|e| furn_corpus::Error::Json { path: path.to_path_buf(), source: e })?;
        fs::write(path, json)
            .map_err(|e| furn_corpus::Error::Io { path: path.to_path_buf(), source: e })?;
        Ok(())
    }
}
