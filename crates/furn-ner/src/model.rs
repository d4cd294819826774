use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::{Linear, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use furn_corpus::LabelSet;
use tokenizers::Tokenizer;

use crate::checkpoint::{Checkpoint, WEIGHTS_FILE};
use crate::config::AnnotatorConfig;
use crate::error::{Error, ModelUnavailableError, Result};
use crate::tagger::{Prediction, Tagger, IGNORE_INDEX};

/// BERT encoder with a linear head scoring every label at every position.
pub(crate) struct TokenClassifier {
    bert: BertModel,
    classifier: Linear,
}

impl TokenClassifier {
    pub(crate) fn load(
        vb: VarBuilder,
        config: &BertConfig,
        num_labels: usize,
    ) -> candle_core::Result<Self> {
        let bert = BertModel::load(vb.pp("bert"), config)?;
        let classifier = candle_nn::linear(config.hidden_size, num_labels, vb.pp("classifier"))?;
        Ok(Self { bert, classifier })
    }

    /// Logits of shape `(batch, seq_len, num_labels)`.
    pub(crate) fn forward(
        &self,
        input_ids: &Tensor,
        type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> candle_core::Result<Tensor> {
        let hidden = self.bert.forward(input_ids, type_ids, Some(attention_mask))?;
        self.classifier.forward(&hidden)
    }
}

/// A loaded checkpoint: tokenizer, classifier, device and label set.
///
/// Built once per process and shared by reference.
pub struct Annotator {
    tokenizer: Tokenizer,
    model: TokenClassifier,
    device: Device,
    labels: LabelSet,
    continuation_prefix: String,
}

impl Annotator {
    /// Loads `checkpoint`, refusing it when its label set does not match the
    /// classifier it was saved with.
    pub fn load(checkpoint: &Checkpoint, config: &AnnotatorConfig) -> Result<Self> {
        let labels = checkpoint.labels()?;
        if labels.is_empty() {
            return Err(ModelUnavailableError::new(checkpoint.dir(), "empty label set").into());
        }
        let model_config = checkpoint.model_config()?;
        model_config.check_labels(&labels)?;
        let tokenizer = checkpoint.tokenizer(config.max_length)?;

        let weights = checkpoint.require(WEIGHTS_FILE)?;
        let device = Device::cuda_if_available(0)?;
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&weights], DType::F32, &device)
                .map_err(|e| ModelUnavailableError::new(&weights, e))?
        };

        if !vb.contains_tensor("classifier.weight") {
            return Err(
                ModelUnavailableError::new(&weights, "no token classification head").into(),
            );
        }
        let hidden = model_config.bert.hidden_size;
        if let Err(e) = vb.pp("classifier").get((labels.len(), hidden), "weight") {
            return Err(Error::LabelSetMismatch(format!(
                "{} labels listed but the classifier does not match: {e}",
                labels.len()
            )));
        }

        let model = TokenClassifier::load(vb, &model_config.bert, labels.len())
            .map_err(|e| ModelUnavailableError::new(&weights, e))?;

        log::info!(
            "Loaded checkpoint {} on {:?} with labels {:?}",
            checkpoint.dir().display(),
            device,
            labels.tags()
        );
        Ok(Self {
            tokenizer,
            model,
            device,
            labels,
            continuation_prefix: config.continuation_prefix.clone(),
        })
    }
}

impl Tagger for Annotator {
    fn predict(&self, text: &str) -> Result<Vec<Prediction>> {
        let encoding = self.tokenizer.encode(text, true).map_err(Error::tokenizer)?;
        if !encoding.get_overflowing().is_empty() {
            log::debug!(
                "Span of {} chars truncated to {} pieces, trailing words stay untagged",
                text.len(),
                encoding.len()
            );
        }
        if encoding.is_empty() {
            return Ok(vec![]);
        }

        let row = |ids: &[u32]| -> candle_core::Result<Tensor> {
            Tensor::new(ids, &self.device)?.unsqueeze(0)
        };
        let logits = self.model.forward(
            &row(encoding.get_ids())?,
            &row(encoding.get_type_ids())?,
            &row(encoding.get_attention_mask())?,
        )?;
        let best = logits.squeeze(0)?.argmax(D::Minus1)?.to_vec1::<u32>()?;

        Ok(encoding
            .get_tokens()
            .iter()
            .zip(encoding.get_special_tokens_mask())
            .zip(best)
            .map(|((token, special), id)| {
                let label_id = if *special == 1 {
                    IGNORE_INDEX
                } else {
                    i64::from(id)
                };
                Prediction::new(token.as_str(), label_id)
            })
            .collect())
    }

    fn labels(&self) -> &LabelSet {
        &self.labels
    }

    fn continuation_prefix(&self) -> &str {
        &self.continuation_prefix
    }
}
