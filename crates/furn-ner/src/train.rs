use std::fs;
use std::path::Path;
use std::sync::PoisonError;

use candle_core::{DType, Device, Tensor, D};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use furn_corpus::{load_sequences, LabelSet, TaggedSequence};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tokenizers::Tokenizer;

use crate::checkpoint::{Checkpoint, CONFIG_FILE, LABELS_FILE, TOKENIZER_FILE, WEIGHTS_FILE};
use crate::config::TrainerConfig;
use crate::error::{Error, Result};
use crate::model::TokenClassifier;
use crate::tagger::IGNORE_INDEX;

/// What a training run produced.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub sequences: usize,
    pub labels: LabelSet,
    /// Tags absent from the base checkpoint's label set
    pub new_tags: Vec<String>,
    /// Mean loss of each epoch
    pub losses: Vec<f32>,
}

/// Fine-tunes `base` on the labeled corpus and writes a checkpoint to `output`.
///
/// When `base` carries a label set it is extended append-only and its
/// classifier rows are kept, so label ids of the base stay valid. `output` may
/// be the base directory itself.
pub fn train(
    corpus: &Path,
    base: &Checkpoint,
    output: &Path,
    config: &TrainerConfig,
) -> Result<TrainReport> {
    let sequences = load_sequences(corpus)?
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();
    if sequences.is_empty() {
        return Err(Error::EmptyCorpus(corpus.to_path_buf()));
    }

    let base_labels = base.labels_if_present()?;
    let labels = match &base_labels {
        Some(old) => old.extended_with(&sequences),
        None => LabelSet::from_sequences(&sequences),
    };
    let new_tags = match &base_labels {
        Some(old) => labels.tags()[old.len()..].to_vec(),
        None => labels.tags().to_vec(),
    };
    if base_labels.is_some() && !new_tags.is_empty() {
        log::info!("Extending label set with {new_tags:?}");
    }

    let tokenizer = base.tokenizer(config.max_length)?;
    let model_config = base.model_config()?;
    let examples = sequences
        .iter()
        .map(|seq| Example::encode(&tokenizer, seq, &labels))
        .collect::<Result<Vec<_>>>()?;

    let device = Device::cuda_if_available(0)?;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let model = TokenClassifier::load(vb, &model_config.bert, labels.len())?;
    load_base_weights(&varmap, base, base_labels.as_ref(), &labels, &device)?;

    let mut optimizer = AdamW::new(
        varmap.all_vars(),
        ParamsAdamW {
            lr: config.learning_rate,
            weight_decay: config.weight_decay,
            ..Default::default()
        },
    )?;

    log::info!(
        "Training on {} sequences, {} labels, {} epochs from {}",
        examples.len(),
        labels.len(),
        config.epochs,
        base.dir().display()
    );

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut order = (0..examples.len()).collect::<Vec<_>>();
    let mut losses = Vec::with_capacity(config.epochs);
    for epoch in 1..=config.epochs {
        order.shuffle(&mut rng);
        let mut total = 0.0;
        let mut steps = 0;
        for chunk in order.chunks(config.batch_size.max(1)) {
            let batch = Batch::collate(chunk.iter().map(|&i| &examples[i]), &device)?;
            let logits = model.forward(&batch.input_ids, &batch.type_ids, &batch.attention_mask)?;
            let loss = masked_cross_entropy(&logits, &batch.targets)?;
            optimizer.backward_step(&loss)?;
            total += loss.to_scalar::<f32>()?;
            steps += 1;
        }
        let mean = total / steps.max(1) as f32;
        log::info!("Epoch {epoch}/{}: loss {mean:.4}", config.epochs);
        losses.push(mean);
    }

    fs::create_dir_all(output)
        .map_err(|e| furn_corpus::Error::Io { path: output.to_path_buf(), source: e })?;
    varmap.save(output.join(WEIGHTS_FILE))?;
    tokenizer
        .save(output.join(TOKENIZER_FILE), false)
        .map_err(Error::tokenizer)?;
    model_config.save_with_labels(&output.join(CONFIG_FILE), &labels)?;
    labels.save(output.join(LABELS_FILE))?;
    log::info!("Saved checkpoint to {}", output.display());

    Ok(TrainReport {
        sequences: sequences.len(),
        labels,
        new_tags,
        losses,
    })
}

/// One tokenized sequence with a target per sub-word piece.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Example {
    input_ids: Vec<u32>,
    type_ids: Vec<u32>,
    targets: Vec<i64>,
}

impl Example {
    /// Every piece of a word is trained on that word's tag, special pieces are
    /// ignored.
    fn encode(tokenizer: &Tokenizer, seq: &TaggedSequence, labels: &LabelSet) -> Result<Self> {
        let words = seq.tokens().iter().map(String::as_str).collect::<Vec<_>>();
        let encoding = tokenizer.encode(words, true).map_err(Error::tokenizer)?;

        let targets = encoding
            .get_word_ids()
            .iter()
            .map(|word| match word {
                None => Ok(IGNORE_INDEX),
                Some(w) => {
                    let tag = seq.tags().get(*w as usize).map(String::as_str).unwrap_or("");
                    labels
                        .index_of(tag)
                        .map(|id| id as i64)
                        .ok_or_else(|| Error::UnknownTag(vec![tag.to_string()]))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            input_ids: encoding.get_ids().to_vec(),
            type_ids: encoding.get_type_ids().to_vec(),
            targets,
        })
    }
}

/// Examples padded to the longest one.
struct Batch {
    input_ids: Tensor,
    type_ids: Tensor,
    attention_mask: Tensor,
    targets: Vec<i64>,
}

impl Batch {
    fn collate<'a, I>(examples: I, device: &Device) -> candle_core::Result<Self>
    where
        I: IntoIterator<Item = &'a Example>,
    {
        let examples = examples.into_iter().collect::<Vec<_>>();
        let width = examples.iter().map(|e| e.input_ids.len()).max().unwrap_or(0);
        let shape = (examples.len(), width);

        let mut input_ids = Vec::with_capacity(shape.0 * width);
        let mut type_ids = Vec::with_capacity(shape.0 * width);
        let mut attention_mask = Vec::with_capacity(shape.0 * width);
        let mut targets = Vec::with_capacity(shape.0 * width);
        for e in examples {
            let pad = width - e.input_ids.len();
            input_ids.extend(e.input_ids.iter().copied().chain(std::iter::repeat(0).take(pad)));
            type_ids.extend(e.type_ids.iter().copied().chain(std::iter::repeat(0).take(pad)));
            attention_mask.extend(
                std::iter::repeat(1u32)
                    .take(e.input_ids.len())
                    .chain(std::iter::repeat(0).take(pad)),
            );
            targets.extend(
                e.targets
                    .iter()
                    .copied()
                    .chain(std::iter::repeat(IGNORE_INDEX).take(pad)),
            );
        }

        Ok(Self {
            input_ids: Tensor::from_vec(input_ids, shape, device)?,
            type_ids: Tensor::from_vec(type_ids, shape, device)?,
            attention_mask: Tensor::from_vec(attention_mask, shape, device)?,
            targets,
        })
    }
}

/// Mean negative log-likelihood over the positions whose target is not
/// [`IGNORE_INDEX`]. `logits` is `(batch, seq_len, num_labels)`.
fn masked_cross_entropy(logits: &Tensor, targets: &[i64]) -> candle_core::Result<Tensor> {
    let (batch, len, _) = logits.dims3()?;
    let device = logits.device();

    let weights = targets
        .iter()
        .map(|&t| if t == IGNORE_INDEX { 0f32 } else { 1f32 })
        .collect::<Vec<_>>();
    let count = weights.iter().sum::<f32>().max(1.0);
    let indices = targets
        .iter()
        .map(|&t| u32::try_from(t).unwrap_or(0))
        .collect::<Vec<_>>();

    let log_probs = candle_nn::ops::log_softmax(logits, D::Minus1)?;
    let indices = Tensor::from_vec(indices, (batch, len, 1), device)?;
    let picked = log_probs.gather(&indices, D::Minus1)?.squeeze(D::Minus1)?;
    let weights = Tensor::from_vec(weights, (batch, len), device)?;
    (picked * weights)?.sum_all()?.neg()? / f64::from(count)
}

/// Copies matching tensors of the base checkpoint into `varmap`.
///
/// The base label set must be a prefix of `labels`; its classifier then fills
/// the first rows of the new one. Anything the base lacks keeps its fresh
/// initialization.
fn load_base_weights(
    varmap: &VarMap,
    base: &Checkpoint,
    base_labels: Option<&LabelSet>,
    labels: &LabelSet,
    device: &Device,
) -> Result<()> {
    if let Some(old) = base_labels {
        old.ensure_prefix_of(labels)?;
    }
    let path = base.require(WEIGHTS_FILE)?;
    let tensors = candle_core::safetensors::load(&path, device)?;
    let vars = varmap.data().lock().unwrap_or_else(PoisonError::into_inner);

    let mut missing = vec![];
    for (name, var) in vars.iter() {
        let Some(source) = source_names(name)
            .iter()
            .find_map(|candidate| tensors.get(candidate))
        else {
            missing.push(name.clone());
            continue;
        };
        let source = source.to_dtype(DType::F32)?;

        if source.dims() == var.dims() {
            var.set(&source)?;
        } else if name.starts_with("classifier.")
            && base_labels.is_some_and(|labels| labels.len() == source.dims()[0])
            && source.dims()[0] < var.dims()[0]
            && source.dims()[1..] == var.dims()[1..]
        {
            let kept = source.dims()[0];
            let fresh = var.as_tensor().narrow(0, kept, var.dims()[0] - kept)?;
            var.set(&Tensor::cat(&[&source, &fresh], 0)?)?;
            log::info!("Kept {kept} trained rows of {name}");
        } else {
            log::info!(
                "Shape of {name} differs from base ({:?} vs {:?}), reinitialized",
                source.dims(),
                var.dims()
            );
            missing.push(name.clone());
        }
    }

    if !missing.is_empty() {
        missing.sort();
        log::info!(
            "{} weights not found in {}: {}",
            missing.len(),
            path.display(),
            missing.join(", ")
        );
    }
    Ok(())
}

/// Names a variable may carry in a saved checkpoint: with or without the
/// encoder prefix, and with the legacy `gamma`/`beta` layer norm names.
fn source_names(name: &str) -> Vec<String> {
    let mut names = vec![name.to_string()];
    if let Some(bare) = name.strip_prefix("bert.") {
        names.push(bare.to_string());
    }
    let legacy = names
        .iter()
        .filter(|n| n.contains("LayerNorm."))
        .filter_map(|n| {
            n.strip_suffix(".weight")
                .map(|stem| format!("{stem}.gamma"))
                .or_else(|| n.strip_suffix(".bias").map(|stem| format!("{stem}.beta")))
        })
        .collect::<Vec<_>>();
    names.extend(legacy);
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_norm_names_have_legacy_aliases() {
        assert_eq!(
            source_names("bert.embeddings.LayerNorm.weight"),
            [
                "bert.embeddings.LayerNorm.weight",
                "embeddings.LayerNorm.weight",
                "bert.embeddings.LayerNorm.gamma",
                "embeddings.LayerNorm.gamma",
            ]
        );
        assert_eq!(source_names("classifier.bias"), ["classifier.bias"]);
    }

    #[test]
    fn ignored_positions_do_not_count() {
        let device = Device::Cpu;
        // Position 0 strongly predicts label 1, position 1 is ignored.
        let logits = Tensor::new(&[[[0f32, 10.0], [10.0, 0.0]]], &device).unwrap();

        let loss = masked_cross_entropy(&logits, &[1, IGNORE_INDEX])
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!(loss < 1e-3, "loss was {loss}");

        let wrong = masked_cross_entropy(&logits, &[0, IGNORE_INDEX])
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!(wrong > 9.0, "loss was {wrong}");
    }

    #[test]
    fn batches_are_padded_and_masked() {
        let device = Device::Cpu;
        let long = Example {
            input_ids: vec![2, 7, 8, 3],
            type_ids: vec![0; 4],
            targets: vec![IGNORE_INDEX, 0, 0, IGNORE_INDEX],
        };
        let short = Example {
            input_ids: vec![2, 9, 3],
            type_ids: vec![0; 3],
            targets: vec![IGNORE_INDEX, 1, IGNORE_INDEX],
        };

        let batch = Batch::collate([&long, &short], &device).unwrap();
        assert_eq!(batch.input_ids.dims(), [2, 4]);
        assert_eq!(
            batch.input_ids.to_vec2::<u32>().unwrap(),
            [[2, 7, 8, 3], [2, 9, 3, 0]]
        );
        assert_eq!(
            batch.attention_mask.to_vec2::<u32>().unwrap(),
            [[1, 1, 1, 1], [1, 1, 1, 0]]
        );
        assert_eq!(batch.targets[4..], [IGNORE_INDEX, 1, IGNORE_INDEX, IGNORE_INDEX]);
    }
}
