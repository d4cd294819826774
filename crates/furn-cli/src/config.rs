use std::fs::File;
use std::path::{Path, PathBuf};

use furn_corpus::FileMode;
use furn_crawler::CrawlerConfig;
use furn_ner::{AnnotatorConfig, TrainerConfig};
use serde::{Deserialize, Serialize};

/// Settings of every pipeline stage, usually read from a yaml file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Unlabeled queue written by `crawl` and drained by `annotate`
    #[serde(default = "default_queue")]
    pub queue: PathBuf,

    /// CoNLL file appended by `annotate` and read by `train`
    #[serde(default = "default_labeled")]
    pub labeled: PathBuf,

    /// Active checkpoint directory
    #[serde(default = "default_checkpoint")]
    pub checkpoint: PathBuf,

    #[serde(default)]
    pub crawler: CrawlSection,

    #[serde(default)]
    pub annotator: AnnotatorConfig,

    #[serde(default)]
    pub trainer: TrainerConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue: default_queue(),
            labeled: default_labeled(),
            checkpoint: default_checkpoint(),
            crawler: CrawlSection::default(),
            annotator: AnnotatorConfig::default(),
            trainer: TrainerConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Ok(serde_yaml::from_reader(File::open(path)?)?),
            None => Ok(Self::default()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlSection {
    #[serde(flatten)]
    pub crawler: CrawlerConfig,

    #[serde(default)]
    pub file_mode: FileMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Tags whose words are reported as product names
    #[serde(default = "default_product_tags")]
    pub product_tags: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            product_tags: default_product_tags(),
        }
    }
}

fn default_queue() -> PathBuf {
    PathBuf::from("furniture_data.csv")
}

fn default_labeled() -> PathBuf {
    PathBuf::from("furniture_data.conll")
}

fn default_checkpoint() -> PathBuf {
    PathBuf::from("./model_output")
}

fn default_bind() -> String {
    String::from("127.0.0.1:5000")
}

fn default_product_tags() -> Vec<String> {
    vec![String::from("B-PRODUCT"), String::from("I-PRODUCT")]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let conf: PipelineConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(conf.queue, PathBuf::from("furniture_data.csv"));
        assert_eq!(conf.crawler.crawler.seeds.len(), 5);
        assert_eq!(conf.crawler.file_mode, FileMode::Append);
        assert_eq!(conf.annotator.limit, Some(1000));
        assert_eq!(conf.trainer.epochs, 3);
        assert_eq!(conf.server.product_tags, ["B-PRODUCT", "I-PRODUCT"]);
    }

    #[test]
    fn nested_sections_are_camel_case() {
        let yaml = r###"
checkpoint: /srv/models/furniture
crawler:
  seeds: ["https://www.ikea.com"]
  delay: 1.5
  maxPagesPerSeed: 20
  obeyRobots: false
  fileMode: truncate
annotator:
  limit: null
  continuationPrefix: "##"
trainer:
  base: /srv/models/bert-base-cased
  batchSize: 16
server:
  bind: 0.0.0.0:8080
  productTags: [B-PRODUCT]
"###;
        let conf: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(conf.checkpoint, PathBuf::from("/srv/models/furniture"));
        assert_eq!(conf.crawler.crawler.seeds, ["https://www.ikea.com"]);
        assert_eq!(conf.crawler.crawler.delay, 1.5);
        assert_eq!(conf.crawler.crawler.max_pages_per_seed, Some(20));
        assert!(!conf.crawler.crawler.obey_robots);
        assert_eq!(conf.crawler.file_mode, FileMode::Truncate);
        assert_eq!(conf.annotator.limit, None);
        assert_eq!(conf.trainer.batch_size, 16);
        assert_eq!(conf.trainer.epochs, 3);
        assert_eq!(conf.server.bind, "0.0.0.0:8080");
        assert_eq!(conf.server.product_tags, ["B-PRODUCT"]);
    }
}
