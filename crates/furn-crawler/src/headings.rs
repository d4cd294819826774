use std::path::PathBuf;

use furn_corpus::{FileMode, QueueWriter, UnlabeledQueue};
use select::document::Document;
use serde::{Deserialize, Serialize};

use crate::extract::heading_text;
use crate::filter::filter_text;
use crate::scrapable::{Scrapable, ScrapingContext};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadingScraperConfig {
    /// Unlabeled queue receiving the candidate words
    pub queue: PathBuf,

    #[serde(default)]
    pub file_mode: FileMode,
}

/// Appends the filtered heading words of every page to the unlabeled queue.
pub struct HeadingScraper {
    wtr: QueueWriter,
}

impl HeadingScraper {
    /// Rows added to the queue so far.
    pub fn rows_written(&self) -> usize {
        self.wtr.rows_written()
    }
}

impl Scrapable for HeadingScraper {
    type Config = HeadingScraperConfig;

    fn new(config: &Self::Config) -> anyhow::Result<Self> {
        let wtr = UnlabeledQueue::new(&config.queue).writer(config.file_mode)?;
        Ok(Self { wtr })
    }

    fn scrap(&mut self, page: &Document, ctx: &ScrapingContext) -> anyhow::Result<()> {
        let words = filter_text(&heading_text(page));
        if words.is_empty() {
            log::info!("No headings found for {}", ctx.location());
            return Ok(());
        }

        let n = self.wtr.append_words(&words)?;
        self.wtr.flush()?;
        log::info!("Saved {n} words from {}", ctx.location());
        Ok(())
    }

    fn finalizer(&mut self) -> anyhow::Result<()> {
        self.wtr.flush()?;
        Ok(())
    }
}
