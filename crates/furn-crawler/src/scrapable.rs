use reqwest::Url;
use select::document::Document;

use crate::extract::network_location;

pub trait Scrapable {
    type Config: Clone;

    fn new(config: &Self::Config) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Whether a discovered link joins the frontier. Defaults to links on the
    /// seed's own host.
    fn accept(&self, url: &Url, ctx: &CrawlingContext) -> bool {
        ctx.same_origin(url)
    }

    fn scrap(&mut self, page: &Document, ctx: &ScrapingContext) -> anyhow::Result<()>;

    fn finalizer(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CrawlingContext {
    seed: Url,
}

impl CrawlingContext {
    pub fn new(seed: Url) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> &Url {
        &self.seed
    }

    pub fn same_origin(&self, url: &Url) -> bool {
        network_location(url) == network_location(&self.seed)
    }
}

#[derive(Debug, Clone)]
pub struct ScrapingContext {
    location: Url,
}

impl ScrapingContext {
    pub fn new(location: Url) -> Self {
        Self { location }
    }

    pub fn location(&self) -> &Url {
        &self.location
    }
}
