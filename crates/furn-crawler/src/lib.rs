mod config;
mod crawler;
mod error;
pub mod extract;
mod fetch;
pub mod filter;
mod headings;
mod robots;
mod scrapable;

pub use config::{CrawlerConfig, MAX_CRAWL_DELAY};
pub use crawler::{crawl_site, CrawlReport};
pub use error::{FetchError, ParseError};
pub use fetch::{parse_url, Fetcher};
pub use headings::{HeadingScraper, HeadingScraperConfig};
pub use scrapable::{CrawlingContext, Scrapable, ScrapingContext};

pub use anyhow;
pub use reqwest::Url;
pub use select::document::Document;
