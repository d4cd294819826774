use std::collections::{HashSet, VecDeque};

use reqwest::Url;
use select::document::Document;

use crate::config::{seconds, CrawlerConfig, MAX_CRAWL_DELAY};
use crate::extract::links;
use crate::fetch::{parse_url, Fetcher};
use crate::robots::fetch_robot;
use crate::scrapable::{CrawlingContext, Scrapable, ScrapingContext};

/// Page counts of a whole crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub fetched: usize,
    pub failed: usize,
    /// Pages disallowed by robots.txt
    pub skipped: usize,
}

/// Visits every seed in order, following the links the scraper accepts.
///
/// A URL is visited at most once per crawl, across all seeds. Download errors
/// are logged and counted, scraper errors stop the crawl.
pub async fn crawl_site<T>(config: &CrawlerConfig, scraper: &mut T) -> anyhow::Result<CrawlReport>
where
    T: Scrapable,
{
    let fetcher = Fetcher::new(config)?;
    let mut visited = HashSet::new();
    let mut report = CrawlReport::default();

    for seed in &config.seeds {
        let seed = match parse_url(seed) {
            Ok(seed) => seed,
            Err(e) => {
                log::warn!("Skipping seed: {e}");
                continue;
            }
        };
        log::info!("Crawling {seed}");
        crawl_seed(config, &fetcher, scraper, seed, &mut visited, &mut report).await?;
    }

    scraper.finalizer()?;
    log::info!(
        "Crawl done: {} fetched, {} failed, {} skipped",
        report.fetched,
        report.failed,
        report.skipped
    );
    Ok(report)
}

async fn crawl_seed<T>(
    config: &CrawlerConfig,
    fetcher: &Fetcher,
    scraper: &mut T,
    seed: Url,
    visited: &mut HashSet<String>,
    report: &mut CrawlReport,
) -> anyhow::Result<()>
where
    T: Scrapable,
{
    let robot = if config.obey_robots {
        fetch_robot(fetcher, &seed, &config.user_agent).await
    } else {
        None
    };

    let mut delay = config.delay_duration();
    if let Some(crawl_delay) = robot.as_ref().and_then(|r| r.delay) {
        match seconds(crawl_delay) {
            Some(d) if d > MAX_CRAWL_DELAY => {
                log::warn!("Crawl-delay of {crawl_delay}s for {seed} capped to {MAX_CRAWL_DELAY:?}");
                delay = delay.max(MAX_CRAWL_DELAY);
            }
            Some(d) => delay = delay.max(d),
            None => log::warn!("Ignoring Crawl-delay of {crawl_delay}s for {seed}"),
        }
    }

    let ctx = CrawlingContext::new(seed.clone());
    let mut queued = HashSet::from([seed.to_string()]);
    let mut frontier = VecDeque::from([seed]);
    let mut requests = 0;

    while let Some(url) = frontier.pop_front() {
        if config.max_pages_per_seed.is_some_and(|max| requests >= max) {
            log::info!("Page limit reached for {}", ctx.seed());
            break;
        }
        if !visited.insert(url.to_string()) {
            continue;
        }
        if robot.as_ref().is_some_and(|r| !r.allowed(url.as_str())) {
            log::info!("Disallowed by robots.txt: {url}");
            report.skipped += 1;
            continue;
        }

        if requests > 0 {
            tokio::time::sleep(delay).await;
        }
        requests += 1;

        let body = match fetcher.fetch(&url).await {
            Ok(body) => body,
            Err(e) => {
                log::warn!("Skipping URL: {e}");
                report.failed += 1;
                continue;
            }
        };
        report.fetched += 1;
        log::debug!("Fetched {url}");

        let found = {
            let page = Document::from(body.as_str());
            scraper.scrap(&page, &ScrapingContext::new(url.clone()))?;
            links(&page, &url)
        };

        for mut link in found {
            link.set_fragment(None);
            if visited.contains(link.as_str()) || queued.contains(link.as_str()) {
                continue;
            }
            if scraper.accept(&link, &ctx) {
                queued.insert(link.to_string());
                frontier.push_back(link);
            }
        }
    }

    Ok(())
}
