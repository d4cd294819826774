use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Longest pause a robots.txt `Crawl-delay` may impose between two requests.
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerConfig {
    /// Start pages, each crawled within its own host
    #[serde(default = "default_seeds")]
    pub seeds: Vec<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// The delay in seconds between requests
    #[serde(default = "default_delay")]
    pub delay: f32,

    /// Per request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: f32,

    #[serde(default)]
    pub max_pages_per_seed: Option<usize>,

    #[serde(default = "default_obey_robots")]
    pub obey_robots: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            seeds: default_seeds(),
            user_agent: default_user_agent(),
            delay: default_delay(),
            timeout: default_timeout(),
            max_pages_per_seed: None,
            obey_robots: default_obey_robots(),
        }
    }
}

impl CrawlerConfig {
    /// `delay` as a duration, the default delay when it is not representable.
    pub fn delay_duration(&self) -> Duration {
        seconds(self.delay).unwrap_or_else(|| {
            log::warn!("Invalid delay {}s, using {}s", self.delay, default_delay());
            Duration::from_secs_f32(default_delay())
        })
    }

    /// `timeout` as a duration of at least one millisecond, the default
    /// timeout when it is not representable.
    pub fn timeout_duration(&self) -> Duration {
        match seconds(self.timeout) {
            Some(timeout) => timeout.max(Duration::from_millis(1)),
            None => {
                log::warn!("Invalid timeout {}s, using {}s", self.timeout, default_timeout());
                Duration::from_secs_f32(default_timeout())
            }
        }
    }
}

/// Negative and NaN values count as zero, infinite or overflowing ones give `None`.
pub(crate) fn seconds(value: f32) -> Option<Duration> {
    Duration::try_from_secs_f32(value.max(0.0)).ok()
}

fn default_seeds() -> Vec<String> {
    [
        "https://www.ikea.com",
        "https://www.wayfair.com",
        "https://www.overstock.com",
        "https://www.westelm.com",
        "https://www.hermanmiller.com",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_user_agent() -> String {
    String::from(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/94.0.4606.61 Safari/537.36",
    )
}

fn default_delay() -> f32 {
    5.0
}

fn default_timeout() -> f32 {
    10.0
}

fn default_obey_robots() -> bool {
    true
}
