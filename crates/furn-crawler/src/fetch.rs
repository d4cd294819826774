use reqwest::Url;

use crate::config::CrawlerConfig;
use crate::error::{FetchError, ParseError};

pub fn parse_url(url: &str) -> Result<Url, ParseError> {
    Url::parse(url.trim()).map_err(|e| ParseError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// HTTP client configured with the crawler's user agent and timeout.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self, FetchError> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout_duration())
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    /// Downloads a page body, any non-2xx status is an error.
    pub async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let request_err = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(request_err)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        resp.text().await.map_err(request_err)
    }
}
