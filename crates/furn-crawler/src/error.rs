use reqwest::StatusCode;

/// A page that could not be downloaded. Never fatal to a crawl.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("couldn't build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("couldn't fetch {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("couldn't fetch {url}: status {status}")]
    Status { url: String, status: StatusCode },
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}
