use std::time::Duration;

use anyhow::Context as _;
use percent_encoding::percent_decode_str;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, USER_AGENT};
use url::Url;

/// A failed page retrieval. The `Display` form is the text substituted for the passage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to retrieve the web page.")]
    Status(u16),
    #[error("An error occurred: {0}")]
    Transport(String),
}

/// Decodes `%XX` escapes. `+` is left alone.
pub fn decode_url(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    /// `timeout: None` keeps reqwest's default, which never times out.
    pub fn new(timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("build page fetch http client")?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, raw_url: &str) -> Result<String, FetchError> {
        let decoded = decode_url(raw_url);
        let url = Url::parse(&decoded)
            .map_err(|err| FetchError::Transport(format!("invalid url {decoded:?}: {err}")))?;

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, concat!("ledscore/", env!("CARGO_PKG_VERSION")))
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|err| FetchError::Transport(format!("GET {url}: {err}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::debug!(%url, status = status.as_u16(), "page fetch returned non-200");
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|err| FetchError::Transport(format!("read body of {url}: {err}")))
    }
}
