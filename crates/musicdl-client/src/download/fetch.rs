//! Direct media fetches.

use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

pub trait MediaFetcher {
    /// GET `url` and return the whole body; non-2xx is an error.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Client for media transfers: connect timeout only, bodies may be large.
pub fn media_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .build()
        .context("Failed to build media HTTP client")
}

impl MediaFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .header("Accept", "*/*")
            .send()
            .await
            .context("Failed to fetch media")?;

        if !response.status().is_success() {
            anyhow::bail!("Media fetch returned status: {}", response.status());
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read media body")?;
        debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}
