//! Client for the musicdl search/download service.

use anyhow::{Context, Result};
use musicdl_proto::model::{MediaItem, UNKNOWN};
use musicdl_proto::protocol::{
    Ack, ConfigRequest, ConfigResponse, DownloadRequest, ErrorBody, HealthResponse,
    PlaylistRequest, PlaylistResponse, SearchRequest, SearchResponse, SourcesResponse,
    CONFIG_PATH, DOWNLOAD_PATH, HEALTH_PATH, PLAYLIST_PATH, SEARCH_PATH, SOURCES_PATH,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// The remote collaborator: search, playlist parsing and server-side
/// downloads.
pub trait MusicBackend {
    fn list_sources(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn search(
        &self,
        term: &str,
        sources: &[String],
    ) -> impl Future<Output = Result<Vec<MediaItem>>> + Send;

    fn parse_playlist(
        &self,
        url: &str,
        sources: &[String],
    ) -> impl Future<Output = Result<Vec<MediaItem>>> + Send;

    /// Hand the items to the service for delivery. Resolves once the
    /// service accepted or rejected the request; no per-item status.
    fn download(&self, items: &[MediaItem]) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", path))?;
        Self::read_json(path, response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", path))?;
        Self::read_json(path, response).await
    }

    async fn read_json<T: DeserializeOwned>(path: &str, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.detail)
                .unwrap_or_default();
            anyhow::bail!("{} returned status {}: {}", path, status, detail);
        }
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", path))
    }

    pub async fn health(&self) -> Result<String> {
        let health: HealthResponse = self.get_json(HEALTH_PATH).await?;
        Ok(health.status)
    }

    /// Ask the service to switch its active platforms.
    pub async fn configure(&self, sources: &[String]) -> Result<Vec<String>> {
        let request = ConfigRequest {
            music_sources: sources.to_vec(),
            init_music_clients_cfg: None,
        };
        let response: ConfigResponse = self.post_json(CONFIG_PATH, &request).await?;
        if !response.ok {
            anyhow::bail!("service declined configuration");
        }
        Ok(response.music_sources)
    }
}

impl MusicBackend for HttpBackend {
    async fn list_sources(&self) -> Result<Vec<String>> {
        let response: SourcesResponse = self.get_json(SOURCES_PATH).await?;
        debug!("Service offers {} sources", response.music_sources.len());
        Ok(response.music_sources)
    }

    async fn search(&self, term: &str, sources: &[String]) -> Result<Vec<MediaItem>> {
        let request = SearchRequest {
            keyword: term.to_string(),
            music_sources: sources.to_vec(),
        };
        let response: SearchResponse = self.post_json(SEARCH_PATH, &request).await?;
        info!("Search {:?} returned {} results", term, response.results.len());
        Ok(response
            .results
            .into_iter()
            .map(|hit| MediaItem::from_wire(&hit.source, hit.index, hit.song_info))
            .collect())
    }

    async fn parse_playlist(&self, url: &str, sources: &[String]) -> Result<Vec<MediaItem>> {
        let request = PlaylistRequest {
            playlist_url: url.to_string(),
            music_sources: sources.to_vec(),
        };
        let response: PlaylistResponse = self.post_json(PLAYLIST_PATH, &request).await?;
        info!("Playlist {} returned {} songs", url, response.results.len());
        Ok(playlist_items(response))
    }

    async fn download(&self, items: &[MediaItem]) -> Result<()> {
        let request = DownloadRequest {
            song_infos: items.iter().map(MediaItem::to_wire).collect(),
        };
        let ack: Ack = self.post_json(DOWNLOAD_PATH, &request).await?;
        if !ack.ok {
            anyhow::bail!("service did not acknowledge the download");
        }
        Ok(())
    }
}

/// Playlist entries carry their own source; their position in the list is
/// their index so every entry gets a distinct identity.
fn playlist_items(response: PlaylistResponse) -> Vec<MediaItem> {
    response
        .results
        .into_iter()
        .enumerate()
        .map(|(position, info)| {
            let source = info
                .source
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string());
            MediaItem::from_wire(&source, position, info)
        })
        .collect()
}
