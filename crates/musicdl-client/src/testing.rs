//! In-memory collaborators for tests.

use anyhow::Result;
use musicdl_proto::history::HistoryStore;
use musicdl_proto::model::MediaItem;
use musicdl_proto::storage::MemoryStore;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::backend::MusicBackend;
use crate::download::fetch::MediaFetcher;
use crate::download::save::MediaSaver;
use crate::preview::PreviewPlayer;
use crate::session::SessionState;

pub fn song(source: &str, index: usize, url: Option<&str>) -> MediaItem {
    MediaItem {
        source: source.into(),
        index,
        title: Some(format!("Song {}", index)),
        artists: Some("Artist".into()),
        file_extension: Some("mp3".into()),
        direct_url: url.map(String::from),
        ..MediaItem::default()
    }
}

pub fn empty_state() -> SessionState {
    SessionState::new(HistoryStore::load(Arc::new(MemoryStore::new())), Vec::new())
}

/// State whose batch is `items`, all of them selected.
pub fn state_selecting(items: Vec<MediaItem>) -> SessionState {
    let mut state = empty_state();
    state.replace_batch(items);
    let batch = state.batch.clone();
    state.selection.select_all(&batch);
    state
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    pub sources: Vec<String>,
    pub results: Vec<MediaItem>,
    pub fail_lookups: bool,
    pub reject_downloads: bool,
    pub searches: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    pub downloads: Arc<Mutex<Vec<Vec<MediaItem>>>>,
}

impl FakeBackend {
    pub fn download_calls(&self) -> Vec<Vec<MediaItem>> {
        self.downloads.lock().unwrap().clone()
    }
}

impl MusicBackend for FakeBackend {
    async fn list_sources(&self) -> Result<Vec<String>> {
        if self.fail_lookups {
            anyhow::bail!("connection refused");
        }
        Ok(self.sources.clone())
    }

    async fn search(&self, term: &str, sources: &[String]) -> Result<Vec<MediaItem>> {
        self.searches
            .lock()
            .unwrap()
            .push((term.to_string(), sources.to_vec()));
        if self.fail_lookups {
            anyhow::bail!("connection refused");
        }
        Ok(self.results.clone())
    }

    async fn parse_playlist(&self, _url: &str, _sources: &[String]) -> Result<Vec<MediaItem>> {
        if self.fail_lookups {
            anyhow::bail!("connection refused");
        }
        Ok(self.results.clone())
    }

    async fn download(&self, items: &[MediaItem]) -> Result<()> {
        self.downloads.lock().unwrap().push(items.to_vec());
        if self.reject_downloads {
            anyhow::bail!("500 Internal Server Error");
        }
        Ok(())
    }
}

/// Serves canned bodies; unknown URLs answer 404.
#[derive(Clone, Default)]
pub struct FakeFetcher {
    pub bodies: HashMap<String, Vec<u8>>,
    pub delay: Option<Duration>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl FakeFetcher {
    pub fn serving(url: &str, body: &[u8]) -> Self {
        let mut fetcher = Self::default();
        fetcher.bodies.insert(url.to_string(), body.to_vec());
        fetcher
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl MediaFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.bodies.get(url) {
            Some(body) => Ok(body.clone()),
            None => anyhow::bail!("Media fetch returned status: 404 Not Found"),
        }
    }
}

/// Records every save; URL saves succeed unless `fail_url_saves`.
#[derive(Clone, Default)]
pub struct RecordingSaver {
    pub fail_url_saves: bool,
    pub byte_saves: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    pub url_saves: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingSaver {
    pub fn byte_saves(&self) -> Vec<(String, Vec<u8>)> {
        self.byte_saves.lock().unwrap().clone()
    }

    pub fn url_saves(&self) -> Vec<(String, String)> {
        self.url_saves.lock().unwrap().clone()
    }
}

impl MediaSaver for RecordingSaver {
    async fn save_bytes(&self, file_name: &str, bytes: Vec<u8>) -> Result<PathBuf> {
        self.byte_saves
            .lock()
            .unwrap()
            .push((file_name.to_string(), bytes));
        Ok(PathBuf::from("/downloads").join(file_name))
    }

    async fn save_from_url(&self, url: &str, file_name: &str) -> Result<PathBuf> {
        self.url_saves
            .lock()
            .unwrap()
            .push((url.to_string(), file_name.to_string()));
        if self.fail_url_saves {
            anyhow::bail!("blocked by content type");
        }
        Ok(PathBuf::from("/downloads").join(file_name))
    }
}

#[derive(Default)]
pub struct SilentPlayer {
    pub playing: Option<String>,
}

impl PreviewPlayer for SilentPlayer {
    fn play(&mut self, url: &str) -> Result<()> {
        self.playing = Some(url.to_string());
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = None;
    }

    fn finished(&mut self) -> bool {
        false
    }
}
