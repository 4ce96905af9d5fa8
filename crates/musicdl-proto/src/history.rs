//! Search and download history.
//!
//! Two independent logs, newest first, capped at [`HISTORY_LIMIT`] entries
//! and deduplicated by a per-log key. Every mutation rewrites the whole log
//! to storage; storage failures are logged and otherwise ignored, and a
//! missing or unreadable payload loads as an empty log.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::model::{MediaItem, UNKNOWN};
use crate::storage::KeyValueStore;

pub const HISTORY_LIMIT: usize = 10;
pub const SEARCH_HISTORY_KEY: &str = "searchHistory";
pub const DOWNLOAD_HISTORY_KEY: &str = "downloadHistory";

/// A record that can live in a [`HistoryLog`].
pub trait HistoryRecord: Clone + Serialize + DeserializeOwned {
    type Key: PartialEq;

    /// Two records with equal keys never coexist in one log.
    fn dedup_key(&self) -> Self::Key;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHistoryRecord {
    pub term: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub observed_at: DateTime<Utc>,
}

impl HistoryRecord for SearchHistoryRecord {
    type Key = String;

    fn dedup_key(&self) -> String {
        self.term.trim().to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadHistoryRecord {
    pub title: String,
    pub artists: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub observed_at: DateTime<Utc>,
    pub source: String,
    pub file_extension: String,
}

impl DownloadHistoryRecord {
    pub fn for_item(item: &MediaItem, observed_at: DateTime<Utc>) -> Self {
        let source = if item.source.trim().is_empty() {
            UNKNOWN.to_string()
        } else {
            item.source.clone()
        };
        Self {
            title: item.display_title().to_string(),
            artists: item.display_artists().to_string(),
            observed_at,
            source,
            file_extension: item
                .file_extension
                .as_deref()
                .map(str::trim)
                .filter(|ext| !ext.is_empty())
                .unwrap_or(UNKNOWN)
                .to_string(),
        }
    }
}

impl HistoryRecord for DownloadHistoryRecord {
    /// Same song from another source is still the same song.
    type Key = (String, String);

    fn dedup_key(&self) -> (String, String) {
        (self.title.clone(), self.artists.clone())
    }
}

/// One bounded, deduplicated, persisted log.
pub struct HistoryLog<R: HistoryRecord> {
    storage_key: &'static str,
    records: Vec<R>,
    store: Arc<dyn KeyValueStore>,
}

impl<R: HistoryRecord> HistoryLog<R> {
    /// Load the log stored under `storage_key`; failures yield an empty log.
    pub fn load(store: Arc<dyn KeyValueStore>, storage_key: &'static str) -> Self {
        let records = match store.get(storage_key) {
            Ok(Some(payload)) => match serde_json::from_str::<Vec<R>>(&payload) {
                Ok(mut records) => {
                    records.truncate(HISTORY_LIMIT);
                    records
                }
                Err(e) => {
                    warn!("Discarding unreadable {}: {}", storage_key, e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to load {}: {:#}", storage_key, e);
                Vec::new()
            }
        };
        debug!("Loaded {} {} records", records.len(), storage_key);

        Self {
            storage_key,
            records,
            store,
        }
    }

    /// Newest first.
    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop any record with the same key, prepend, keep the newest
    /// [`HISTORY_LIMIT`], persist.
    pub fn push(&mut self, record: R) {
        let key = record.dedup_key();
        self.records.retain(|existing| existing.dedup_key() != key);
        self.records.insert(0, record);
        self.records.truncate(HISTORY_LIMIT);
        self.persist();
    }

    pub fn clear(&mut self) {
        self.records.clear();
        if let Err(e) = self.store.remove(self.storage_key) {
            warn!("Failed to clear {}: {:#}", self.storage_key, e);
        }
    }

    fn persist(&self) {
        let json = match serde_json::to_string(&self.records) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialise {}: {}", self.storage_key, e);
                return;
            }
        };
        if let Err(e) = self.store.set(self.storage_key, &json) {
            warn!("Failed to save {}: {:#}", self.storage_key, e);
        }
    }
}

/// Both logs, sharing one storage backend.
pub struct HistoryStore {
    pub searches: HistoryLog<SearchHistoryRecord>,
    pub downloads: HistoryLog<DownloadHistoryRecord>,
}

impl HistoryStore {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            searches: HistoryLog::load(Arc::clone(&store), SEARCH_HISTORY_KEY),
            downloads: HistoryLog::load(store, DOWNLOAD_HISTORY_KEY),
        }
    }

    /// Record a search term, stamped now. Blank terms are ignored.
    pub fn record_search(&mut self, term: &str) {
        let term = term.trim();
        if term.is_empty() {
            return;
        }
        self.searches.push(SearchHistoryRecord {
            term: term.to_string(),
            observed_at: Utc::now(),
        });
    }

    /// Record a selected item as downloaded, stamped now.
    pub fn record_download(&mut self, item: &MediaItem) {
        self.downloads
            .push(DownloadHistoryRecord::for_item(item, Utc::now()));
    }
}
