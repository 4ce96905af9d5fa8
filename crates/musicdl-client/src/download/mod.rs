//! Download orchestration.
//!
//! Turns the current selection into saved files. Each selected item runs
//! its own strategy chain, all items concurrently:
//!
//! 1. direct URL parses as absolute http(s): fetch the bytes and save them
//! 2. that failed: save straight from the URL with a cache-busting
//!    `timestamp` parameter
//! 3. direct URL does not parse: save straight from the raw text
//!
//! Only when no selected item has a direct URL at all is the whole batch
//! handed to the backend in one request. Per-item failures are logged and
//! never abort the batch; the backend rejecting is the one error that
//! reaches the user.
//!
//! ```text
//!  Idle ──run()──▶ Running ──attempts done──▶ Finalizing ──▶ Idle
//! ```

pub mod fetch;
pub mod save;


use chrono::Utc;
use futures_util::future::join_all;
use musicdl_proto::model::{IdentityKey, MediaItem};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{error, info, warn};
use url::Url;

use crate::backend::MusicBackend;
use crate::error::ControllerError;
use crate::notice::Notice;
use crate::progress::{ProgressReporter, ProgressSnapshot};
use crate::session::SessionState;
use fetch::MediaFetcher;
use save::MediaSaver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Finalizing,
}

/// What happened to one selected item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// Fetched and saved.
    Saved(PathBuf),
    /// Fetch or save failed; a save straight from `url` was attempted.
    ForcedSave { url: String, saved: bool },
    /// Direct URL was not an absolute URL; a save from the raw text was
    /// attempted.
    MalformedUrl { saved: bool },
    /// No direct URL; the item is left to the backend.
    NoDirectUrl,
}

impl ItemOutcome {
    pub fn saved_locally(&self) -> bool {
        match self {
            Self::Saved(_) => true,
            Self::ForcedSave { saved, .. } | Self::MalformedUrl { saved } => *saved,
            Self::NoDirectUrl => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub outcomes: Vec<(IdentityKey, ItemOutcome)>,
    /// At least one selected item had a direct URL.
    pub used_direct_urls: bool,
    pub backend_invoked: bool,
}

impl DownloadReport {
    pub fn item_count(&self) -> usize {
        self.outcomes.len()
    }

    pub fn saved_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.saved_locally())
            .count()
    }

    pub fn notice(&self) -> Notice {
        if self.used_direct_urls {
            Notice::success(format!(
                "Started downloading {} songs ({} saved locally), check the downloads folder",
                self.item_count(),
                self.saved_count()
            ))
        } else {
            Notice::success(format!("Started downloading {} songs", self.item_count()))
        }
    }
}

/// Direct URL usable for a fetch: absolute http(s).
pub fn absolute_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Append `timestamp=<millis>` so caches cannot answer instead of the origin.
pub fn cache_busted(url: &str, millis: i64) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}timestamp={}", url, separator, millis)
}

pub struct DownloadOrchestrator<F, S> {
    fetcher: F,
    saver: S,
    phase: watch::Sender<Phase>,
    progress: ProgressReporter,
}

impl<F: MediaFetcher, S: MediaSaver> DownloadOrchestrator<F, S> {
    pub fn new(fetcher: F, saver: S) -> Self {
        let (phase, _rx) = watch::channel(Phase::Idle);
        Self {
            fetcher,
            saver,
            phase,
            progress: ProgressReporter::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress.subscribe()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Download everything selected in `state`.
    ///
    /// On success every selected item is recorded in the download history
    /// and the selection is cleared, whatever the individual outcomes.
    pub async fn run<B: MusicBackend>(
        &self,
        state: &mut SessionState,
        backend: &B,
    ) -> Result<DownloadReport, ControllerError> {
        if state.selection.is_empty() {
            return Err(ControllerError::EmptySelection);
        }
        let phase = PhaseGuard::enter(&self.phase).ok_or(ControllerError::AlreadyRunning)?;
        let progress = self.progress.start();

        let items = state.selection.snapshot();
        let used_direct_urls = items.iter().any(MediaItem::has_direct_url);
        info!(
            "Downloading {} items ({})",
            items.len(),
            if used_direct_urls { "direct" } else { "backend" }
        );

        let outcomes = join_all(items.iter().map(|item| self.attempt(item))).await;
        let outcomes: Vec<_> = items.iter().map(MediaItem::key).zip(outcomes).collect();

        let mut backend_invoked = false;
        if !used_direct_urls {
            backend_invoked = true;
            if let Err(e) = backend.download(&items).await {
                error!("Backend download rejected: {:#}", e);
                phase.set(Phase::Finalizing);
                progress.abandon();
                return Err(ControllerError::BackendRejected(e.to_string()));
            }
        }

        phase.set(Phase::Finalizing);
        progress.complete();

        for item in &items {
            state.history.record_download(item);
        }
        state.selection.clear();

        Ok(DownloadReport {
            outcomes,
            used_direct_urls,
            backend_invoked,
        })
    }

    /// Strategy chain for one item. Never fails; the outcome says how far
    /// it got.
    async fn attempt(&self, item: &MediaItem) -> ItemOutcome {
        let Some(raw) = item.direct_url() else {
            return ItemOutcome::NoDirectUrl;
        };
        let file_name = item.file_name();

        let Some(url) = absolute_url(raw) else {
            warn!("Invalid download URL for {}: {:?}", item.key(), raw);
            let saved = match self.saver.save_from_url(raw, &file_name).await {
                Ok(_) => true,
                Err(e) => {
                    warn!("Save from invalid URL failed for {}: {:#}", item.key(), e);
                    false
                }
            };
            return ItemOutcome::MalformedUrl { saved };
        };

        match self.fetch_and_save(url.as_str(), &file_name).await {
            Ok(path) => return ItemOutcome::Saved(path),
            Err(e) => warn!("Direct download failed for {}: {:#}", item.key(), e),
        }

        let forced = cache_busted(raw.trim(), Utc::now().timestamp_millis());
        let saved = match self.saver.save_from_url(&forced, &file_name).await {
            Ok(path) => {
                info!("Forced save succeeded: {}", path.display());
                true
            }
            Err(e) => {
                warn!("Forced save failed for {}: {:#}", item.key(), e);
                false
            }
        };
        ItemOutcome::ForcedSave { url: forced, saved }
    }

    async fn fetch_and_save(&self, url: &str, file_name: &str) -> anyhow::Result<PathBuf> {
        let bytes = self.fetcher.fetch(url).await?;
        self.saver.save_bytes(file_name, bytes).await
    }
}

/// Holds the orchestrator out of `Idle`; dropping it returns to `Idle` on
/// every exit path.
struct PhaseGuard<'a> {
    phase: &'a watch::Sender<Phase>,
}

impl<'a> PhaseGuard<'a> {
    fn enter(phase: &'a watch::Sender<Phase>) -> Option<Self> {
        let entered = phase.send_if_modified(|current| {
            if *current != Phase::Idle {
                return false;
            }
            *current = Phase::Running;
            true
        });
        entered.then_some(Self { phase })
    }

    fn set(&self, next: Phase) {
        self.phase.send_replace(next);
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.phase.send_replace(Phase::Idle);
    }
}
