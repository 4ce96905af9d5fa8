//! Session controller: the current batch, what is selected from it, the
//! histories, and the collaborators that act on them.

use musicdl_proto::history::HistoryStore;
use musicdl_proto::model::{IdentityKey, MediaItem};
use tracing::{error, info, warn};

use crate::backend::MusicBackend;
use crate::download::fetch::MediaFetcher;
use crate::download::save::MediaSaver;
use crate::download::{DownloadOrchestrator, DownloadReport};
use crate::error::ControllerError;
use crate::notice::Notice;
use crate::preview::{PreviewChange, PreviewController, PreviewPlayer};
use crate::selection::SelectionRegistry;

/// Everything a download run reads and mutates.
pub struct SessionState {
    /// Items shown to the user, in backend order.
    pub batch: Vec<MediaItem>,
    pub selection: SelectionRegistry,
    pub history: HistoryStore,
    /// Sources searches are restricted to.
    pub sources: Vec<String>,
    /// Sources the backend advertised; empty until discovery succeeds.
    pub available_sources: Vec<String>,
}

impl SessionState {
    pub fn new(history: HistoryStore, sources: Vec<String>) -> Self {
        Self {
            batch: Vec::new(),
            selection: SelectionRegistry::new(),
            history,
            sources,
            available_sources: Vec::new(),
        }
    }

    /// Swap in a new batch. The old selection does not carry over.
    pub fn replace_batch(&mut self, batch: Vec<MediaItem>) {
        self.batch = batch;
        self.selection.clear();
    }
}

pub struct Session<B, F, S, P> {
    pub state: SessionState,
    backend: B,
    orchestrator: DownloadOrchestrator<F, S>,
    preview: PreviewController<P>,
}

impl<B, F, S, P> Session<B, F, S, P>
where
    B: MusicBackend,
    F: MediaFetcher,
    S: MediaSaver,
    P: PreviewPlayer,
{
    pub fn new(
        state: SessionState,
        backend: B,
        orchestrator: DownloadOrchestrator<F, S>,
        preview: PreviewController<P>,
    ) -> Self {
        Self {
            state,
            backend,
            orchestrator,
            preview,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn orchestrator(&self) -> &DownloadOrchestrator<F, S> {
        &self.orchestrator
    }

    pub fn previewing(&self) -> Option<&IdentityKey> {
        self.preview.active()
    }

    /// Ask the backend which sources exist and keep the defaults it knows.
    /// Without an answer the defaults are used as they are.
    pub async fn discover_sources(&mut self, defaults: &[String]) -> Notice {
        match self.backend.list_sources().await {
            Ok(available) => {
                let chosen: Vec<String> = defaults
                    .iter()
                    .filter(|name| available.contains(name))
                    .cloned()
                    .collect();
                info!(
                    "Backend offers {} sources, {} preselected",
                    available.len(),
                    chosen.len()
                );
                let notice = Notice::info(format!(
                    "{} sources available, searching {}",
                    available.len(),
                    chosen.join(", ")
                ));
                self.state.available_sources = available;
                self.state.sources = chosen;
                notice
            }
            Err(e) => {
                warn!("Failed to fetch music sources: {:#}", e);
                self.state.sources = defaults.to_vec();
                Notice::warning("Failed to fetch music sources, using configured defaults")
            }
        }
    }

    /// Restrict searches to `names`. Names the backend never advertised
    /// are dropped when the advertised list is known.
    pub fn use_sources(&mut self, names: &[String]) -> Notice {
        let known = &self.state.available_sources;
        let (kept, unknown): (Vec<String>, Vec<String>) = names
            .iter()
            .cloned()
            .partition(|name| known.is_empty() || known.contains(name));
        self.state.sources = kept;

        if unknown.is_empty() {
            Notice::info(format!("Searching {}", self.state.sources.join(", ")))
        } else {
            Notice::warning(format!("Unknown sources ignored: {}", unknown.join(", ")))
        }
    }

    pub async fn search(&mut self, term: &str) -> Result<Notice, ControllerError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(ControllerError::EmptySearchTerm);
        }
        self.state.history.record_search(term);

        match self.backend.search(term, &self.state.sources).await {
            Ok(items) => {
                let count = items.len();
                self.replace_batch(items);
                Ok(Notice::success(format!("Found {} songs", count)))
            }
            Err(e) => {
                error!("Search for {:?} failed: {:#}", term, e);
                Err(ControllerError::SearchFailed(e.to_string()))
            }
        }
    }

    pub async fn parse_playlist(&mut self, url: &str) -> Result<Notice, ControllerError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ControllerError::EmptyPlaylistUrl);
        }

        match self.backend.parse_playlist(url, &self.state.sources).await {
            Ok(items) => {
                let count = items.len();
                self.replace_batch(items);
                Ok(Notice::success(format!(
                    "Playlist parsed, found {} songs",
                    count
                )))
            }
            Err(e) => {
                error!("Playlist {:?} failed: {:#}", url, e);
                Err(ControllerError::PlaylistFailed(e.to_string()))
            }
        }
    }

    /// Rerun the search at `position` in the search history (newest is 0).
    pub async fn rerun_search(&mut self, position: usize) -> Result<Notice, ControllerError> {
        let Some(term) = self
            .state
            .history
            .searches
            .records()
            .get(position)
            .map(|record| record.term.clone())
        else {
            return Ok(Notice::warning(format!(
                "No search history entry {}",
                position + 1
            )));
        };
        self.search(&term).await
    }

    fn replace_batch(&mut self, items: Vec<MediaItem>) {
        if let Some(stopped) = self.preview.retain_in(&items) {
            info!("Preview {} left with the old batch", stopped);
        }
        self.state.replace_batch(items);
    }

    /// Select or unselect the item at `row` of the current batch.
    pub fn toggle(&mut self, row: usize, included: bool) -> Option<IdentityKey> {
        let item = self.state.batch.get(row)?;
        self.state.selection.toggle(item, included);
        Some(item.key())
    }

    pub fn select_all(&mut self, included: bool) {
        if included {
            self.state.selection.select_all(&self.state.batch);
        } else {
            self.state.selection.clear();
        }
    }

    pub async fn download(&mut self) -> Result<DownloadReport, ControllerError> {
        self.orchestrator.run(&mut self.state, &self.backend).await
    }

    pub fn toggle_preview(&mut self, row: usize) -> Option<PreviewChange> {
        let item = self.state.batch.get(row)?;
        Some(self.preview.toggle(item))
    }

    pub fn stop_preview(&mut self) -> Option<IdentityKey> {
        self.preview.stop()
    }

    /// Clear the preview slot when playback ended on its own.
    pub fn poll_preview(&mut self) -> Option<IdentityKey> {
        self.preview.poll_finished()
    }

    pub fn clear_search_history(&mut self) -> Notice {
        self.state.history.searches.clear();
        Notice::info("Search history cleared")
    }

    pub fn clear_download_history(&mut self) -> Notice {
        self.state.history.downloads.clear();
        Notice::info("Download history cleared")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{empty_state, song, FakeBackend, FakeFetcher, RecordingSaver, SilentPlayer};

    type TestSession = Session<FakeBackend, FakeFetcher, RecordingSaver, SilentPlayer>;

    fn session(backend: FakeBackend) -> TestSession {
        Session::new(
            empty_state(),
            backend,
            DownloadOrchestrator::new(FakeFetcher::default(), RecordingSaver::default()),
            PreviewController::new(SilentPlayer::default()),
        )
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn discovery_keeps_only_advertised_defaults() {
        let mut session = session(FakeBackend {
            sources: names(&["QQMusicClient", "KuwoMusicClient", "JamendoMusicClient"]),
            ..FakeBackend::default()
        });

        session
            .discover_sources(&names(&["MiguMusicClient", "QQMusicClient", "KuwoMusicClient"]))
            .await;

        assert_eq!(session.state.sources, names(&["QQMusicClient", "KuwoMusicClient"]));
        assert_eq!(session.state.available_sources.len(), 3);
    }

    #[tokio::test]
    async fn discovery_failure_falls_back_to_defaults() {
        let mut session = session(FakeBackend {
            fail_lookups: true,
            ..FakeBackend::default()
        });
        let defaults = names(&["MiguMusicClient", "QQMusicClient"]);

        let notice = session.discover_sources(&defaults).await;

        assert_eq!(session.state.sources, defaults);
        assert_eq!(notice.severity, crate::notice::Severity::Warning);
    }

    #[tokio::test]
    async fn blank_search_is_rejected_before_any_request() {
        let backend = FakeBackend::default();
        let mut session = session(backend.clone());

        assert_eq!(
            session.search("   ").await,
            Err(ControllerError::EmptySearchTerm)
        );
        assert!(backend.searches.lock().unwrap().is_empty());
        assert!(session.state.history.searches.is_empty());
    }

    #[tokio::test]
    async fn search_replaces_batch_and_clears_selection() {
        let backend = FakeBackend {
            results: vec![song("X", 0, None), song("X", 1, None)],
            ..FakeBackend::default()
        };
        let mut session = session(backend.clone());
        session.state.sources = names(&["X"]);
        session.state.replace_batch(vec![song("Y", 7, None)]);
        session.toggle(0, true);

        let notice = session.search("  hello  ").await.unwrap();

        assert_eq!(notice.message, "Found 2 songs");
        assert_eq!(session.state.batch.len(), 2);
        assert!(session.state.selection.is_empty());
        assert_eq!(
            backend.searches.lock().unwrap()[0],
            ("hello".to_string(), names(&["X"]))
        );
        assert_eq!(session.state.history.searches.records()[0].term, "hello");
    }

    #[tokio::test]
    async fn failed_search_still_records_the_term() {
        let mut session = session(FakeBackend {
            fail_lookups: true,
            ..FakeBackend::default()
        });

        let result = session.search("jay chou").await;

        assert!(matches!(result, Err(ControllerError::SearchFailed(_))));
        assert_eq!(session.state.history.searches.len(), 1);
    }

    #[tokio::test]
    async fn rerun_uses_the_stored_term() {
        let backend = FakeBackend::default();
        let mut session = session(backend.clone());
        session.search("first").await.unwrap();
        session.search("second").await.unwrap();

        session.rerun_search(1).await.unwrap();

        let searches = backend.searches.lock().unwrap();
        assert_eq!(searches.last().unwrap().0, "first");
        drop(searches);
        assert_eq!(session.state.history.searches.records()[0].term, "first");

        let missing = session.rerun_search(9).await.unwrap();
        assert_eq!(missing.severity, crate::notice::Severity::Warning);
    }

    #[tokio::test]
    async fn blank_playlist_url_is_rejected() {
        let mut session = session(FakeBackend::default());
        assert_eq!(
            session.parse_playlist("").await,
            Err(ControllerError::EmptyPlaylistUrl)
        );
    }

    #[tokio::test]
    async fn toggling_by_row_tracks_identity() {
        let mut session = session(FakeBackend::default());
        session
            .state
            .replace_batch(vec![song("X", 0, None), song("X", 1, None)]);

        assert_eq!(session.toggle(1, true), Some(song("X", 1, None).key()));
        assert_eq!(session.toggle(5, true), None);
        assert_eq!(session.state.selection.len(), 1);

        session.select_all(true);
        assert_eq!(session.state.selection.len(), 2);
        session.select_all(false);
        assert!(session.state.selection.is_empty());
    }

    #[tokio::test]
    async fn preview_survives_a_batch_that_still_contains_it() {
        let a = song("X", 0, Some("https://cdn/a.mp3"));
        let backend = FakeBackend {
            results: vec![a.clone()],
            ..FakeBackend::default()
        };
        let mut session = session(backend);
        session.state.replace_batch(vec![a.clone()]);

        assert_eq!(
            session.toggle_preview(0),
            Some(PreviewChange::Started(a.key()))
        );
        session.search("again").await.unwrap();
        assert_eq!(session.previewing(), Some(&a.key()));
    }

    #[tokio::test]
    async fn preview_stops_when_batch_drops_it() {
        let a = song("X", 0, Some("https://cdn/a.mp3"));
        let backend = FakeBackend {
            results: vec![song("Y", 3, None)],
            ..FakeBackend::default()
        };
        let mut session = session(backend);
        session.state.replace_batch(vec![a]);
        session.toggle_preview(0);

        session.search("other").await.unwrap();
        assert_eq!(session.previewing(), None);
    }

    #[tokio::test]
    async fn use_sources_ignores_unadvertised_names() {
        let mut session = session(FakeBackend::default());
        session.state.available_sources = names(&["A", "B"]);

        let notice = session.use_sources(&names(&["B", "Z"]));

        assert_eq!(session.state.sources, names(&["B"]));
        assert!(notice.message.contains('Z'));
    }

    #[tokio::test]
    async fn download_goes_through_the_orchestrator() {
        let backend = FakeBackend::default();
        let mut session = session(backend.clone());
        session
            .state
            .replace_batch(vec![song("X", 0, None), song("X", 1, None)]);
        session.select_all(true);

        let report = session.download().await.unwrap();

        assert!(report.backend_invoked);
        assert_eq!(backend.download_calls().len(), 1);
        assert!(session.state.selection.is_empty());
        assert_eq!(session.state.history.downloads.len(), 2);
    }

    #[tokio::test]
    async fn clearing_history_empties_each_log() {
        let mut session = session(FakeBackend::default());
        session.search("term").await.unwrap();

        session.clear_search_history();
        assert!(session.state.history.searches.is_empty());
    }
}
