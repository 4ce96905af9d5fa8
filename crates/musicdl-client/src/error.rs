use thiserror::Error;

/// Failures the user gets told about. Everything else is logged and
/// absorbed where it happens.
#[derive(Debug, Error, PartialEq)]
pub enum ControllerError {
    #[error("please enter a search keyword")]
    EmptySearchTerm,

    #[error("please enter a playlist URL")]
    EmptyPlaylistUrl,

    #[error("please select songs to download")]
    EmptySelection,

    #[error("a download is already in progress")]
    AlreadyRunning,

    #[error("search failed: {0}")]
    SearchFailed(String),

    #[error("failed to parse playlist: {0}")]
    PlaylistFailed(String),

    #[error("download failed: {0}")]
    BackendRejected(String),
}

impl ControllerError {
    /// Raised before any I/O happened.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptySearchTerm | Self::EmptyPlaylistUrl | Self::EmptySelection
        )
    }
}
