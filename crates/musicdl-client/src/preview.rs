//! Single-slot audio preview.
//!
//! At most one item previews at a time. Starting another item stops the
//! current one first; toggling the active item stops it; playback running
//! to its end clears the slot.

use musicdl_proto::model::{IdentityKey, MediaItem};
use std::path::PathBuf;
use std::process::Stdio;
use tracing::{debug, info, warn};

/// Something that can play one URL at a time.
pub trait PreviewPlayer {
    fn play(&mut self, url: &str) -> anyhow::Result<()>;
    fn pause(&mut self);
    /// True once, after the current playback ran to its end on its own.
    fn finished(&mut self) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PreviewChange {
    Started(IdentityKey),
    Stopped(IdentityKey),
    /// Item has no direct URL; nothing changed.
    Unavailable,
    /// Player refused; the slot is now empty.
    Failed(String),
}

pub struct PreviewController<P> {
    player: P,
    active: Option<IdentityKey>,
}

impl<P: PreviewPlayer> PreviewController<P> {
    pub fn new(player: P) -> Self {
        Self {
            player,
            active: None,
        }
    }

    pub fn active(&self) -> Option<&IdentityKey> {
        self.active.as_ref()
    }

    pub fn toggle(&mut self, item: &MediaItem) -> PreviewChange {
        let key = item.key();
        if self.active.as_ref() == Some(&key) {
            self.player.pause();
            self.active = None;
            return PreviewChange::Stopped(key);
        }

        let Some(url) = item.direct_url() else {
            return PreviewChange::Unavailable;
        };

        if let Some(previous) = self.active.take() {
            debug!("Stopping preview {} before {}", previous, key);
            self.player.pause();
        }

        match self.player.play(url) {
            Ok(()) => {
                info!("Previewing {}", key);
                self.active = Some(key.clone());
                PreviewChange::Started(key)
            }
            Err(e) => {
                warn!("Preview of {} failed: {:#}", key, e);
                PreviewChange::Failed(e.to_string())
            }
        }
    }

    pub fn stop(&mut self) -> Option<IdentityKey> {
        let key = self.active.take()?;
        self.player.pause();
        Some(key)
    }

    /// Clear the slot if playback ended by itself; returns the finished key.
    pub fn poll_finished(&mut self) -> Option<IdentityKey> {
        if self.active.is_some() && self.player.finished() {
            return self.active.take();
        }
        None
    }

    /// A new batch replaced the old one: keep playing only if the active
    /// item is still part of it.
    pub fn retain_in(&mut self, batch: &[MediaItem]) -> Option<IdentityKey> {
        let active = self.active.as_ref()?;
        if batch.iter().any(|item| &item.key() == active) {
            return None;
        }
        self.stop()
    }
}

/// Plays previews through an `mpv --no-video` child process.
pub struct MpvPreview {
    binary: Option<PathBuf>,
    child: Option<tokio::process::Child>,
}

impl MpvPreview {
    /// Use `binary` when given, otherwise look mpv up at play time.
    pub fn new(binary: Option<PathBuf>) -> Self {
        Self {
            binary,
            child: None,
        }
    }

    fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                debug!("mpv preview already gone: {}", e);
            }
        }
    }
}

impl PreviewPlayer for MpvPreview {
    fn play(&mut self, url: &str) -> anyhow::Result<()> {
        self.kill();

        let binary = self
            .binary
            .clone()
            .or_else(musicdl_proto::platform::find_mpv_binary)
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;

        let child = tokio::process::Command::new(&binary)
            .arg("--no-video")
            .arg("--really-quiet")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        info!("mpv preview: spawned pid {:?}", child.id());
        self.child = Some(child);
        Ok(())
    }

    fn pause(&mut self) {
        self.kill();
    }

    fn finished(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => false,
            Ok(Some(status)) => {
                debug!("mpv preview exited: {}", status);
                self.child = None;
                true
            }
            Err(e) => {
                warn!("mpv preview status check failed: {}", e);
                self.child = None;
                true
            }
        }
    }
}

impl Drop for MpvPreview {
    fn drop(&mut self) {
        self.kill();
    }
}
