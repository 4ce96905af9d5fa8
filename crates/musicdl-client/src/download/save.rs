//! Writing songs into the downloads directory.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

pub trait MediaSaver {
    /// Save already-fetched bytes under `file_name`.
    fn save_bytes(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<PathBuf>> + Send;

    /// Save straight from `url`. Best effort: the URL may not even parse.
    fn save_from_url(
        &self,
        url: &str,
        file_name: &str,
    ) -> impl Future<Output = Result<PathBuf>> + Send;
}

pub struct FsSaver {
    dir: PathBuf,
    client: reqwest::Client,
}

impl FsSaver {
    pub fn new(dir: PathBuf, client: reqwest::Client) -> Self {
        Self { dir, client }
    }
}

impl MediaSaver for FsSaver {
    async fn save_bytes(&self, file_name: &str, bytes: Vec<u8>) -> Result<PathBuf> {
        let dir = self.dir.clone();
        let target = dir.join(file_name);

        tokio::task::spawn_blocking(move || -> Result<PathBuf> {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            // Staged in a temp file that is deleted on drop unless persisted
            let mut staged = tempfile::NamedTempFile::new_in(&dir)
                .context("Failed to create staging file")?;
            staged.write_all(&bytes).context("Failed to write staging file")?;
            staged
                .persist(&target)
                .map_err(|e| e.error)
                .with_context(|| format!("Failed to save {}", target.display()))?;
            info!("Saved {}", target.display());
            Ok(target)
        })
        .await
        .context("Save task panicked")?
    }

    async fn save_from_url(&self, url: &str, file_name: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to request media")?;
        if !response.status().is_success() {
            anyhow::bail!("Media request returned status: {}", response.status());
        }

        // Each stream gets its own staging file; same-named items may run
        // side by side. The path is deleted on drop unless persisted.
        let staged = tempfile::NamedTempFile::new_in(&self.dir)
            .context("Failed to create staging file")?;
        let (file, staged_path) = staged.into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let mut written = 0usize;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Media stream interrupted")?;
            file.write_all(&chunk)
                .await
                .context("Failed to write staging file")?;
            written += chunk.len();
        }
        file.flush().await.context("Failed to write staging file")?;
        drop(file);

        let target = self.dir.join(file_name);
        staged_path
            .persist(&target)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to save {}", target.display()))?;
        debug!("Streamed {} bytes into {}", written, target.display());
        Ok(target)
    }
}
