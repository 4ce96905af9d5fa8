mod backend;
mod download;
mod error;
mod notice;
mod preview;
mod progress;
mod selection;
mod session;
mod shell;
#[cfg(test)]
mod testing;

use clap::Parser;
use musicdl_proto::config::Config;
use musicdl_proto::history::HistoryStore;
use musicdl_proto::storage::{FileStore, KeyValueStore, MemoryStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use backend::HttpBackend;
use download::fetch::{media_client, HttpFetcher};
use download::save::FsSaver;
use download::DownloadOrchestrator;
use preview::{MpvPreview, PreviewController};
use session::{Session, SessionState};

#[derive(Parser, Debug)]
#[command(author, version, about = "Search, preview and download music", long_about = None)]
struct Args {
    /// Base URL of the search/download service
    #[arg(long)]
    api_url: Option<String>,

    /// Directory downloaded songs are saved to
    #[arg(long)]
    downloads_dir: Option<PathBuf>,

    /// Sources to search, comma separated (default: from config)
    #[arg(long, value_delimiter = ',')]
    sources: Vec<String>,

    /// Keep history in memory only
    #[arg(long)]
    ephemeral: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load().unwrap_or_default();
    if let Some(url) = args.api_url {
        config.api.base_url = url;
    }
    if let Some(dir) = args.downloads_dir {
        config.paths.downloads_dir = dir;
    }

    let data_dir = config.paths.data_dir.clone();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("musicdl.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG wins; HTTP client internals stay quiet by default
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("musicdl log: {}", log_path.display());
    tracing::info!("musicdl starting…");

    let store: Arc<dyn KeyValueStore> = if args.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FileStore::new(&data_dir))
    };
    let history = HistoryStore::load(store);

    let backend = HttpBackend::new(
        &config.api.base_url,
        Duration::from_secs(config.api.timeout_secs),
    )?;
    let client = media_client()?;
    let orchestrator = DownloadOrchestrator::new(
        HttpFetcher::new(client.clone()),
        FsSaver::new(config.paths.downloads_dir.clone(), client),
    );
    let preview = PreviewController::new(MpvPreview::new(config.preview.player.clone()));

    let mut session = Session::new(
        SessionState::new(history, Vec::new()),
        backend,
        orchestrator,
        preview,
    );

    let defaults = if args.sources.is_empty() {
        config.sources.default_sources.clone()
    } else {
        args.sources
    };
    println!("{}", session.discover_sources(&defaults).await);
    tracing::info!(
        "Saving to {}, searching {:?}",
        config.paths.downloads_dir.display(),
        session.state.sources
    );

    shell::Shell::new(session).run().await
}
