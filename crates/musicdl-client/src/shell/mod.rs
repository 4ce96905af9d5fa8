//! Line-oriented front end.
//!
//! Reads commands from stdin, prints notices and tables to stdout and the
//! progress bar to stderr. Preview playback is polled between commands so
//! a track that ends on its own frees the slot.

pub mod render;

use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::backend::HttpBackend;
use crate::download::fetch::MediaFetcher;
use crate::download::save::MediaSaver;
use crate::notice::Notice;
use crate::preview::{PreviewChange, PreviewPlayer};
use crate::progress::ProgressSnapshot;
use crate::session::Session;

const PREVIEW_POLL: Duration = Duration::from_millis(500);
const BAR_WIDTH: usize = 30;

const HELP: &str = "\
Commands:
  search <keyword>          search the selected sources
  playlist <url>            load the songs of a playlist
  sources                   list available and selected sources
  use <source>...           search only these sources
  list                      show the current results
  select <n>...             select rows (1-based)
  unselect <n>...           unselect rows
  all | none                select every row / clear the selection
  download                  download the selected songs
  preview [n]               play or stop a preview (no row: stop)
  history [searches|downloads]
  redo <n>                  rerun search history entry n
  clear-history [searches|downloads|all]
  health                    check the download service
  help | quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    Searches,
    Downloads,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Search(String),
    Playlist(String),
    Sources,
    Use(Vec<String>),
    List,
    Select(Vec<usize>),
    Unselect(Vec<usize>),
    SelectAll,
    SelectNone,
    Download,
    Preview(Option<usize>),
    History(HistoryKind),
    Redo(usize),
    ClearHistory(HistoryKind),
    Health,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`; row numbers are
    /// 1-based on input and 0-based in the result.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "search" | "s" => Self::Search(rest.to_string()),
            "playlist" | "pl" => Self::Playlist(rest.to_string()),
            "sources" => Self::Sources,
            "use" => Self::Use(
                rest.split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            "list" | "ls" => Self::List,
            "select" | "sel" => Self::Select(rows(rest)?),
            "unselect" | "unsel" => Self::Unselect(rows(rest)?),
            "all" => Self::SelectAll,
            "none" => Self::SelectNone,
            "download" | "dl" => Self::Download,
            "preview" | "p" => {
                if rest.is_empty() {
                    Self::Preview(None)
                } else {
                    Self::Preview(Some(row(rest)?))
                }
            }
            "history" | "h" => Self::History(history_kind(rest)?),
            "redo" => Self::Redo(row(rest)?),
            "clear-history" => Self::ClearHistory(history_kind(rest)?),
            "health" => Self::Health,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(format!("Unknown command '{}', try 'help'", other)),
        };
        Ok(Some(command))
    }
}

fn row(text: &str) -> Result<usize, String> {
    match text.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(format!("'{}' is not a row number", text.trim())),
    }
}

fn rows(text: &str) -> Result<Vec<usize>, String> {
    let parsed = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(row)
        .collect::<Result<Vec<_>, _>>()?;
    if parsed.is_empty() {
        return Err("expected one or more row numbers".to_string());
    }
    Ok(parsed)
}

fn history_kind(text: &str) -> Result<HistoryKind, String> {
    match text.trim() {
        "" | "all" => Ok(HistoryKind::Both),
        "searches" | "search" => Ok(HistoryKind::Searches),
        "downloads" | "download" => Ok(HistoryKind::Downloads),
        other => Err(format!("unknown history '{}'", other)),
    }
}

fn say(notice: &Notice) {
    println!("{}", notice);
}

/// Redraw the bar on stderr whenever the snapshot changes.
fn spawn_progress_printer(mut rx: watch::Receiver<ProgressSnapshot>) {
    tokio::spawn(async move {
        let mut shown = false;
        while rx.changed().await.is_ok() {
            let snapshot = *rx.borrow_and_update();
            let mut err = std::io::stderr().lock();
            if !snapshot.visible() {
                if shown {
                    let _ = writeln!(err);
                    shown = false;
                }
                continue;
            }
            let _ = write!(err, "\r{}", render::progress_bar(snapshot, BAR_WIDTH));
            let _ = err.flush();
            shown = true;
        }
    });
}

pub struct Shell<F, S, P> {
    session: Session<HttpBackend, F, S, P>,
}

impl<F, S, P> Shell<F, S, P>
where
    F: MediaFetcher,
    S: MediaSaver,
    P: PreviewPlayer,
{
    pub fn new(session: Session<HttpBackend, F, S, P>) -> Self {
        Self { session }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        spawn_progress_printer(self.session.orchestrator().subscribe_progress());

        println!("musicdl, backend at {}", self.session.backend().base_url());
        println!("Type 'help' for commands.");
        prompt();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut poll = tokio::time::interval(PREVIEW_POLL);

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    match Command::parse(&line) {
                        Ok(Some(Command::Quit)) => break,
                        Ok(Some(command)) => self.execute(command).await,
                        Ok(None) => {}
                        Err(message) => say(&Notice::warning(message)),
                    }
                    prompt();
                }
                _ = poll.tick() => {
                    if let Some(key) = self.session.poll_preview() {
                        println!();
                        say(&Notice::info(format!("Preview of {} finished", key)));
                        prompt();
                    }
                }
            }
        }

        if let Some(key) = self.session.stop_preview() {
            info!("Stopped preview {} on exit", key);
        }
        Ok(())
    }

    async fn execute(&mut self, command: Command) {
        match command {
            Command::Search(term) => {
                let outcome = self.session.search(&term).await;
                self.report_lookup(outcome);
            }
            Command::Playlist(url) => {
                let outcome = self.session.parse_playlist(&url).await;
                self.report_lookup(outcome);
            }
            Command::Redo(position) => {
                let outcome = self.session.rerun_search(position).await;
                self.report_lookup(outcome);
            }
            Command::Sources => {
                let state = &self.session.state;
                if state.available_sources.is_empty() {
                    println!("Available: (unknown)");
                } else {
                    println!("Available: {}", state.available_sources.join(", "));
                }
                println!("Searching: {}", state.sources.join(", "));
            }
            Command::Use(names) => {
                if names.is_empty() {
                    say(&Notice::warning("Name at least one source"));
                    return;
                }
                say(&self.session.use_sources(&names));
                match self
                    .session
                    .backend()
                    .configure(&self.session.state.sources)
                    .await
                {
                    Ok(active) => info!("Service now uses {:?}", active),
                    Err(e) => warn!("Service did not take the source list: {:#}", e),
                }
            }
            Command::List => self.print_results(),
            Command::Select(rows) => self.toggle_rows(&rows, true),
            Command::Unselect(rows) => self.toggle_rows(&rows, false),
            Command::SelectAll => {
                self.session.select_all(true);
                say(&Notice::info(format!(
                    "{} selected",
                    self.session.state.selection.len()
                )));
            }
            Command::SelectNone => {
                self.session.select_all(false);
                say(&Notice::info("Selection cleared"));
            }
            Command::Download => match self.session.download().await {
                Ok(report) => say(&report.notice()),
                Err(e) => say(&Notice::from(e)),
            },
            Command::Preview(None) => match self.session.stop_preview() {
                Some(key) => say(&Notice::info(format!("Stopped {}", key))),
                None => say(&Notice::info("Nothing is playing")),
            },
            Command::Preview(Some(row)) => match self.session.toggle_preview(row) {
                Some(PreviewChange::Started(key)) => {
                    say(&Notice::info(format!("Previewing {}", key)))
                }
                Some(PreviewChange::Stopped(key)) => {
                    say(&Notice::info(format!("Stopped {}", key)))
                }
                Some(PreviewChange::Unavailable) => {
                    say(&Notice::warning("No preview URL for this song"))
                }
                Some(PreviewChange::Failed(reason)) => {
                    say(&Notice::error(format!("Preview failed: {}", reason)))
                }
                None => say(&Notice::warning(format!("No row {}", row + 1))),
            },
            Command::History(kind) => {
                let history = &self.session.state.history;
                if kind != HistoryKind::Downloads {
                    println!("Searches:");
                    println!("{}", render::search_history(history.searches.records()));
                }
                if kind != HistoryKind::Searches {
                    println!("Downloads:");
                    println!("{}", render::download_history(history.downloads.records()));
                }
            }
            Command::ClearHistory(kind) => {
                if kind != HistoryKind::Downloads {
                    say(&self.session.clear_search_history());
                }
                if kind != HistoryKind::Searches {
                    say(&self.session.clear_download_history());
                }
            }
            Command::Health => match self.session.backend().health().await {
                Ok(status) => say(&Notice::success(format!("Service status: {}", status))),
                Err(e) => say(&Notice::error(format!("Service unreachable: {:#}", e))),
            },
            Command::Help => println!("{}", HELP),
            Command::Quit => {}
        }
    }

    fn report_lookup(&self, outcome: Result<Notice, crate::error::ControllerError>) {
        match outcome {
            Ok(notice) => {
                say(&notice);
                self.print_results();
            }
            Err(e) => say(&Notice::from(e)),
        }
    }

    fn print_results(&self) {
        let state = &self.session.state;
        println!(
            "{}",
            render::results_table(&state.batch, &state.selection, self.session.previewing())
        );
    }

    fn toggle_rows(&mut self, rows: &[usize], included: bool) {
        for &row in rows {
            if self.session.toggle(row, included).is_none() {
                say(&Notice::warning(format!("No row {}", row + 1)));
            }
        }
        say(&Notice::info(format!(
            "{} selected",
            self.session.state.selection.len()
        )));
    }
}

fn prompt() {
    print!("musicdl> ");
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_and_aliases() {
        assert_eq!(
            Command::parse("search  jay chou ").unwrap(),
            Some(Command::Search("jay chou".into()))
        );
        assert_eq!(Command::parse("dl").unwrap(), Some(Command::Download));
        assert_eq!(Command::parse("   ").unwrap(), None);
        assert_eq!(Command::parse("QUIT").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn rows_are_one_based_on_input() {
        assert_eq!(
            Command::parse("select 1, 3 4").unwrap(),
            Some(Command::Select(vec![0, 2, 3]))
        );
        assert!(Command::parse("select 0").is_err());
        assert!(Command::parse("select").is_err());
        assert_eq!(
            Command::parse("preview 2").unwrap(),
            Some(Command::Preview(Some(1)))
        );
        assert_eq!(Command::parse("preview").unwrap(), Some(Command::Preview(None)));
    }

    #[test]
    fn history_targets() {
        assert_eq!(
            Command::parse("history").unwrap(),
            Some(Command::History(HistoryKind::Both))
        );
        assert_eq!(
            Command::parse("clear-history downloads").unwrap(),
            Some(Command::ClearHistory(HistoryKind::Downloads))
        );
        assert!(Command::parse("history everything").is_err());
    }

    #[test]
    fn use_splits_on_commas_and_spaces() {
        assert_eq!(
            Command::parse("use QQMusicClient,KuwoMusicClient  MiguMusicClient").unwrap(),
            Some(Command::Use(vec![
                "QQMusicClient".into(),
                "KuwoMusicClient".into(),
                "MiguMusicClient".into()
            ]))
        );
    }

    #[test]
    fn blank_search_still_parses() {
        // Rejected later, with the session's own message
        assert_eq!(
            Command::parse("search").unwrap(),
            Some(Command::Search(String::new()))
        );
    }

    #[test]
    fn unknown_command_is_reported() {
        let err = Command::parse("fly away").unwrap_err();
        assert!(err.contains("fly"));
    }
}
