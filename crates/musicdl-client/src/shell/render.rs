//! Plain-text rendering for the shell: results table, histories and the
//! progress bar.

use chrono::Local;
use musicdl_proto::history::{DownloadHistoryRecord, SearchHistoryRecord};
use musicdl_proto::model::{IdentityKey, MediaItem};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::progress::ProgressSnapshot;
use crate::selection::SelectionRegistry;

const TITLE_W: usize = 28;
const ARTISTS_W: usize = 18;
const ALBUM_W: usize = 18;
const SOURCE_W: usize = 20;

/// Cut `text` to `width` terminal columns (ending in `…` when cut) and pad
/// it to exactly `width`.
pub fn fit(text: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    if text.width() <= width {
        out.push_str(text);
        used = text.width();
    } else {
        for ch in text.chars() {
            let w = ch.width().unwrap_or(0);
            if used + w > width - 1 {
                break;
            }
            out.push(ch);
            used += w;
        }
        out.push('…');
        used += 1;
    }
    out.extend(std::iter::repeat(' ').take(width.saturating_sub(used)));
    out
}

pub fn fmt_duration(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

pub fn fmt_size(bytes: u64) -> String {
    const MB: f64 = 1024.0 * 1024.0;
    if bytes as f64 >= MB {
        format!("{:.2} MB", bytes as f64 / MB)
    } else {
        format!("{:.0} KB", bytes as f64 / 1024.0)
    }
}

/// Numbered table of the current batch. `*` marks selected rows, `♪` the
/// previewing one.
pub fn results_table(
    batch: &[MediaItem],
    selection: &SelectionRegistry,
    previewing: Option<&IdentityKey>,
) -> String {
    if batch.is_empty() {
        return "No results.".to_string();
    }

    let mut out = format!(
        "{:>3}     {} {} {} {} {:>8} {:>10}\n",
        "#",
        fit("Title", TITLE_W),
        fit("Artists", ARTISTS_W),
        fit("Album", ALBUM_W),
        fit("Source", SOURCE_W),
        "Duration",
        "Size"
    );
    for (row, item) in batch.iter().enumerate() {
        let key = item.key();
        let selected = if selection.contains(&key) { '*' } else { ' ' };
        let playing = if previewing == Some(&key) { '♪' } else { ' ' };
        let url = if item.has_direct_url() { ' ' } else { '-' };
        out.push_str(&format!(
            "{:>3} {}{}{} {} {} {} {} {:>8} {:>10}\n",
            row + 1,
            selected,
            playing,
            url,
            fit(item.display_title(), TITLE_W),
            fit(item.display_artists(), ARTISTS_W),
            fit(item.album.as_deref().unwrap_or("-"), ALBUM_W),
            fit(&item.source, SOURCE_W),
            item.duration_secs.map(fmt_duration).unwrap_or_else(|| "-".into()),
            item.file_size_bytes.map(fmt_size).unwrap_or_else(|| "-".into()),
        ));
    }
    out.push_str(&format!(
        "{} results, {} selected",
        batch.len(),
        selection.len()
    ));
    out
}

pub fn search_history(records: &[SearchHistoryRecord]) -> String {
    if records.is_empty() {
        return "Search history is empty.".to_string();
    }
    records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "{:>3}  {}  {}",
                i + 1,
                r.observed_at.with_timezone(&Local).format("%m-%d %H:%M"),
                r.term
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn download_history(records: &[DownloadHistoryRecord]) -> String {
    if records.is_empty() {
        return "Download history is empty.".to_string();
    }
    records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "{:>3}  {}  {} {} [{}, {}]",
                i + 1,
                r.observed_at.with_timezone(&Local).format("%m-%d %H:%M"),
                fit(&r.title, TITLE_W),
                fit(&r.artists, ARTISTS_W),
                r.source,
                r.file_extension
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `[████▌     ]  45%` with eighth-cell resolution.
pub fn progress_bar(snapshot: ProgressSnapshot, width: usize) -> String {
    const BLOCKS: [char; 9] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

    let width = width.max(4);
    let eighths = snapshot.percent.min(100) as usize * width * 8 / 100;
    let full = eighths / 8;
    let partial = eighths % 8;

    let mut bar = String::with_capacity(width + 8);
    bar.push('[');
    bar.extend(std::iter::repeat('█').take(full));
    if full < width {
        bar.push(BLOCKS[partial]);
        bar.extend(std::iter::repeat(' ').take(width - full - 1));
    }
    bar.push(']');
    format!("{} {:>3}%", bar, snapshot.percent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressState;

    fn running(percent: u8) -> ProgressSnapshot {
        ProgressSnapshot {
            state: ProgressState::Running,
            percent,
        }
    }

    #[test]
    fn fit_pads_and_truncates_by_columns() {
        assert_eq!(fit("abc", 5), "abc  ");
        assert_eq!(fit("abcdef", 4), "abc…");
        // Wide characters take two columns each
        assert_eq!(fit("周杰伦演唱", 6), "周杰… ");
        assert_eq!(fit("周杰伦", 6).width(), 6);
    }

    #[test]
    fn durations_and_sizes() {
        assert_eq!(fmt_duration(59), "0:59");
        assert_eq!(fmt_duration(3725), "1:02:05");
        assert_eq!(fmt_size(3_690_987), "3.52 MB");
        assert_eq!(fmt_size(2048), "2 KB");
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(running(0), 10), "[          ]   0%");
        assert_eq!(progress_bar(running(50), 10), "[█████     ]  50%");
        assert_eq!(progress_bar(running(100), 10), "[██████████] 100%");
        assert_eq!(progress_bar(running(45), 10), "[████▌     ]  45%");
    }

    #[test]
    fn table_marks_selected_and_previewing_rows() {
        let a = MediaItem {
            source: "X".into(),
            index: 0,
            title: Some("Song".into()),
            direct_url: Some("https://x/a.mp3".into()),
            ..MediaItem::default()
        };
        let b = MediaItem {
            source: "X".into(),
            index: 1,
            ..MediaItem::default()
        };
        let mut selection = SelectionRegistry::new();
        selection.toggle(&b, true);

        let table = results_table(&[a.clone(), b], &selection, Some(&a.key()));
        let lines: Vec<_> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("  1  ♪  Song"));
        assert!(lines[2].starts_with("  2 * - unknown"));
        assert_eq!(lines[3], "2 results, 1 selected");
    }
}
