//! Media items as the client sees them, plus the identity key every other
//! component is keyed by.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::protocol::SongInfo;

/// Placeholder for missing title, artists or source.
pub const UNKNOWN: &str = "unknown";

/// Extension used when the backend does not announce one.
pub const DEFAULT_EXTENSION: &str = "mp3";

/// Stable key naming one item of a result batch: `"<source>-<index>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn new(source: &str, index: usize) -> Self {
        Self(format!("{}-{}", source, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One search or playlist result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaItem {
    pub source: String,
    pub index: usize,
    pub title: Option<String>,
    pub artists: Option<String>,
    pub album: Option<String>,
    pub duration_secs: Option<u64>,
    pub file_size_bytes: Option<u64>,
    pub file_extension: Option<String>,
    /// Raw-bytes location, if the platform exposes one.
    pub direct_url: Option<String>,
    /// Everything else the backend sent, echoed back verbatim on
    /// backend downloads.
    pub extra: Map<String, Value>,
}

impl MediaItem {
    pub fn key(&self) -> IdentityKey {
        IdentityKey::new(&self.source, self.index)
    }

    /// Direct URL if present and non-blank.
    pub fn direct_url(&self) -> Option<&str> {
        self.direct_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
    }

    pub fn has_direct_url(&self) -> bool {
        self.direct_url().is_some()
    }

    pub fn display_title(&self) -> &str {
        non_empty(self.title.as_deref()).unwrap_or(UNKNOWN)
    }

    pub fn display_artists(&self) -> &str {
        non_empty(self.artists.as_deref()).unwrap_or(UNKNOWN)
    }

    pub fn extension(&self) -> &str {
        non_empty(self.file_extension.as_deref()).unwrap_or(DEFAULT_EXTENSION)
    }

    /// `"<title> - <artists>.<ext>"`, made safe for the local filesystem.
    pub fn file_name(&self) -> String {
        let stem = format!("{} - {}", self.display_title(), self.display_artists());
        format!("{}.{}", sanitize_file_name(&stem), sanitize_file_name(self.extension()))
    }

    /// Build an item from a backend payload at position `index` of `source`.
    pub fn from_wire(source: &str, index: usize, info: SongInfo) -> Self {
        let duration_secs = info
            .extra
            .get("duration_s")
            .and_then(parse_duration)
            .or_else(|| info.extra.get("duration").and_then(parse_duration));
        let file_size_bytes = info.extra.get("file_size").and_then(parse_file_size);

        Self {
            source: source.to_string(),
            index,
            title: info.song_name,
            artists: info.singers,
            album: info.album,
            duration_secs,
            file_size_bytes,
            file_extension: info.ext,
            direct_url: info.download_url,
            extra: info.extra,
        }
    }

    /// Descriptor handed back to the backend download service.
    pub fn to_wire(&self) -> SongInfo {
        SongInfo {
            source: Some(self.source.clone()),
            song_name: self.title.clone(),
            singers: self.artists.clone(),
            album: self.album.clone(),
            ext: self.file_extension.clone(),
            download_url: self.direct_url.clone(),
            extra: self.extra.clone(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Replace characters that are not allowed in file names.
pub fn sanitize_file_name(name: &str) -> String {
    name.trim()
        .replace(['/', '\\', ':', '?', '*', '"', '<', '>', '|'], "_")
}

/// Seconds from a number or `HH:MM:SS` / `MM:SS` text.
pub fn parse_duration(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            let mut total = 0u64;
            for part in s.split(':') {
                let n: u64 = part.trim().parse().ok()?;
                total = total.checked_mul(60)?.checked_add(n)?;
            }
            Some(total)
        }
        _ => None,
    }
}

/// Bytes from a number or text like `3.52MB` / `812 KB`. `"NULL"` is absent.
pub fn parse_file_size(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let s = s.trim();
            let split = s
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .unwrap_or(s.len());
            let (number, unit) = s.split_at(split);
            let number: f64 = number.parse().ok()?;
            let multiplier = match unit.trim().to_ascii_uppercase().as_str() {
                "" | "B" => 1.0,
                "KB" | "K" => 1024.0,
                "MB" | "M" => 1024.0 * 1024.0,
                "GB" | "G" => 1024.0 * 1024.0 * 1024.0,
                _ => return None,
            };
            Some((number * multiplier).round() as u64)
        }
        _ => None,
    }
}
