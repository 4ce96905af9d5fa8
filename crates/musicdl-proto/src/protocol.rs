//! Wire format of the musicdl search/download service.
//!
//! Field names follow the service's JSON exactly; the client-side model in
//! [`crate::model`] is built from these.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const SOURCES_PATH: &str = "/api/music-sources";
pub const SEARCH_PATH: &str = "/api/search";
pub const PLAYLIST_PATH: &str = "/api/parse-playlist";
pub const DOWNLOAD_PATH: &str = "/api/download";
pub const CONFIG_PATH: &str = "/api/config";
pub const HEALTH_PATH: &str = "/api/health";

/// One song as the service describes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SongInfo {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub song_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub singers: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Accept any JSON scalar or structure where text is expected; non-strings
/// are coerced to their JSON text.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesResponse {
    #[serde(default)]
    pub music_sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub keyword: String,
    pub music_sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub source: String,
    pub index: usize,
    #[serde(default)]
    pub song_info: SongInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistRequest {
    pub playlist_url: String,
    pub music_sources: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistResponse {
    #[serde(default)]
    pub results: Vec<SongInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub song_infos: Vec<SongInfo>,
}

/// `{"ok": true}` acknowledgement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRequest {
    pub music_sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_music_clients_cfg: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub music_sources: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: String,
}

/// Error body the service returns with non-2xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_response_parses_service_payload() {
        let payload = json!({
            "results": [
                {"source": "KuwoMusicClient", "index": 0, "song_info": {
                    "song_name": "晴天", "singers": "周杰伦", "ext": "mp3",
                    "download_url": "https://cdn.example/a.mp3", "duration_s": 269
                }},
                {"source": "QQMusicClient", "index": 1, "song_info": {"song_name": "x"}}
            ]
        });
        let response: SearchResponse = serde_json::from_value(payload).unwrap();
        assert_eq!(response.results.len(), 2);
        let first = &response.results[0].song_info;
        assert_eq!(first.singers.as_deref(), Some("周杰伦"));
        assert_eq!(first.extra.get("duration_s"), Some(&json!(269)));
        assert!(response.results[1].song_info.download_url.is_none());
    }

    #[test]
    fn non_string_download_url_is_coerced_to_text() {
        let info: SongInfo =
            serde_json::from_value(json!({"download_url": {"url": "x"}})).unwrap();
        assert_eq!(info.download_url.as_deref(), Some(r#"{"url":"x"}"#));

        let info: SongInfo = serde_json::from_value(json!({"download_url": null})).unwrap();
        assert!(info.download_url.is_none());
    }
}
