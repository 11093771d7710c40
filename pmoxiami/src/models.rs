//! Data structures for Xiami objects
//!
//! The same object comes in several shapes: a song returned by the detail
//! action carries `listenFile`, while songs nested in albums, playlists or
//! search results often only carry `listenFiles` or nothing playable at all.
//! Every field the server may omit is therefore optional, and ids or counts
//! are accepted both as numbers and as numeric strings.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// How long a fetched listen URL stays valid
pub const MEDIA_VALIDITY_SECS: i64 = 60 * 60;

/// Flexible id deserializer (string or integer)
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(Error::custom("ID must be a string or number")),
    }
}

/// Optional variant of [`deserialize_id`]; `null` reads as `None`
pub(crate) fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        _ => Ok(None),
    }
}

/// Numbers sent as integers or numeric strings; anything else reads as `None`
fn deserialize_opt_number<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Lists that may be `null`
fn deserialize_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Represents a Xiami artist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    #[serde(rename = "artistId", deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "artistName")]
    pub name: String,
    #[serde(rename = "artistLogo", default)]
    pub cover: Option<String>,
    #[serde(rename = "description", default)]
    pub desc: Option<String>,
}

/// Audio quality levels, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// Lossless
    Shq,
    /// 320 kbps
    Hq,
    Sq,
    Lq,
}

impl Quality {
    /// Maps the server's one-letter quality code
    pub fn from_code(code: &str) -> Self {
        match code {
            "s" => Quality::Shq,
            "h" => Quality::Hq,
            "l" => Quality::Sq,
            "f" | "e" => Quality::Lq,
            other => {
                warn!("unknown quality {}", other);
                Quality::Lq
            }
        }
    }
}

/// One playable file of a song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenFile {
    #[serde(default)]
    pub quality: String,
    #[serde(rename = "listenFile", default)]
    pub url: String,
    #[serde(default)]
    pub format: String,
}

/// A resolved media URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub url: String,
    pub format: String,
    /// Read from the host name, e.g. `m320.xiami.net` → 320
    pub bitrate: Option<u32>,
}

impl Media {
    pub fn from_listen_file(file: &ListenFile) -> Self {
        Self {
            url: file.url.clone(),
            format: file.format.clone(),
            bitrate: bitrate_from_url(&file.url),
        }
    }
}

/// Extracts the bitrate encoded in a listen URL host (`http://m720.xiami.net/..`)
pub fn bitrate_from_url(url: &str) -> Option<u32> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host = rest.split(['/', '?']).next()?;
    let label = host.split('.').next()?;
    label.get(1..)?.parse().ok()
}

/// Represents a Xiami song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    #[serde(rename = "songId", deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "songName")]
    pub title: String,
    #[serde(rename = "mvId", default, deserialize_with = "deserialize_opt_id")]
    pub mv_id: Option<String>,
    /// Duration in milliseconds; some songs have none
    #[serde(rename = "length", default, deserialize_with = "deserialize_opt_number")]
    pub duration: Option<u64>,
    /// Direct URL, only present on the detail shape
    #[serde(rename = "listenFile", default)]
    pub url: Option<String>,
    #[serde(rename = "listenFiles", default, deserialize_with = "deserialize_list")]
    pub files: Vec<ListenFile>,
    #[serde(rename = "singerVOs", default, deserialize_with = "deserialize_list")]
    pub artists: Vec<Artist>,
    #[serde(rename = "albumId", default, deserialize_with = "deserialize_opt_id")]
    pub album_id: Option<String>,
    #[serde(rename = "albumName", default)]
    pub album_name: Option<String>,
    #[serde(rename = "albumLogo", default)]
    pub album_cover: Option<String>,
}

impl Song {
    /// Playable files by quality; files without URL are skipped
    pub fn media_by_quality(&self) -> BTreeMap<Quality, Media> {
        let mut mapping = BTreeMap::new();
        for file in self.files.iter().filter(|f| !f.url.is_empty()) {
            mapping.insert(Quality::from_code(&file.quality), Media::from_listen_file(file));
        }
        mapping
    }

    /// Qualities available for this song, best first
    pub fn list_quality(&self) -> Vec<Quality> {
        self.media_by_quality().into_keys().collect()
    }

    /// Best playable URL: `listenFile`, else the first listen file
    pub fn best_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or_else(|| self.files.iter().map(|f| f.url.as_str()).find(|u| !u.is_empty()))
    }
}

/// Represents a Xiami album
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    #[serde(rename = "albumId", deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "albumName")]
    pub name: String,
    #[serde(rename = "albumLogo", default)]
    pub cover: Option<String>,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub songs: Vec<Song>,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub artists: Vec<Artist>,
    #[serde(rename = "description", default)]
    pub desc: Option<String>,
}

/// Represents a Xiami playlist (collect)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    #[serde(rename = "listId", deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "userId", default, deserialize_with = "deserialize_opt_id")]
    pub user_id: Option<String>,
    #[serde(rename = "collectName")]
    pub name: String,
    #[serde(rename = "collectLogo", default)]
    pub cover: Option<String>,
    /// First songs only, see `XiamiClient::playlist_songs` for all of them
    #[serde(default, deserialize_with = "deserialize_list")]
    pub songs: Vec<Song>,
    /// Ids of every song
    #[serde(rename = "allSongs", default, deserialize_with = "deserialize_list")]
    pub all_songs: Vec<Value>,
    #[serde(rename = "description", default)]
    pub desc: Option<String>,
}

/// Represents a Xiami user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "userId", deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "nickName", default)]
    pub name: Option<String>,
    #[serde(rename = "accessToken", default)]
    pub access_token: Option<String>,
}

/// Represents a music video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mv {
    #[serde(rename = "mvId", deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "title")]
    pub name: String,
    #[serde(rename = "mvCover", default)]
    pub cover: Option<String>,
    #[serde(rename = "mp4Url", default)]
    pub media: Option<String>,
}

/// Search results; only the searched category is filled
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub q: String,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub songs: Vec<Song>,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub albums: Vec<Album>,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub artists: Vec<Artist>,
    #[serde(rename = "collects", default, deserialize_with = "deserialize_list")]
    pub playlists: Vec<Playlist>,
}

/// A song with the time its media URLs were fetched
///
/// Listen URLs expire about an hour after they are issued.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSong {
    pub song: Song,
    pub fetched_at: DateTime<Utc>,
}

impl CachedSong {
    pub fn new(song: Song) -> Self {
        Self::fetched_at(song, Utc::now())
    }

    pub fn fetched_at(song: Song, fetched_at: DateTime<Utc>) -> Self {
        Self { song, fetched_at }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.fetched_at + Duration::seconds(MEDIA_VALIDITY_SECS)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detail_song() -> Value {
        json!({
            "songId": 1795287087,
            "songName": "Song",
            "mvId": "",
            "length": "245000",
            "listenFile": "http://m128.xiami.net/a.mp3",
            "listenFiles": [
                {"quality": "l", "listenFile": "http://m128.xiami.net/a.mp3", "format": "mp3"},
                {"quality": "h", "listenFile": "http://m320.xiami.net/b.mp3", "format": "mp3"},
                {"quality": "s", "listenFile": "", "format": "flac"}
            ],
            "singerVOs": [{"artistId": "3110", "artistName": "Singer"}],
            "albumId": 2100387382,
            "albumName": "Album",
            "albumLogo": "http://img/a.jpg"
        })
    }

    #[test]
    fn test_song_detail_shape() {
        let song: Song = serde_json::from_value(detail_song()).unwrap();
        assert_eq!(song.id, "1795287087");
        assert_eq!(song.duration, Some(245000));
        assert_eq!(song.album_id.as_deref(), Some("2100387382"));
        assert_eq!(song.artists[0].id, "3110");
        assert_eq!(song.list_quality(), vec![Quality::Hq, Quality::Sq]);
        assert_eq!(
            song.media_by_quality()[&Quality::Hq].bitrate,
            Some(320)
        );
        assert_eq!(song.best_url(), Some("http://m128.xiami.net/a.mp3"));
    }

    #[test]
    fn test_nested_song_shape() {
        // forme minimale renvoyée dans les listes
        let song: Song = serde_json::from_value(json!({
            "songId": "7",
            "songName": "Nested",
            "listenFiles": null,
            "singerVOs": null
        }))
        .unwrap();
        assert!(song.files.is_empty());
        assert!(song.artists.is_empty());
        assert!(song.duration.is_none());
        assert!(song.best_url().is_none());
    }

    #[test]
    fn test_bitrate_from_url() {
        assert_eq!(bitrate_from_url("http://m720.xiami.net/x.mp3"), Some(720));
        assert_eq!(bitrate_from_url("https://m128.xiami.net"), Some(128));
        assert_eq!(bitrate_from_url("http://cdn.example.com/x"), None);
        assert_eq!(bitrate_from_url(""), None);
    }

    #[test]
    fn test_quality_from_code() {
        assert_eq!(Quality::from_code("s"), Quality::Shq);
        assert_eq!(Quality::from_code("e"), Quality::Lq);
        assert_eq!(Quality::from_code("?"), Quality::Lq);
    }

    #[test]
    fn test_playlist_and_search() {
        let playlist: Playlist = serde_json::from_value(json!({
            "listId": 42,
            "userId": "9",
            "collectName": "Mix",
            "songs": [{"songId": 1, "songName": "a"}],
            "allSongs": [1, 2, 3]
        }))
        .unwrap();
        assert_eq!(playlist.id, "42");
        assert_eq!(playlist.songs.len(), 1);
        assert_eq!(playlist.all_songs.len(), 3);

        let result: SearchResult = serde_json::from_value(json!({
            "songs": [{"songId": 1, "songName": "a"}],
            "pagingVO": {"page": "1"}
        }))
        .unwrap();
        assert_eq!(result.songs.len(), 1);
        assert!(result.albums.is_empty());
    }

    #[test]
    fn test_cached_song_expiry() {
        let song: Song = serde_json::from_value(detail_song()).unwrap();
        let fresh = CachedSong::new(song.clone());
        assert!(!fresh.is_expired());

        let old = CachedSong::fetched_at(song, Utc::now() - Duration::seconds(MEDIA_VALIDITY_SECS + 1));
        assert!(old.is_expired());
    }
}
