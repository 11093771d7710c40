//! Catalog actions (search, songs, albums, artists, playlists, radio)

use super::{ApiResponse, XiamiApi};
use crate::error::{Result, XiamiError};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// The server answers at most this many songs per `getsongs` call
pub const SONGS_BATCH_SIZE: usize = 200;

/// Lyric entries of this type hold the plain-text lyric
const LRC_LYRIC_TYPE: i64 = 2;

/// Search categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchType {
    Song,
    Album,
    Artist,
    Playlist,
}

impl SearchType {
    /// Numeric code used by the Xiami clients (1, 10, 100, 1000)
    pub fn code(self) -> u32 {
        match self {
            SearchType::Song => 1,
            SearchType::Album => 10,
            SearchType::Artist => 100,
            SearchType::Playlist => 1000,
        }
    }

    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            1 => Ok(SearchType::Song),
            10 => Ok(SearchType::Album),
            100 => Ok(SearchType::Artist),
            1000 => Ok(SearchType::Playlist),
            other => Err(XiamiError::InvalidArgument(format!(
                "invalid search type: {}",
                other
            ))),
        }
    }

    pub fn action(self) -> &'static str {
        match self {
            SearchType::Song => "mtop.alimusic.search.searchservice.searchsongs",
            SearchType::Album => "mtop.alimusic.search.searchservice.searchalbums",
            SearchType::Artist => "mtop.alimusic.search.searchservice.searchartists",
            SearchType::Playlist => "mtop.alimusic.search.searchservice.searchcollects",
        }
    }

    /// Field of the search container holding the results
    pub fn result_field(self) -> &'static str {
        match self {
            SearchType::Song => "songs",
            SearchType::Album => "albums",
            SearchType::Artist => "artists",
            SearchType::Playlist => "collects",
        }
    }
}

impl FromStr for SearchType {
    type Err = XiamiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "song" | "songs" | "so" => Ok(SearchType::Song),
            "album" | "albums" | "al" => Ok(SearchType::Album),
            "artist" | "artists" | "ar" => Ok(SearchType::Artist),
            "playlist" | "playlists" | "pl" => Ok(SearchType::Playlist),
            other => Err(XiamiError::InvalidArgument(format!(
                "invalid search type: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.result_field())
    }
}

/// `pagingVO` request object
pub(crate) fn paging_vo(page: u32, page_size: u32) -> Value {
    json!({ "page": page, "pageSize": page_size })
}

/// `body.data.data` as a page container
///
/// `None` only for a successful answer without data; any other code is an
/// error so a paged sequence never mistakes it for the end of the list.
pub(crate) fn page_container(response: ApiResponse) -> Result<Option<Value>> {
    if !response.is_success() {
        return Err(XiamiError::UnexpectedCode {
            code: response.code.as_str().to_string(),
            message: response.message,
        });
    }
    Ok(response
        .body
        .get("data")
        .and_then(|d| d.get("data"))
        .filter(|d| !d.is_null())
        .cloned())
}

/// `body.data.data.<field>` as a list; `null` reads as empty
pub(crate) fn list_field(response: &ApiResponse, field: &str) -> Result<Vec<Value>> {
    match response.data_field(field)? {
        Value::Array(items) => Ok(items.clone()),
        Value::Null => Ok(Vec::new()),
        _ => Err(XiamiError::MalformedResponse(format!(
            "`{}` is not a list",
            field
        ))),
    }
}

impl XiamiApi {
    /// Searches the catalog and returns the raw search container
    pub fn search(
        &self,
        keyword: &str,
        type_: SearchType,
        page: u32,
        limit: u32,
    ) -> Result<Value> {
        debug!("Searching {} for '{}'", type_, keyword);
        let payload = json!({
            "key": keyword,
            "pagingVO": paging_vo(page, limit),
        });
        self.request(type_.action(), payload)?.into_data()
    }

    /// Returns the song detail, `None` when the server reports no success
    pub fn song_detail(&self, song_id: &str) -> Result<Option<Value>> {
        debug!("Fetching song {}", song_id);
        let action = "mtop.alimusic.music.songservice.getsongdetail";
        let response = self.request(action, json!({ "songId": song_id }))?;
        if !response.is_success() {
            return Ok(None);
        }
        response.data_field("songDetail").map(|v| Some(v.clone()))
    }

    /// Fetches several songs, [`SONGS_BATCH_SIZE`] ids per call
    pub fn songs_detail(&self, song_ids: &[String]) -> Result<Vec<Value>> {
        let action = "mtop.alimusic.music.songservice.getsongs";
        let mut songs = Vec::with_capacity(song_ids.len());

        for chunk in song_ids.chunks(SONGS_BATCH_SIZE) {
            debug!("Fetching {} songs", chunk.len());
            let response = self.request(action, json!({ "songIds": chunk }))?;
            songs.extend(list_field(&response, "songs")?);
        }

        Ok(songs)
    }

    /// Returns the plain-text lyric, or an empty string
    pub fn song_lyric(&self, song_id: &str) -> Result<String> {
        let action = "mtop.alimusic.music.lyricservice.getsonglyrics";
        let response = self.request(action, json!({ "songId": song_id }))?;

        for lyric in list_field(&response, "lyrics")? {
            let lyric_type = match lyric.get("type") {
                Some(Value::Number(n)) => n.as_i64(),
                Some(Value::String(s)) => s.trim().parse().ok(),
                _ => None,
            };
            if lyric_type == Some(LRC_LYRIC_TYPE) {
                let content = lyric.get("content").and_then(Value::as_str).unwrap_or("");
                return Ok(content.to_string());
            }
        }
        Ok(String::new())
    }

    /// Returns the MV detail; unknown ids give an empty object, hence `None`
    pub fn mv_detail(&self, mv_id: &str) -> Result<Option<Value>> {
        let action = "mtop.alimusic.music.mvservice.getmvdetail";
        let response = self.request(action, json!({ "mvId": mv_id }))?;
        Ok(response
            .data()?
            .get("mvDetailVO")
            .filter(|v| !v.is_null())
            .cloned())
    }

    pub fn album_detail(&self, album_id: &str) -> Result<Value> {
        debug!("Fetching album {}", album_id);
        let action = "mtop.alimusic.music.albumservice.getalbumdetail";
        let response = self.request(action, json!({ "albumId": album_id }))?;
        response.data_field("albumDetail").cloned()
    }

    pub fn artist_detail(&self, artist_id: &str) -> Result<Value> {
        debug!("Fetching artist {}", artist_id);
        let action = "mtop.alimusic.music.artistservice.getartistdetail";
        let response = self.request(action, json!({ "artistId": artist_id }))?;
        response.data_field("artistDetailVO").cloned()
    }

    /// One page of an artist's songs (`songs` + `pagingVO`)
    pub fn artist_songs(
        &self,
        artist_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Option<Value>> {
        let action = "mtop.alimusic.music.songservice.getartistsongs";
        let payload = json!({
            "artistId": artist_id,
            "pagingVO": paging_vo(page, page_size),
        });
        page_container(self.request(action, payload)?)
    }

    /// One page of an artist's albums (`albums` + `pagingVO`)
    pub fn artist_albums(
        &self,
        artist_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Option<Value>> {
        let action = "mtop.alimusic.music.albumservice.getartistalbums";
        let payload = json!({
            "artistId": artist_id,
            "pagingVO": paging_vo(page, page_size),
        });
        page_container(self.request(action, payload)?)
    }

    /// Playlist detail
    ///
    /// Past 100 songs the `songs` field is truncated; `allSongs` still lists
    /// every id. Use [`XiamiApi::playlist_songs`] to page through them.
    pub fn playlist_detail(&self, playlist_id: &str) -> Result<Value> {
        debug!("Fetching playlist {}", playlist_id);
        let action = "mtop.alimusic.music.list.collectservice.getcollectdetail";
        let response = self.request(action, json!({ "listId": playlist_id }))?;
        response.data_field("collectDetail").cloned()
    }

    /// One page of a playlist's songs
    ///
    /// The server caps `page_size` at 200 without saying so in the request;
    /// the `pagingVO` of the answer carries the size actually used.
    pub fn playlist_songs(
        &self,
        playlist_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Option<Value>> {
        let action = "mtop.alimusic.music.list.collectservice.getcollectsongs";
        let payload = json!({
            "listId": playlist_id,
            "pagingVO": paging_vo(page, page_size),
        });
        page_container(self.request(action, payload)?)
    }

    /// Songs of the personal radio
    pub fn personal_fm(&self) -> Result<Vec<Value>> {
        let action = "mtop.alimusic.music.radio.getradiosongs";
        let response = self.request(action, json!({ "radioType": 1 }))?;
        list_field(&response, "list")
    }

    /// Daily recommended songs, scoped by the access token
    pub fn recommend_songs(&self) -> Result<Vec<Value>> {
        let action = "mtop.alimusic.recommend.songservice.getdailysongs";
        let response = self.request(action, json!({}))?;
        list_field(&response, "songs")
    }

    /// Recommended playlists
    pub fn recommend_playlists(&self) -> Result<Vec<Value>> {
        let action = "mtop.alimusic.music.list.collectservice.getcollects";
        let response = self.request(action, json!({}))?;
        list_field(&response, "collects")
    }
}
