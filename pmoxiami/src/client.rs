//! Client principal pour interagir avec l'API Xiami
//!
//! [`XiamiClient`] wraps [`XiamiApi`] and converts the raw JSON trees into
//! the typed models. Collections that span several pages are exposed as
//! [`PagedSequence`]s.

use crate::api::XiamiApi;
use crate::api::auth::{AuthInfo, password_digest};
use crate::api::catalog::SearchType;
use crate::api::transport::Transport;
use crate::api::user::UpdateOp;
use crate::config::XiamiConfig;
use crate::error::{Result, XiamiError};
use crate::models::*;
use crate::paging::{PageCursor, PagedSequence};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

/// Page size for a user's favorite songs
pub const FAVORITE_SONGS_PAGE_SIZE: u32 = 50;

/// Page size for playlist songs, the largest the server accepts
pub const PLAYLIST_SONGS_PAGE_SIZE: u32 = 200;

/// Page size for an artist's songs
pub const ARTIST_SONGS_PAGE_SIZE: u32 = 50;

/// Page size for an artist's albums
pub const ARTIST_ALBUMS_PAGE_SIZE: u32 = 20;

/// Default number of search results per page
pub const SEARCH_LIMIT: u32 = 20;

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

fn from_values<T: DeserializeOwned>(values: Vec<Value>) -> Result<Vec<T>> {
    values.into_iter().map(from_value).collect()
}

/// Client Xiami haut-niveau
#[derive(Debug, Default)]
pub struct XiamiClient {
    api: XiamiApi,
}

impl XiamiClient {
    /// Crée un client anonyme avec la configuration par défaut
    ///
    /// # Exemple
    ///
    /// ```rust,no_run
    /// use pmoxiami::XiamiClient;
    ///
    /// let client = XiamiClient::new();
    /// if let Some(song) = client.get_song("1795287087")? {
    ///     println!("{} ({:?})", song.title, song.best_url());
    /// }
    /// # Ok::<(), pmoxiami::XiamiError>(())
    /// ```
    pub fn new() -> Self {
        Self::with_api(XiamiApi::new())
    }

    /// Crée un client depuis une configuration chargée
    ///
    /// A saved `account.access_token` is attached to every request.
    pub fn from_config(config: &XiamiConfig) -> Self {
        Self::with_api(XiamiApi::from_config(config))
    }

    /// Crée un client utilisant un transport spécifique
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self::with_api(XiamiApi::with_transport(transport))
    }

    pub fn with_api(api: XiamiApi) -> Self {
        Self { api }
    }

    /// Accès à l'API bas-niveau
    pub fn api(&self) -> &XiamiApi {
        &self.api
    }

    // ============ Authentification ============

    /// Authentifie l'utilisateur avec son mot de passe en clair
    pub fn login(&self, account: &str, password: &str) -> Result<AuthInfo> {
        info!("Logging in to Xiami as {}", account);
        self.api.login(account, &password_digest(password))
    }

    /// Restores an access token saved from a previous login
    pub fn set_access_token(&self, access_token: impl Into<String>) {
        self.api.set_access_token(access_token);
    }

    pub fn is_authenticated(&self) -> bool {
        self.api.is_authenticated()
    }

    // ============ Catalogue ============

    /// Récupère un morceau, `None` s'il n'existe pas
    pub fn get_song(&self, song_id: &str) -> Result<Option<Song>> {
        self.api.song_detail(song_id)?.map(from_value).transpose()
    }

    /// Récupère plusieurs morceaux, dans l'ordre renvoyé par le serveur
    pub fn get_songs(&self, song_ids: &[String]) -> Result<Vec<Song>> {
        from_values(self.api.songs_detail(song_ids)?)
    }

    pub fn get_lyric(&self, song_id: &str) -> Result<String> {
        self.api.song_lyric(song_id)
    }

    pub fn get_mv(&self, mv_id: &str) -> Result<Option<Mv>> {
        self.api.mv_detail(mv_id)?.map(from_value).transpose()
    }

    pub fn get_album(&self, album_id: &str) -> Result<Album> {
        from_value(self.api.album_detail(album_id)?)
    }

    pub fn get_artist(&self, artist_id: &str) -> Result<Artist> {
        from_value(self.api.artist_detail(artist_id)?)
    }

    /// Récupère une playlist
    ///
    /// Only the first songs are embedded; [`XiamiClient::playlist_songs`]
    /// pages through all of them.
    pub fn get_playlist(&self, playlist_id: &str) -> Result<Playlist> {
        from_value(self.api.playlist_detail(playlist_id)?)
    }

    pub fn get_user(&self, user_id: &str) -> Result<User> {
        from_value(self.api.user_detail(user_id)?)
    }

    /// Recherche dans le catalogue (première page, [`SEARCH_LIMIT`] résultats)
    pub fn search(&self, keyword: &str, type_: SearchType) -> Result<SearchResult> {
        self.search_page(keyword, type_, 1, SEARCH_LIMIT)
    }

    pub fn search_page(
        &self,
        keyword: &str,
        type_: SearchType,
        page: u32,
        limit: u32,
    ) -> Result<SearchResult> {
        let mut result: SearchResult = from_value(self.api.search(keyword, type_, page, limit)?)?;
        result.q = keyword.to_string();
        debug!(
            "Search '{}' ({}): {} songs, {} albums, {} artists, {} playlists",
            keyword,
            type_,
            result.songs.len(),
            result.albums.len(),
            result.artists.len(),
            result.playlists.len()
        );
        Ok(result)
    }

    // ============ Collections paginées ============

    /// Toutes les chansons favorites d'un utilisateur
    pub fn favorite_songs(&self, user_id: &str) -> Result<PagedSequence<'_, Song>> {
        let user_id = user_id.to_string();
        PagedSequence::deserialized(FAVORITE_SONGS_PAGE_SIZE, "songs", move |c: PageCursor| {
            self.api.user_favorite_songs(&user_id, c.page, c.page_size)
        })
    }

    /// Toutes les chansons d'une playlist
    pub fn playlist_songs(&self, playlist_id: &str) -> Result<PagedSequence<'_, Song>> {
        let playlist_id = playlist_id.to_string();
        PagedSequence::deserialized(PLAYLIST_SONGS_PAGE_SIZE, "songs", move |c: PageCursor| {
            self.api.playlist_songs(&playlist_id, c.page, c.page_size)
        })
    }

    /// Toutes les chansons d'un artiste
    pub fn artist_songs(&self, artist_id: &str) -> Result<PagedSequence<'_, Song>> {
        let artist_id = artist_id.to_string();
        PagedSequence::deserialized(ARTIST_SONGS_PAGE_SIZE, "songs", move |c: PageCursor| {
            self.api.artist_songs(&artist_id, c.page, c.page_size)
        })
    }

    /// Tous les albums d'un artiste
    pub fn artist_albums(&self, artist_id: &str) -> Result<PagedSequence<'_, Album>> {
        let artist_id = artist_id.to_string();
        PagedSequence::deserialized(ARTIST_ALBUMS_PAGE_SIZE, "albums", move |c: PageCursor| {
            self.api.artist_albums(&artist_id, c.page, c.page_size)
        })
    }

    // ============ Utilisateur ============

    pub fn user_playlists(&self, user_id: &str, page: u32, limit: u32) -> Result<Vec<Playlist>> {
        from_values(self.api.user_playlists(user_id, page, limit)?)
    }

    pub fn user_favorite_playlists(
        &self,
        user_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Playlist>> {
        from_values(self.api.user_favorite_playlists(user_id, page, limit)?)
    }

    /// Ajoute un morceau aux favoris
    pub fn add_favorite_song(&self, song_id: &str) -> Result<bool> {
        self.api.update_favorite_song(song_id, UpdateOp::Add)
    }

    /// Retire un morceau des favoris
    pub fn remove_favorite_song(&self, song_id: &str) -> Result<bool> {
        self.api.update_favorite_song(song_id, UpdateOp::Remove)
    }

    pub fn add_to_playlist(&self, playlist_id: &str, song_id: &str) -> Result<bool> {
        self.api
            .update_playlist_song(playlist_id, song_id, UpdateOp::Add)
    }

    pub fn remove_from_playlist(&self, playlist_id: &str, song_id: &str) -> Result<bool> {
        self.api
            .update_playlist_song(playlist_id, song_id, UpdateOp::Remove)
    }

    // ============ Radio et recommandations ============

    pub fn personal_fm(&self) -> Result<Vec<Song>> {
        from_values(self.api.personal_fm()?)
    }

    /// Recommandations du jour (nécessite d'être connecté)
    pub fn recommend_songs(&self) -> Result<Vec<Song>> {
        from_values(self.api.recommend_songs()?)
    }

    pub fn recommend_playlists(&self) -> Result<Vec<Playlist>> {
        from_values(self.api.recommend_playlists()?)
    }
}

impl CachedSong {
    /// Returns the media of the requested quality, refreshing the song first
    /// when its listen URLs are older than [`MEDIA_VALIDITY_SECS`]
    ///
    /// The refresh is a blocking detail call. Without the requested quality
    /// the best available one is returned.
    pub fn current_media(
        &mut self,
        client: &XiamiClient,
        quality: Quality,
    ) -> Result<Option<Media>> {
        if self.is_expired() {
            debug!("Listen URLs of song {} expired, refreshing", self.song.id);
            let song = client
                .get_song(&self.song.id)?
                .ok_or_else(|| XiamiError::MissingField(format!("song {}", self.song.id)))?;
            *self = CachedSong::new(song);
        }

        let mut media = self.song.media_by_quality();
        Ok(media
            .remove(&quality)
            .or_else(|| media.into_values().next()))
    }
}
