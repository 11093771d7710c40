//! User data: profile, playlists and favorites

use super::XiamiApi;
use super::catalog::{list_field, page_container, paging_vo};
use crate::error::Result;
use serde_json::{Value, json};
use tracing::debug;

/// Direction of a favorites or playlist update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Add,
    Remove,
}

/// The server encodes flags as `true` or `"true"`
fn is_true(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}

impl XiamiApi {
    pub fn user_detail(&self, user_id: &str) -> Result<Value> {
        debug!("Fetching user {}", user_id);
        let action = "mtop.alimusic.xuser.facade.xiamiuserservice.getuserinfobyuserid";
        self.request(action, json!({ "userId": user_id }))?
            .into_data()
    }

    /// Playlists created by a user
    ///
    /// Playlists may be private; another user's default playlist is hidden.
    pub fn user_playlists(&self, user_id: &str, page: u32, limit: u32) -> Result<Vec<Value>> {
        let action = "mtop.alimusic.music.list.collectservice.getcollectbyuser";
        let payload = json!({
            "userId": user_id,
            "pagingVO": paging_vo(page, limit),
        });
        let response = self.request(action, payload)?;
        list_field(&response, "collects")
    }

    /// Playlists a user marked as favorite
    pub fn user_favorite_playlists(
        &self,
        user_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Value>> {
        let action = "mtop.alimusic.fav.collectfavoriteservice.getfavoritecollects";
        let payload = json!({
            "userId": user_id,
            "pagingVO": paging_vo(page, limit),
        });
        let response = self.request(action, payload)?;
        list_field(&response, "collects")
    }

    /// One page of a user's favorite songs (`songs` + `pagingVO` + `total`)
    pub fn user_favorite_songs(
        &self,
        user_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Option<Value>> {
        let action = "mtop.alimusic.fav.songfavoriteservice.getfavoritesongs";
        let payload = json!({
            "userId": user_id,
            "pagingVO": paging_vo(page, page_size),
        });
        page_container(self.request(action, payload)?)
    }

    /// Adds or removes a favorite song, returns the server's status flag
    pub fn update_favorite_song(&self, song_id: &str, op: UpdateOp) -> Result<bool> {
        let action = match op {
            UpdateOp::Add => "mtop.alimusic.fav.songfavoriteservice.favoritesong",
            UpdateOp::Remove => "mtop.alimusic.fav.songfavoriteservice.unfavoritesong",
        };
        debug!("{:?} favorite song {}", op, song_id);
        let response = self.request(action, json!({ "songId": song_id }))?;
        Ok(is_true(response.data()?.get("status")))
    }

    /// Adds or removes a song from a playlist
    ///
    /// Removing an absent song and adding a present one both report success.
    pub fn update_playlist_song(
        &self,
        playlist_id: &str,
        song_id: &str,
        op: UpdateOp,
    ) -> Result<bool> {
        let action = match op {
            UpdateOp::Add => "mtop.alimusic.music.list.collectservice.addsongs",
            UpdateOp::Remove => "mtop.alimusic.music.list.collectservice.deletesongs",
        };
        debug!("{:?} song {} in playlist {}", op, song_id, playlist_id);
        let payload = json!({
            "listId": playlist_id,
            "songIds": [song_id],
        });
        let response = self.request(action, payload)?;
        Ok(is_true(response.data()?.get("success")))
    }
}
