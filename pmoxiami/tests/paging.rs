mod common;

use common::*;
use pmoxiami::{PageCursor, PagedSequence, XiamiClient, XiamiError};
use serde_json::{Value, json};
use std::cell::RefCell;

const PLAYLIST_SONGS: &str = "mtop.alimusic.music.list.collectservice.getcollectsongs";
const ARTIST_ALBUMS: &str = "mtop.alimusic.music.albumservice.getartistalbums";

fn songs_page(page: u32, page_size: u32, pages: u32, ids: &[u32]) -> Value {
    let songs: Vec<Value> = ids
        .iter()
        .map(|id| json!({ "songId": id, "songName": format!("song {}", id) }))
        .collect();
    json!({
        "songs": songs,
        "pagingVO": {
            "page": page.to_string(),
            "pageSize": page_size.to_string(),
            "pages": pages.to_string()
        }
    })
}

fn model_paging(call: &Call) -> (u64, u64) {
    let paging = &call.request()["model"]["pagingVO"];
    (
        paging["page"].as_u64().unwrap(),
        paging["pageSize"].as_u64().unwrap(),
    )
}

#[test]
fn pages_are_chained_in_order() -> anyhow::Result<()> {
    let requested = RefCell::new(Vec::new());
    let pages = [
        songs_page(1, 2, 3, &[1, 2]),
        songs_page(2, 2, 3, &[3, 4]),
        songs_page(3, 2, 3, &[5]),
    ];

    let mut sequence = PagedSequence::new(
        2,
        "songs",
        |cursor: PageCursor| {
            requested.borrow_mut().push(cursor);
            Ok(Some(pages[cursor.page as usize - 1].clone()))
        },
        |raw| Ok(raw["songId"].as_u64().unwrap_or_default()),
    )?;

    // Sans compte déclaré, le total est une borne haute
    assert_eq!(sequence.total(), 6);
    assert!(!sequence.is_total_exact());
    let ids = sequence.by_ref().collect::<Result<Vec<_>, _>>()?;
    assert_eq!(ids, [1, 2, 3, 4, 5]);

    // Une fois épuisée, la séquence ne refait aucun appel
    assert_eq!(sequence.by_ref().count(), 0);
    assert!(sequence.is_exhausted());
    drop(sequence);

    let pages: Vec<u32> = requested.borrow().iter().map(|c| c.page).collect();
    assert_eq!(pages, [1, 2, 3]);
    Ok(())
}

#[test]
fn playlist_songs_follow_the_server_page_size() -> anyhow::Result<()> {
    let transport = ScriptedTransport::new(vec![
        token_response("T"),
        success(songs_page(1, 50, 3, &[1, 2])),
        success(songs_page(2, 50, 3, &[3])),
        success(songs_page(3, 50, 3, &[4])),
    ]);
    let client = XiamiClient::with_transport(transport.clone());

    let songs = client
        .playlist_songs("428837219")?
        .collect::<Result<Vec<_>, _>>()?;

    let ids: Vec<&str> = songs.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["1", "2", "3", "4"]);

    let requests: Vec<(u64, u64)> = transport
        .calls()
        .iter()
        .filter(|c| c.is_action(PLAYLIST_SONGS))
        .map(model_paging)
        .collect();
    assert_eq!(requests, [(1, 200), (2, 50), (3, 50)]);
    Ok(())
}

#[test]
fn total_is_known_after_construction() -> anyhow::Result<()> {
    let transport = ScriptedTransport::new(vec![
        token_response("T"),
        success(json!({
            "songs": [{"songId": 1, "songName": "a"}],
            "total": "123",
            "pagingVO": {"page": 1, "pageSize": 50, "pages": 3}
        })),
    ]);
    let client = XiamiClient::with_transport(transport.clone());

    let sequence = client.favorite_songs("42")?;

    assert_eq!(sequence.total(), 123);
    // Seule la première page a été demandée
    assert_eq!(transport.calls().len(), 2);
    Ok(())
}

#[test]
fn null_first_page_gives_an_empty_sequence() -> anyhow::Result<()> {
    let transport = ScriptedTransport::new(vec![
        token_response("T"),
        success(json!(null)),
    ]);
    let client = XiamiClient::with_transport(transport.clone());

    let mut albums = client.artist_albums("3110")?;

    assert_eq!(albums.total(), 0);
    assert!(albums.next().is_none());
    assert_eq!(transport.action_calls(ARTIST_ALBUMS), 1);
    Ok(())
}

#[test]
fn failing_page_ends_the_sequence_with_its_error() -> anyhow::Result<()> {
    let transport = ScriptedTransport::new(vec![
        token_response("T"),
        success(songs_page(1, 1, 2, &[1])),
    ]);
    let client = XiamiClient::with_transport(transport);

    let results: Vec<_> = client.artist_songs("3110")?.collect();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().map(|s| s.id.as_str()).ok(), Some("1"));
    assert!(matches!(results[1], Err(XiamiError::Transport(_))));
    Ok(())
}

#[test]
fn first_page_error_is_returned_by_the_constructor() {
    let transport = ScriptedTransport::new(vec![
        token_response("T"),
        envelope("FAIL_BIZ_GLOBAL_NEED_LOGIN", json!(null)),
    ]);
    let client = XiamiClient::with_transport(transport);

    let err = client.favorite_songs("42").unwrap_err();
    assert!(matches!(err, XiamiError::LoginRequired));
}

#[test]
fn unexpected_code_mid_collection_is_yielded_as_an_error() -> anyhow::Result<()> {
    let transport = ScriptedTransport::new(vec![
        token_response("T"),
        success(songs_page(1, 1, 3, &[1])),
        envelope("FAIL_BIZ_SERVICE_BUSY", json!({ "songs": [] })),
    ]);
    let client = XiamiClient::with_transport(transport.clone());

    let sequence = client.playlist_songs("428837219")?;
    assert_eq!(sequence.total(), 3);
    let results: Vec<_> = sequence.collect();

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    match &results[1] {
        Err(XiamiError::UnexpectedCode { code, .. }) => assert_eq!(code, "FAIL_BIZ_SERVICE_BUSY"),
        other => panic!("expected an unexpected code error, got {:?}", other),
    }
    // Aucune page supplémentaire après l'erreur
    assert_eq!(transport.action_calls(PLAYLIST_SONGS), 2);
    Ok(())
}

#[test]
fn unexpected_code_on_first_page_fails_construction() {
    let transport = ScriptedTransport::new(vec![
        token_response("T"),
        envelope("FAIL_BIZ_SERVICE_BUSY", json!(null)),
    ]);
    let client = XiamiClient::with_transport(transport);

    let err = client.favorite_songs("42").unwrap_err();
    assert!(matches!(err, XiamiError::UnexpectedCode { .. }));
}

#[test]
fn stale_expiry_after_retry_is_not_an_empty_collection() {
    let transport = ScriptedTransport::new(vec![
        token_response("A"),
        envelope("FAIL_SYS_TOKEN_EXPIRED", json!(null)),
        token_response("B"),
        envelope("FAIL_SYS_TOKEN_EXPIRED", json!(null)),
        token_response("C"),
    ]);
    let client = XiamiClient::with_transport(transport);

    let err = client.artist_songs("3110").unwrap_err();
    assert!(matches!(err, XiamiError::UnexpectedCode { .. }));
}

#[test]
fn declared_count_bounds_a_collection_without_page_count() -> anyhow::Result<()> {
    let transport = ScriptedTransport::new(vec![
        token_response("T"),
        success(json!({
            "songs": [{"songId": 1, "songName": "a"}, {"songId": 2, "songName": "b"}],
            "total": "3",
            "pagingVO": {"page": 1, "pageSize": 2}
        })),
        success(json!({
            "songs": [{"songId": 3, "songName": "c"}, {"songId": 4, "songName": "d"}],
            "total": "3",
            "pagingVO": {"page": 2, "pageSize": 2}
        })),
    ]);
    let client = XiamiClient::with_transport(transport);

    let sequence = client.favorite_songs("42")?;
    assert!(sequence.is_total_exact());
    let songs = sequence.collect::<Result<Vec<_>, _>>()?;

    let ids: Vec<&str> = songs.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["1", "2", "3"]);
    Ok(())
}
