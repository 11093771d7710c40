//! Exemple d'utilisation basique de pmoxiami
//!
//! Cet exemple montre comment :
//! - Créer un client depuis la configuration
//! - Rechercher des morceaux
//! - Résoudre l'URL d'écoute d'un morceau
//! - Parcourir toutes les chansons d'une playlist

use pmoxiami::{CachedSong, Quality, SearchType, XiamiClient, XiamiConfig};

fn main() -> anyhow::Result<()> {
    // Initialiser le logging
    tracing_subscriber::fmt::init();

    println!("=== PMOXiami - Exemple d'utilisation basique ===\n");

    let config = XiamiConfig::load("")?;
    let client = XiamiClient::from_config(&config);

    if client.is_authenticated() {
        println!("✓ Jeton d'accès restauré depuis la configuration");
    }

    println!("--- Recherche de morceaux ---");
    let query = "周杰伦";
    let result = client.search(query, SearchType::Song)?;
    println!("✓ {} morceau(x) trouvé(s)\n", result.songs.len());

    for (i, song) in result.songs.iter().take(5).enumerate() {
        let artists: Vec<&str> = song.artists.iter().map(|a| a.name.as_str()).collect();
        println!("  {}. {} - {}", i + 1, artists.join(", "), song.title);
    }

    if let Some(first) = result.songs.first() {
        println!("\n--- URL d'écoute ---");
        if let Some(song) = client.get_song(&first.id)? {
            let mut cached = CachedSong::new(song);
            match cached.current_media(&client, Quality::Hq)? {
                Some(media) => println!("{} ({}, {:?} kbps)", media.url, media.format, media.bitrate),
                None => println!("Aucun fichier disponible"),
            }
        }
    }

    println!("\n--- Playlist ---");
    let songs = client.playlist_songs("428837219")?;
    println!("{} morceau(x) annoncé(s)", songs.total());
    for song in songs.take(10) {
        println!("  {}", song?.title);
    }

    Ok(())
}
