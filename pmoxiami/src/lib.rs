//! # pmoxiami - Client Xiami
//!
//! Cette crate fournit un client Rust bloquant pour l'API h5 de Xiami :
//! requêtes signées, gestion du jeton de session et parcours des collections
//! paginées.
//!
//! ## Vue d'ensemble
//!
//! - Signature MD5 de chaque requête (`token&t&appKey&data`)
//! - Jeton de session obtenu par un appel d'amorçage (cookie `_m_h5_tk`),
//!   renouvelé une fois quand le serveur le déclare expiré
//! - Authentification par mot de passe, ou jeton d'accès restauré
//! - Catalogue : morceaux, paroles, albums, artistes, playlists, MV, recherche
//! - Favoris et playlists de l'utilisateur, radio personnelle, recommandations
//! - Collections paginées exposées comme des itérateurs ([`PagedSequence`])
//!
//! ## Structure des modules
//!
//! ```text
//! pmoxiami/
//! ├── src/
//! │   ├── lib.rs              # Module principal (ce fichier)
//! │   ├── client.rs           # Client typé haut-niveau
//! │   ├── config.rs           # Configuration YAML + variables d'environnement
//! │   ├── models.rs           # Structures de données
//! │   ├── paging.rs           # Itération sur les collections paginées
//! │   ├── api/
//! │   │   ├── mod.rs          # Requêtes signées, classification des réponses
//! │   │   ├── signing.rs      # Encodage et signature
//! │   │   ├── token.rs        # Jeton de session
//! │   │   ├── transport.rs    # Transport HTTP (ureq)
//! │   │   ├── auth.rs         # Authentification
//! │   │   ├── catalog.rs      # Accès au catalogue
//! │   │   └── user.rs         # API utilisateur (favoris, playlists)
//! │   └── error.rs            # Gestion des erreurs
//! ```
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use pmoxiami::{SearchType, XiamiClient, XiamiConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = XiamiConfig::load("")?;
//!     let client = XiamiClient::from_config(&config);
//!
//!     let results = client.search("Jay Chou", SearchType::Song)?;
//!     for song in &results.songs {
//!         println!("{} - {:?}", song.title, song.best_url());
//!     }
//!
//!     for song in client.playlist_songs("428837219")? {
//!         println!("{}", song?.title);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Gestion des erreurs
//!
//! ```rust,ignore
//! use pmoxiami::XiamiError;
//!
//! match client.recommend_songs() {
//!     Ok(songs) => println!("{} songs", songs.len()),
//!     Err(XiamiError::LoginRequired) => println!("Login first"),
//!     Err(e) if e.is_fatal() => println!("Giving up: {}", e),
//!     Err(e) => println!("Error: {}", e),
//! }
//! ```
//!
//! Les erreurs réseau ne sont jamais réessayées par le client.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod paging;

pub use api::auth::AuthInfo;
pub use api::catalog::SearchType;
pub use api::transport::{HttpTransport, Transport, TransportResponse};
pub use api::user::UpdateOp;
pub use api::{ApiResponse, RequestOptions, RequestOutcome, ResponseCode, XiamiApi};
pub use client::XiamiClient;
pub use config::XiamiConfig;
pub use error::{Result, XiamiError};
pub use models::{
    Album, Artist, CachedSong, Media, Mv, Playlist, Quality, SearchResult, Song, User,
};
pub use paging::{PageCursor, PagedSequence, PagingInfo};
