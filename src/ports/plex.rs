use std::time::Duration;

use crate::plex_rs::PlexApiError;
use crate::plex_rs::playlist::{PlexPlaylist, PlexPlaylistItem, PlexShow};

/// Failure reading the remote catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The resource vanished (HTTP 404). Callers skip the affected playlist.
    #[error("{0} was not found on the Plex server")]
    NotFound(String),
    #[error("Plex server unreachable: {0}")]
    Connectivity(#[source] PlexApiError),
    #[error("Plex snapshot fetch timed out after {0:?}")]
    Timeout(Duration),
}

impl From<PlexApiError> for CatalogError {
    fn from(err: PlexApiError) -> Self {
        match err {
            PlexApiError::NotFound { url } => CatalogError::NotFound(url),
            other => CatalogError::Connectivity(other),
        }
    }
}

/// Port trait wrapping the read-only Plex capabilities the reconciliation engine needs.
///
/// Implementations live in `services::plex::client` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PlexCatalog: Send + Sync {
    async fn list_playlists(&self) -> Result<Vec<PlexPlaylist>, CatalogError>;

    /// All items of a playlist, in playlist order.
    async fn playlist_items(&self, rating_key: &str)
    -> Result<Vec<PlexPlaylistItem>, CatalogError>;

    async fn show(&self, rating_key: &str) -> Result<PlexShow, CatalogError>;
}
