use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr};
use reqwest::Client;
use url::Url;

use crate::plex_rs::playlist::{
    PlexPlaylist, PlexPlaylistItem, PlexShow, get_all_playlist_items, get_playlists, get_show,
};
use crate::ports::plex::{CatalogError, PlexCatalog};

/// Reads playlists from a single Plex Media Server over HTTP.
pub struct PlexHttpAdapter {
    client: Client,
    server_url: Url,
    token: String,
    page_size: u32,
}

impl PlexHttpAdapter {
    pub fn new(
        server_url: Url,
        token: String,
        request_timeout: Duration,
        page_size: u32,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .wrap_err("Failed to build Plex http client")?;

        Ok(Self {
            client,
            server_url,
            token,
            page_size: page_size.max(1),
        })
    }
}

#[async_trait::async_trait]
impl PlexCatalog for PlexHttpAdapter {
    async fn list_playlists(&self) -> Result<Vec<PlexPlaylist>, CatalogError> {
        Ok(get_playlists(&self.client, &self.server_url, &self.token).await?)
    }

    async fn playlist_items(
        &self,
        rating_key: &str,
    ) -> Result<Vec<PlexPlaylistItem>, CatalogError> {
        Ok(get_all_playlist_items(
            &self.client,
            &self.server_url,
            &self.token,
            rating_key,
            self.page_size,
        )
        .await?)
    }

    async fn show(&self, rating_key: &str) -> Result<PlexShow, CatalogError> {
        Ok(get_show(&self.client, &self.server_url, &self.token, rating_key).await?)
    }
}
