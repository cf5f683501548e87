use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::{PlexApiError, PlexMediaContainer, PlexResponse, get, send_json};

/* ---------- Playlists ---------- */

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlexPlaylist {
    #[serde(rename = "ratingKey")]
    pub rating_key: String,

    pub title: String,

    /// One of `audio`, `video` or `photo`
    #[serde(rename = "playlistType")]
    pub playlist_type: String,

    /// Total duration in milliseconds. Photo playlists usually omit it.
    #[serde(default)]
    pub duration: Option<u64>,

    #[serde(default)]
    pub thumb: Option<String>,

    #[serde(default)]
    pub composite: Option<String>,
}

impl PlexPlaylist {
    /// Plex only sets `thumb` on playlists with a custom poster, `composite` otherwise.
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumb.as_deref().or(self.composite.as_deref())
    }
}

/// Fetches every playlist (type=15) visible to the token.
///
/// Endpoint
/// - `GET /playlists?type=15`
pub async fn get_playlists(
    client: &Client,
    base_url: &Url,
    user_token: &str,
) -> Result<Vec<PlexPlaylist>, PlexApiError> {
    let (request, url) = get(client, base_url, "playlists?type=15")?;
    let res: PlexResponse<PlexPlaylist> = send_json(request, &url, user_token).await?;

    Ok(res.media_container.metadata)
}

/* ---------- Playlist items ---------- */

/// One entry of `/playlists/{id}/items`. Which fields are set depends on `item_type`.
///
/// - track: `index` is the track number, `parentTitle`/`parentYear` the album,
///   `grandparentTitle` the artist
/// - episode: `index` is the episode number, `parentIndex` the season,
///   `grandparentTitle`/`grandparentRatingKey` the show
/// - movie: `year`, `duration`, `thumb`
/// - photo: `thumb` and the file of the first media part
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlexPlaylistItem {
    #[serde(rename = "ratingKey")]
    pub rating_key: String,

    #[serde(rename = "type")]
    pub item_type: String,

    pub title: String,

    #[serde(default)]
    pub duration: Option<u64>,

    #[serde(default)]
    pub index: Option<i32>,

    #[serde(rename = "parentIndex", default)]
    pub parent_index: Option<i32>,

    #[serde(rename = "parentTitle", default)]
    pub parent_title: Option<String>,

    #[serde(rename = "parentYear", default)]
    pub parent_year: Option<i32>,

    #[serde(rename = "grandparentTitle", default)]
    pub grandparent_title: Option<String>,

    #[serde(rename = "grandparentRatingKey", default)]
    pub grandparent_rating_key: Option<String>,

    #[serde(default)]
    pub year: Option<i32>,

    #[serde(default)]
    pub thumb: Option<String>,

    #[serde(rename = "Media", default)]
    pub media: Vec<PlexMedia>,
}

/// Media element containing Part information with file paths
#[derive(Debug, Clone, Deserialize)]
pub struct PlexMedia {
    #[serde(rename = "Part", default)]
    pub parts: Vec<PlexPart>,
}

/// Part element containing the actual file path
#[derive(Debug, Clone, Deserialize)]
pub struct PlexPart {
    /// Absolute path to the media file on disk
    pub file: String,
}

impl PlexPlaylistItem {
    /// The file of the first part of the first media element, if any.
    pub fn first_media_part_file(&self) -> Option<&str> {
        self.media
            .first()
            .and_then(|media| media.parts.first())
            .map(|part| part.file.as_str())
    }
}

/// Fetch one page of items from a playlist.
///
/// Pagination
/// - `start` is sent as `X-Plex-Container-Start`.
/// - `size` is sent as `X-Plex-Container-Size`.
///
/// Endpoint
/// - `GET /playlists/{id}/items`
pub async fn get_playlist_items_page(
    client: &Client,
    base_url: &Url,
    user_token: &str,
    playlist_id: &str,
    start: u32,
    size: u32,
) -> Result<PlexMediaContainer<PlexPlaylistItem>, PlexApiError> {
    let (request, url) = get(client, base_url, &format!("playlists/{}/items", playlist_id))?;
    let request = request
        .header("X-Plex-Container-Start", start.to_string())
        .header("X-Plex-Container-Size", size.to_string());

    let res: PlexResponse<PlexPlaylistItem> = send_json(request, &url, user_token).await?;

    Ok(res.media_container)
}

/// Fetch all items of a playlist in playlist order, handling Plex pagination.
///
/// Stops when `totalSize` items were retrieved, or when an empty page is returned.
pub async fn get_all_playlist_items(
    client: &Client,
    base_url: &Url,
    user_token: &str,
    playlist_id: &str,
    page_size: u32,
) -> Result<Vec<PlexPlaylistItem>, PlexApiError> {
    let mut start: u32 = 0;
    let mut out: Vec<PlexPlaylistItem> = Vec::new();

    loop {
        let container =
            get_playlist_items_page(client, base_url, user_token, playlist_id, start, page_size)
                .await?;

        if container.metadata.is_empty() {
            break;
        }

        out.extend(container.metadata);
        start = out.len() as u32;

        // If Plex tells us the total size, stop exactly at the end.
        match container.total_size {
            Some(total) if start >= total => break,
            None => break,
            _ => {}
        }
    }

    Ok(out)
}

/* ---------- Shows ---------- */

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlexShow {
    pub title: String,

    #[serde(default)]
    pub year: Option<i32>,
}

/// Fetch the metadata of a show, used to resolve an episode's show year.
///
/// Endpoint
/// - `GET /library/metadata/{ratingKey}`
pub async fn get_show(
    client: &Client,
    base_url: &Url,
    user_token: &str,
    rating_key: &str,
) -> Result<PlexShow, PlexApiError> {
    let (request, url) = get(client, base_url, &format!("library/metadata/{}", rating_key))?;
    let res: PlexResponse<PlexShow> = send_json(request, &url, user_token).await?;

    res.media_container
        .metadata
        .into_iter()
        .next()
        .ok_or_else(|| PlexApiError::NotFound {
            url: url.path().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_playlists() {
        let body = serde_json::json!({
            "MediaContainer": {
                "size": 2,
                "Metadata": [
                    {
                        "ratingKey": "101",
                        "title": "Workout",
                        "playlistType": "audio",
                        "smart": false,
                        "duration": 3600000,
                        "leafCount": 12,
                        "composite": "/playlists/101/composite/1700000000"
                    },
                    {
                        "ratingKey": "102",
                        "title": "Holiday",
                        "playlistType": "photo",
                        "thumb": "/library/metadata/102/thumb/1"
                    }
                ]
            }
        });

        let res: PlexResponse<PlexPlaylist> = serde_json::from_value(body).unwrap();
        let playlists = res.media_container.metadata;

        assert_eq!(playlists.len(), 2);
        assert_eq!(playlists[0].duration, Some(3_600_000));
        assert_eq!(
            playlists[0].thumbnail(),
            Some("/playlists/101/composite/1700000000")
        );
        assert_eq!(playlists[1].duration, None);
        assert_eq!(
            playlists[1].thumbnail(),
            Some("/library/metadata/102/thumb/1")
        );
    }

    #[test]
    fn test_deserialize_empty_playlist_items() {
        let body = serde_json::json!({
            "MediaContainer": { "size": 0, "totalSize": 0 }
        });

        let res: PlexResponse<PlexPlaylistItem> = serde_json::from_value(body).unwrap();

        assert!(res.media_container.metadata.is_empty());
        assert_eq!(res.media_container.total_size, Some(0));
    }

    #[test]
    fn test_deserialize_playlist_items() {
        let body = serde_json::json!({
            "MediaContainer": {
                "size": 2,
                "totalSize": 40,
                "offset": 0,
                "Metadata": [
                    {
                        "ratingKey": "5001",
                        "type": "episode",
                        "title": "Pilot",
                        "index": 1,
                        "parentIndex": 1,
                        "grandparentTitle": "The Show",
                        "grandparentRatingKey": "4000",
                        "duration": 1800000
                    },
                    {
                        "ratingKey": "6001",
                        "type": "photo",
                        "title": "Beach",
                        "thumb": "/library/metadata/6001/thumb/1",
                        "Media": [
                            { "Part": [ { "file": "/photos/beach.jpg" } ] }
                        ]
                    }
                ]
            }
        });

        let res: PlexResponse<PlexPlaylistItem> = serde_json::from_value(body).unwrap();
        let items = res.media_container.metadata;

        assert_eq!(res.media_container.total_size, Some(40));
        assert_eq!(items[0].item_type, "episode");
        assert_eq!(items[0].parent_index, Some(1));
        assert_eq!(items[0].grandparent_rating_key.as_deref(), Some("4000"));
        assert_eq!(items[0].first_media_part_file(), None);
        assert_eq!(items[1].first_media_part_file(), Some("/photos/beach.jpg"));
    }
}
