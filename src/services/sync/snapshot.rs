use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::error::{SyncError, ValidationError};
use super::keys::{EpisodeKey, ItemKey, MovieKey, PhotoKey, TrackKey};
use crate::entities::playlist::PlaylistCategory;
use crate::plex_rs::playlist::{PlexPlaylist, PlexPlaylistItem};
use crate::ports::plex::{CatalogError, PlexCatalog};

/// Mutable track attributes, refreshed in place when they change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackAttrs {
    pub album_year: Option<i32>,
    pub duration: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeAttrs {
    pub show_year: Option<i32>,
    pub duration: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieAttrs {
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoAttrs {
    pub file_path: String,
}

/// A validated playlist entry, split into natural key and mutable attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotItem {
    Track(TrackKey, TrackAttrs),
    Episode(EpisodeKey, EpisodeAttrs),
    Movie(MovieKey, MovieAttrs),
    Photo(PhotoKey, PhotoAttrs),
}

impl SnapshotItem {
    pub fn key(&self) -> ItemKey {
        match self {
            SnapshotItem::Track(key, _) => ItemKey::Track(key.clone()),
            SnapshotItem::Episode(key, _) => ItemKey::Episode(key.clone()),
            SnapshotItem::Movie(key, _) => ItemKey::Movie(key.clone()),
            SnapshotItem::Photo(key, _) => ItemKey::Photo(key.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPlaylist {
    pub rating_key: String,
    pub title: String,
    pub category: PlaylistCategory,
    /// Milliseconds
    pub duration: Option<i64>,
    pub thumbnail: Option<String>,
    /// Valid items in playlist order. May repeat a key.
    pub items: Vec<SnapshotItem>,
    /// Items dropped because they failed validation.
    pub skipped_items: usize,
}

impl SnapshotPlaylist {
    /// Builds the playlist header from the Plex listing, items still empty.
    pub fn from_plex(playlist: &PlexPlaylist) -> Result<Self, ValidationError> {
        let category = PlaylistCategory::from_plex(&playlist.playlist_type)
            .ok_or_else(|| ValidationError::UnknownPlaylistType(playlist.playlist_type.clone()))?;

        Ok(Self {
            rating_key: playlist.rating_key.clone(),
            title: playlist.title.clone(),
            category,
            duration: duration_ms(playlist.duration)?,
            thumbnail: playlist.thumbnail().map(str::to_string),
            items: Vec::new(),
            skipped_items: 0,
        })
    }

    pub fn distinct_keys(&self) -> BTreeSet<ItemKey> {
        self.items.iter().map(SnapshotItem::key).collect()
    }
}

/// The catalog as read at the start of a run.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub playlists: Vec<SnapshotPlaylist>,
    /// Titles that could not be read. They are neither created, updated nor deleted.
    pub skipped: BTreeSet<String>,
}

impl Snapshot {
    pub fn get(&self, title: &str) -> Option<&SnapshotPlaylist> {
        self.playlists.iter().find(|p| p.title == title)
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.playlists.iter().map(|p| p.title.as_str())
    }
}

fn required<T>(
    value: Option<T>,
    item_type: &'static str,
    field: &'static str,
) -> Result<T, ValidationError> {
    value.ok_or(ValidationError::MissingField { item_type, field })
}

/// Plex reports durations as unsigned milliseconds; the store keeps them as `i64`.
fn duration_ms(duration: Option<u64>) -> Result<Option<i64>, ValidationError> {
    duration
        .map(|d| i64::try_from(d).map_err(|_| ValidationError::DurationOutOfRange(d)))
        .transpose()
}

fn check_category(
    item_type: &'static str,
    expected: PlaylistCategory,
    category: PlaylistCategory,
) -> Result<(), ValidationError> {
    if expected == category {
        Ok(())
    } else {
        Err(ValidationError::CategoryMismatch {
            item_type,
            category: category.as_str(),
        })
    }
}

/// Validates a raw playlist entry against the playlist's category.
///
/// Episodes come back without a show year; [`fetch_snapshot`] fills it in.
pub fn parse_item(
    raw: &PlexPlaylistItem,
    category: PlaylistCategory,
) -> Result<SnapshotItem, ValidationError> {
    let duration = duration_ms(raw.duration)?;

    match raw.item_type.as_str() {
        "track" => {
            check_category("track", PlaylistCategory::Audio, category)?;
            let key = TrackKey {
                title: raw.title.clone(),
                track_number: required(raw.index, "track", "index")?,
                album_title: required(raw.parent_title.clone(), "track", "parentTitle")?,
                artist_name: required(raw.grandparent_title.clone(), "track", "grandparentTitle")?,
            };
            Ok(SnapshotItem::Track(
                key,
                TrackAttrs {
                    album_year: raw.parent_year,
                    duration,
                },
            ))
        }
        "episode" => {
            check_category("episode", PlaylistCategory::Video, category)?;
            let key = EpisodeKey {
                title: raw.title.clone(),
                episode_number: required(raw.index, "episode", "index")?,
                season_number: required(raw.parent_index, "episode", "parentIndex")?,
                show_title: required(raw.grandparent_title.clone(), "episode", "grandparentTitle")?,
            };
            Ok(SnapshotItem::Episode(
                key,
                EpisodeAttrs {
                    show_year: None,
                    duration,
                },
            ))
        }
        "movie" => {
            check_category("movie", PlaylistCategory::Video, category)?;
            let key = MovieKey {
                title: raw.title.clone(),
                year: required(raw.year, "movie", "year")?,
                duration: required(duration, "movie", "duration")?,
            };
            Ok(SnapshotItem::Movie(
                key,
                MovieAttrs {
                    thumbnail: raw.thumb.clone(),
                },
            ))
        }
        "photo" => {
            check_category("photo", PlaylistCategory::Photo, category)?;
            let key = PhotoKey {
                title: raw.title.clone(),
                thumbnail: required(raw.thumb.clone(), "photo", "thumb")?,
            };
            let file_path = required(raw.first_media_part_file(), "photo", "Media.Part.file")?;
            Ok(SnapshotItem::Photo(
                key,
                PhotoAttrs {
                    file_path: file_path.to_string(),
                },
            ))
        }
        other => Err(ValidationError::UnknownItemType(other.to_string())),
    }
}

/// Reads every playlist and its items from the catalog, bounded by `timeout`.
///
/// A timeout or a failed listing aborts with [`SyncError::Connectivity`]. Playlists whose
/// items vanished mid-fetch, or whose type is unknown, are recorded in [`Snapshot::skipped`].
pub async fn fetch_snapshot<C: PlexCatalog + ?Sized>(
    catalog: &C,
    timeout: Duration,
) -> Result<Snapshot, SyncError> {
    match tokio::time::timeout(timeout, read_catalog(catalog)).await {
        Ok(result) => result,
        Err(_) => Err(CatalogError::Timeout(timeout).into()),
    }
}

async fn read_catalog<C: PlexCatalog + ?Sized>(catalog: &C) -> Result<Snapshot, SyncError> {
    let listed = catalog.list_playlists().await?;
    debug!("Plex listed {} playlists", listed.len());

    let mut snapshot = Snapshot::default();
    // Show rating key -> show year, fetched at most once per run
    let mut show_years: HashMap<String, Option<i32>> = HashMap::new();

    for raw in listed {
        if snapshot.get(&raw.title).is_some() || snapshot.skipped.contains(&raw.title) {
            warn!(
                playlist = %raw.title,
                error = %ValidationError::DuplicatePlaylistTitle,
                "Skipping playlist"
            );
            continue;
        }

        let mut playlist = match SnapshotPlaylist::from_plex(&raw) {
            Ok(playlist) => playlist,
            Err(e) => {
                warn!(playlist = %raw.title, error = %e, "Skipping playlist");
                snapshot.skipped.insert(raw.title);
                continue;
            }
        };

        let items = match catalog.playlist_items(&raw.rating_key).await {
            Ok(items) => items,
            Err(CatalogError::NotFound(resource)) => {
                warn!(
                    playlist = %raw.title,
                    "Playlist items vanished while fetching ({}), skipping playlist",
                    resource
                );
                snapshot.skipped.insert(raw.title);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        for raw_item in &items {
            let mut item = match parse_item(raw_item, playlist.category) {
                Ok(item) => item,
                Err(e) => {
                    warn!(
                        playlist = %playlist.title,
                        item = %raw_item.title,
                        rating_key = %raw_item.rating_key,
                        error = %e,
                        "Skipping item"
                    );
                    playlist.skipped_items += 1;
                    continue;
                }
            };

            if let SnapshotItem::Episode(_, attrs) = &mut item
                && let Some(show_key) = &raw_item.grandparent_rating_key
            {
                attrs.show_year = show_year(catalog, &mut show_years, show_key).await?;
            }

            playlist.items.push(item);
        }

        debug!(
            playlist = %playlist.title,
            rating_key = %playlist.rating_key,
            "Fetched {} items ({} skipped)",
            playlist.items.len(),
            playlist.skipped_items
        );
        snapshot.playlists.push(playlist);
    }

    info!(
        "Fetched Plex snapshot: {} playlists, {} skipped",
        snapshot.playlists.len(),
        snapshot.skipped.len()
    );

    Ok(snapshot)
}

async fn show_year<C: PlexCatalog + ?Sized>(
    catalog: &C,
    cache: &mut HashMap<String, Option<i32>>,
    rating_key: &str,
) -> Result<Option<i32>, SyncError> {
    if let Some(year) = cache.get(rating_key) {
        return Ok(*year);
    }

    let year = match catalog.show(rating_key).await {
        Ok(show) => {
            debug!("Show {} ({}) year {:?}", show.title, rating_key, show.year);
            show.year
        }
        Err(CatalogError::NotFound(_)) => {
            debug!("Show {} not found, leaving its year empty", rating_key);
            None
        }
        Err(e) => return Err(e.into()),
    };

    cache.insert(rating_key.to_string(), year);
    Ok(year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plex_rs::PlexApiError;
    use crate::plex_rs::playlist::{PlexMedia, PlexPart, PlexShow};
    use crate::ports::plex::MockPlexCatalog;
    use reqwest::StatusCode;

    fn plex_playlist(key: &str, title: &str, playlist_type: &str) -> PlexPlaylist {
        PlexPlaylist {
            rating_key: key.into(),
            title: title.into(),
            playlist_type: playlist_type.into(),
            duration: Some(1000),
            thumb: None,
            composite: Some("/composite/1".into()),
            ..Default::default()
        }
    }

    fn plex_track(title: &str) -> PlexPlaylistItem {
        PlexPlaylistItem {
            rating_key: format!("t-{}", title),
            item_type: "track".into(),
            title: title.into(),
            duration: Some(200),
            index: Some(1),
            parent_title: Some("Pump".into()),
            parent_year: Some(2020),
            grandparent_title: Some("DJ Flex".into()),
            ..Default::default()
        }
    }

    fn plex_episode(title: &str, show_key: &str) -> PlexPlaylistItem {
        PlexPlaylistItem {
            rating_key: format!("e-{}", title),
            item_type: "episode".into(),
            title: title.into(),
            duration: Some(1800),
            index: Some(2),
            parent_index: Some(1),
            grandparent_title: Some("The Show".into()),
            grandparent_rating_key: Some(show_key.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_track() {
        let item = parse_item(&plex_track("Run"), PlaylistCategory::Audio).unwrap();

        assert_eq!(
            item,
            SnapshotItem::Track(
                TrackKey {
                    title: "Run".into(),
                    track_number: 1,
                    album_title: "Pump".into(),
                    artist_name: "DJ Flex".into(),
                },
                TrackAttrs {
                    album_year: Some(2020),
                    duration: Some(200),
                }
            )
        );
    }

    #[test]
    fn test_parse_photo_uses_first_media_part() {
        let raw = PlexPlaylistItem {
            item_type: "photo".into(),
            title: "Beach".into(),
            thumb: Some("/thumb/9".into()),
            media: vec![PlexMedia {
                parts: vec![PlexPart {
                    file: "/photos/beach.jpg".into(),
                }],
            }],
            ..Default::default()
        };

        let item = parse_item(&raw, PlaylistCategory::Photo).unwrap();

        assert_eq!(
            item,
            SnapshotItem::Photo(
                PhotoKey {
                    title: "Beach".into(),
                    thumbnail: "/thumb/9".into(),
                },
                PhotoAttrs {
                    file_path: "/photos/beach.jpg".into(),
                }
            )
        );
    }

    #[test]
    fn test_parse_rejects_category_mismatch() {
        let err = parse_item(&plex_track("Run"), PlaylistCategory::Video).unwrap_err();

        assert_eq!(
            err,
            ValidationError::CategoryMismatch {
                item_type: "track",
                category: "video",
            }
        );
    }

    #[test]
    fn test_parse_rejects_missing_key_field() {
        let raw = PlexPlaylistItem {
            item_type: "movie".into(),
            title: "Heat".into(),
            duration: Some(10_000),
            ..Default::default()
        };

        let err = parse_item(&raw, PlaylistCategory::Video).unwrap_err();

        assert_eq!(
            err,
            ValidationError::MissingField {
                item_type: "movie",
                field: "year",
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        let raw = PlexPlaylistItem {
            item_type: "clip".into(),
            title: "Trailer".into(),
            ..Default::default()
        };

        let err = parse_item(&raw, PlaylistCategory::Video).unwrap_err();

        assert_eq!(err, ValidationError::UnknownItemType("clip".into()));
    }

    #[test]
    fn test_parse_rejects_out_of_range_duration() {
        let raw = PlexPlaylistItem {
            duration: Some(u64::MAX),
            ..plex_track("Run")
        };

        let err = parse_item(&raw, PlaylistCategory::Audio).unwrap_err();

        assert_eq!(err, ValidationError::DurationOutOfRange(u64::MAX));
    }

    #[test]
    fn test_playlist_with_out_of_range_duration_is_rejected() {
        let raw = PlexPlaylist {
            rating_key: "1".into(),
            title: "Forever".into(),
            playlist_type: "audio".into(),
            duration: Some(i64::MAX as u64 + 1),
            ..Default::default()
        };

        let err = SnapshotPlaylist::from_plex(&raw).unwrap_err();

        assert_eq!(err, ValidationError::DurationOutOfRange(i64::MAX as u64 + 1));
    }

    #[tokio::test]
    async fn test_fetch_snapshot_skips_invalid_items() {
        let mut catalog = MockPlexCatalog::new();
        catalog
            .expect_list_playlists()
            .returning(|| Ok(vec![plex_playlist("1", "Workout", "audio")]));
        catalog.expect_playlist_items().returning(|_| {
            let mut broken = plex_track("Broken");
            broken.parent_title = None;
            Ok(vec![plex_track("Run"), broken])
        });

        let snapshot = fetch_snapshot(&catalog, Duration::from_secs(5))
            .await
            .unwrap();

        let playlist = snapshot.get("Workout").unwrap();
        assert_eq!(playlist.items.len(), 1);
        assert_eq!(playlist.skipped_items, 1);
        assert_eq!(playlist.thumbnail.as_deref(), Some("/composite/1"));
        assert!(snapshot.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_snapshot_skips_vanished_and_unknown_playlists() {
        let mut catalog = MockPlexCatalog::new();
        catalog.expect_list_playlists().returning(|| {
            Ok(vec![
                plex_playlist("1", "Gone", "audio"),
                plex_playlist("2", "Weird", "mystery"),
                plex_playlist("3", "Workout", "audio"),
            ])
        });
        catalog
            .expect_playlist_items()
            .withf(|key| key == "1")
            .returning(|_| Err(CatalogError::NotFound("/playlists/1/items".into())));
        catalog
            .expect_playlist_items()
            .withf(|key| key == "3")
            .returning(|_| Ok(vec![plex_track("Run")]));

        let snapshot = fetch_snapshot(&catalog, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(snapshot.titles().collect::<Vec<_>>(), vec!["Workout"]);
        assert!(snapshot.skipped.contains("Gone"));
        assert!(snapshot.skipped.contains("Weird"));
    }

    #[tokio::test]
    async fn test_fetch_snapshot_caches_show_years() {
        let mut catalog = MockPlexCatalog::new();
        catalog
            .expect_list_playlists()
            .returning(|| Ok(vec![plex_playlist("1", "Binge", "video")]));
        catalog
            .expect_playlist_items()
            .returning(|_| Ok(vec![plex_episode("Pilot", "100"), plex_episode("Second", "100")]));
        catalog.expect_show().times(1).returning(|key| {
            Ok(PlexShow {
                title: format!("The Show {}", key),
                year: Some(2011),
            })
        });

        let snapshot = fetch_snapshot(&catalog, Duration::from_secs(5))
            .await
            .unwrap();

        let playlist = snapshot.get("Binge").unwrap();
        assert_eq!(playlist.items.len(), 2);
        for item in &playlist.items {
            match item {
                SnapshotItem::Episode(_, attrs) => assert_eq!(attrs.show_year, Some(2011)),
                other => panic!("unexpected item {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_fetch_snapshot_listing_failure_is_connectivity() {
        let mut catalog = MockPlexCatalog::new();
        catalog.expect_list_playlists().returning(|| {
            Err(CatalogError::Connectivity(PlexApiError::UnexpectedStatus {
                status: StatusCode::BAD_GATEWAY,
                url: "/playlists".into(),
            }))
        });

        let err = fetch_snapshot(&catalog, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Connectivity(_)));
    }

    /// Never answers within any reasonable timeout.
    struct StalledCatalog;

    #[async_trait::async_trait]
    impl PlexCatalog for StalledCatalog {
        async fn list_playlists(&self) -> Result<Vec<PlexPlaylist>, CatalogError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }

        async fn playlist_items(
            &self,
            _rating_key: &str,
        ) -> Result<Vec<PlexPlaylistItem>, CatalogError> {
            Ok(Vec::new())
        }

        async fn show(&self, _rating_key: &str) -> Result<PlexShow, CatalogError> {
            Ok(PlexShow::default())
        }
    }

    #[tokio::test]
    async fn test_fetch_snapshot_times_out() {
        let err = fetch_snapshot(&StalledCatalog, Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Connectivity(CatalogError::Timeout(_))
        ));
    }
}
