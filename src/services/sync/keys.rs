//! Natural keys and per-category identities of catalog items.

use crate::entities::{episode, movie, photo, track};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackKey {
    pub title: String,
    pub track_number: i32,
    pub album_title: String,
    pub artist_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EpisodeKey {
    pub title: String,
    pub episode_number: i32,
    pub season_number: i32,
    pub show_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MovieKey {
    pub title: String,
    pub year: i32,
    pub duration: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhotoKey {
    pub title: String,
    pub thumbnail: String,
}

/// The natural key of any catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKey {
    Track(TrackKey),
    Episode(EpisodeKey),
    Movie(MovieKey),
    Photo(PhotoKey),
}

/// The row id of a persisted item, tagged with the table it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemId {
    Track(i64),
    Episode(i64),
    Movie(i64),
    Photo(i64),
}

impl From<&track::Model> for TrackKey {
    fn from(model: &track::Model) -> Self {
        Self {
            title: model.title.clone(),
            track_number: model.track_number,
            album_title: model.album_title.clone(),
            artist_name: model.artist_name.clone(),
        }
    }
}

impl From<&episode::Model> for EpisodeKey {
    fn from(model: &episode::Model) -> Self {
        Self {
            title: model.title.clone(),
            episode_number: model.episode_number,
            season_number: model.season_number,
            show_title: model.show_title.clone(),
        }
    }
}

impl From<&movie::Model> for MovieKey {
    fn from(model: &movie::Model) -> Self {
        Self {
            title: model.title.clone(),
            year: model.year,
            duration: model.duration,
        }
    }
}

impl From<&photo::Model> for PhotoKey {
    fn from(model: &photo::Model) -> Self {
        Self {
            title: model.title.clone(),
            thumbnail: model.thumbnail.clone(),
        }
    }
}
