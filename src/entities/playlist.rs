use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::Set;
use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "playlists")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Natural key, unique across playlists.
    #[sea_orm(unique)]
    pub title: String,
    pub category: PlaylistCategory,
    /// Duration in milliseconds, as reported by Plex
    pub duration: Option<i64>,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sea_orm(has_many, via = "playlist_track")]
    pub tracks: HasMany<super::track::Entity>,
    #[sea_orm(has_many, via = "playlist_episode")]
    pub episodes: HasMany<super::episode::Entity>,
    #[sea_orm(has_many, via = "playlist_movie")]
    pub movies: HasMany<super::movie::Entity>,
    #[sea_orm(has_many, via = "playlist_photo")]
    pub photos: HasMany<super::photo::Entity>,
}

/// The Plex `playlistType` of a playlist. Decides which item categories it may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum PlaylistCategory {
    #[sea_orm(string_value = "audio")]
    Audio,
    #[sea_orm(string_value = "video")]
    Video,
    #[sea_orm(string_value = "photo")]
    Photo,
}

impl PlaylistCategory {
    /// Parses the `playlistType` string used by Plex.
    pub fn from_plex(playlist_type: &str) -> Option<Self> {
        match playlist_type {
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            "photo" => Some(Self::Photo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Photo => "photo",
        }
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            created_at: Set(now),
            updated_at: Set(now),
            ..ActiveModelTrait::default()
        }
    }

    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, sea_orm::DbErr>
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();

        if insert {
            self.created_at = Set(now);
        }

        self.updated_at = Set(now);

        Ok(self)
    }
}
