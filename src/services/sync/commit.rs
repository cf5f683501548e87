use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::Utc;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DbErr, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use tracing::{debug, warn};

use super::keys::{EpisodeKey, ItemId, ItemKey, MovieKey, PhotoKey, TrackKey};
use super::resolver::PendingWrites;
use crate::entities::playlist::PlaylistCategory;
use crate::entities::{
    episode, movie, photo, playlist, playlist_episode, playlist_movie, playlist_photo,
    playlist_track, track,
};

/// Rows per INSERT. Keeps the widest table well below SQLite's bound parameter limit.
const INSERT_CHUNK: usize = 100;

/// Refreshable playlist attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistAttrs {
    pub category: PlaylistCategory,
    pub duration: Option<i64>,
    pub thumbnail: Option<String>,
}

/// Everything one run writes. Applied atomically by [`commit`].
#[derive(Debug)]
pub struct CommitPlan {
    pub created_playlists: Vec<(String, PlaylistAttrs)>,
    pub refreshed_playlists: Vec<(playlist::Model, PlaylistAttrs)>,
    pub removed_playlists: Vec<i64>,
    pub writes: PendingWrites,
    /// (playlist title, item) pairs not yet associated
    pub associate: BTreeSet<(String, ItemKey)>,
    /// (playlist id, item) pairs to drop
    pub disassociate: BTreeSet<(i64, ItemId)>,
}

impl CommitPlan {
    pub fn is_empty(&self) -> bool {
        self.created_playlists.is_empty()
            && self.refreshed_playlists.is_empty()
            && self.removed_playlists.is_empty()
            && self.writes.is_empty()
            && self.associate.is_empty()
            && self.disassociate.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommitStats {
    pub entities_created: usize,
    pub entities_updated: usize,
    pub items_associated: usize,
    pub items_disassociated: usize,
}

/// Applies `plan` in a single transaction. On any error nothing is written.
pub async fn commit(conn: &DatabaseConnection, plan: CommitPlan) -> Result<CommitStats, DbErr> {
    let txn = conn.begin().await?;

    match apply(&txn, plan).await {
        Ok(stats) => {
            txn.commit().await?;
            Ok(stats)
        }
        Err(e) => {
            if let Err(rollback_err) = txn.rollback().await {
                warn!("Failed to roll back reconciliation: {}", rollback_err);
            }
            Err(e)
        }
    }
}

/// Persisted ids per natural key, for every item a run touches.
#[derive(Debug, Default)]
struct ItemIds {
    tracks: HashMap<TrackKey, i64>,
    episodes: HashMap<EpisodeKey, i64>,
    movies: HashMap<MovieKey, i64>,
    photos: HashMap<PhotoKey, i64>,
}

impl ItemIds {
    fn get(&self, key: &ItemKey) -> Option<ItemId> {
        match key {
            ItemKey::Track(key) => self.tracks.get(key).copied().map(ItemId::Track),
            ItemKey::Episode(key) => self.episodes.get(key).copied().map(ItemId::Episode),
            ItemKey::Movie(key) => self.movies.get(key).copied().map(ItemId::Movie),
            ItemKey::Photo(key) => self.photos.get(key).copied().map(ItemId::Photo),
        }
    }
}

async fn apply<C: ConnectionTrait>(txn: &C, plan: CommitPlan) -> Result<CommitStats, DbErr> {
    let mut stats = CommitStats {
        entities_created: plan.writes.created(),
        entities_updated: plan.writes.updated(),
        ..Default::default()
    };

    // Phase 1: bulk insert, in-place updates, identity reload
    insert_playlists(txn, &plan.created_playlists).await?;
    let ids = write_items(txn, plan.writes).await?;
    let playlist_ids: HashMap<String, i64> = playlist::Entity::find()
        .all(txn)
        .await?
        .into_iter()
        .map(|p| (p.title, p.id))
        .collect();

    // Phase 2: associate, skipping pairs already stored
    stats.items_associated = associate(txn, &plan.associate, &playlist_ids, &ids).await?;

    // Phase 3: disassociate. Dropping an absent member affects no row.
    for (playlist_id, item) in &plan.disassociate {
        let result = match item {
            ItemId::Track(id) => {
                playlist_track::Entity::delete_many()
                    .filter(playlist_track::Column::PlaylistId.eq(*playlist_id))
                    .filter(playlist_track::Column::TrackId.eq(*id))
                    .exec(txn)
                    .await?
            }
            ItemId::Episode(id) => {
                playlist_episode::Entity::delete_many()
                    .filter(playlist_episode::Column::PlaylistId.eq(*playlist_id))
                    .filter(playlist_episode::Column::EpisodeId.eq(*id))
                    .exec(txn)
                    .await?
            }
            ItemId::Movie(id) => {
                playlist_movie::Entity::delete_many()
                    .filter(playlist_movie::Column::PlaylistId.eq(*playlist_id))
                    .filter(playlist_movie::Column::MovieId.eq(*id))
                    .exec(txn)
                    .await?
            }
            ItemId::Photo(id) => {
                playlist_photo::Entity::delete_many()
                    .filter(playlist_photo::Column::PlaylistId.eq(*playlist_id))
                    .filter(playlist_photo::Column::PhotoId.eq(*id))
                    .exec(txn)
                    .await?
            }
        };
        stats.items_disassociated += result.rows_affected as usize;
    }

    // Phase 4: playlist maintenance
    remove_playlists(txn, &plan.removed_playlists).await?;

    for (model, attrs) in plan.refreshed_playlists {
        let mut active: playlist::ActiveModel = model.into();
        active.category = Set(attrs.category);
        active.duration = Set(attrs.duration);
        active.thumbnail = Set(attrs.thumbnail);
        active.update(txn).await?;
    }

    Ok(stats)
}

async fn insert_playlists<C: ConnectionTrait>(
    txn: &C,
    created: &[(String, PlaylistAttrs)],
) -> Result<(), DbErr> {
    let rows: Vec<playlist::ActiveModel> = created
        .iter()
        .map(|(title, attrs)| playlist::ActiveModel {
            title: Set(title.clone()),
            category: Set(attrs.category),
            duration: Set(attrs.duration),
            thumbnail: Set(attrs.thumbnail.clone()),
            ..playlist::ActiveModel::new()
        })
        .collect();

    for chunk in rows.chunks(INSERT_CHUNK) {
        playlist::Entity::insert_many(chunk.to_vec())
            .exec_without_returning(txn)
            .await?;
    }

    debug!("Inserted {} playlists", rows.len());
    Ok(())
}

/// Writes one item table: bulk inserts created rows, updates dirty ones in place, then
/// reloads the ids of the inserted rows by title into `$ids`.
macro_rules! write_table {
    (
        $txn:expr, $now:expr, $pending:expr, $ids:expr, $entity:ident, $key:ident,
        created: |$key_var:ident, $attrs_var:ident| { $($created_field:ident: $created_value:expr),* $(,)? },
        updated: |$updated_var:ident| { $($updated_field:ident: $updated_value:expr),* $(,)? } $(,)?
    ) => {{
        let rows: Vec<$entity::ActiveModel> = $pending
            .created
            .iter()
            .map(|($key_var, $attrs_var)| $entity::ActiveModel {
                $($created_field: Set($created_value),)*
                ..$entity::ActiveModel::new()
            })
            .collect();
        for chunk in rows.chunks(INSERT_CHUNK) {
            $entity::Entity::insert_many(chunk.to_vec())
                .exec_without_returning($txn)
                .await?;
        }

        for (id, $updated_var) in $pending.updated {
            $entity::ActiveModel {
                id: Set(id),
                $($updated_field: Set($updated_value),)*
                updated_at: Set($now),
                ..ActiveModelTrait::default()
            }
            .update($txn)
            .await?;
        }

        for titles in created_titles($pending.created.iter().map(|(k, _)| &k.title)) {
            for row in $entity::Entity::find()
                .filter($entity::Column::Title.is_in(titles))
                .all($txn)
                .await?
            {
                $ids.insert($key::from(&row), row.id);
            }
        }
    }};
}

/// Inserts created items, updates dirty ones and returns the ids of every known item.
async fn write_items<C: ConnectionTrait>(
    txn: &C,
    writes: PendingWrites,
) -> Result<ItemIds, DbErr> {
    let now = Utc::now();
    let PendingWrites {
        tracks,
        episodes,
        movies,
        photos,
    } = writes;
    let mut ids = ItemIds {
        tracks: tracks.existing,
        episodes: episodes.existing,
        movies: movies.existing,
        photos: photos.existing,
    };

    write_table!(
        txn, now, tracks, ids.tracks, track, TrackKey,
        created: |key, attrs| {
            title: key.title.clone(),
            track_number: key.track_number,
            album_title: key.album_title.clone(),
            album_year: attrs.album_year,
            artist_name: key.artist_name.clone(),
            duration: attrs.duration,
        },
        updated: |attrs| {
            album_year: attrs.album_year,
            duration: attrs.duration,
        },
    );

    write_table!(
        txn, now, episodes, ids.episodes, episode, EpisodeKey,
        created: |key, attrs| {
            title: key.title.clone(),
            episode_number: key.episode_number,
            season_number: key.season_number,
            show_title: key.show_title.clone(),
            show_year: attrs.show_year,
            duration: attrs.duration,
        },
        updated: |attrs| {
            show_year: attrs.show_year,
            duration: attrs.duration,
        },
    );

    write_table!(
        txn, now, movies, ids.movies, movie, MovieKey,
        created: |key, attrs| {
            title: key.title.clone(),
            year: key.year,
            duration: key.duration,
            thumbnail: attrs.thumbnail.clone(),
        },
        updated: |attrs| {
            thumbnail: attrs.thumbnail,
        },
    );

    write_table!(
        txn, now, photos, ids.photos, photo, PhotoKey,
        created: |key, attrs| {
            title: key.title.clone(),
            thumbnail: key.thumbnail.clone(),
            file_path: attrs.file_path.clone(),
        },
        updated: |attrs| {
            file_path: attrs.file_path,
        },
    );

    Ok(ids)
}

/// Distinct titles of freshly inserted rows, chunked for `IN (...)` lookups.
fn created_titles<'a>(titles: impl Iterator<Item = &'a String>) -> Vec<Vec<String>> {
    let distinct: BTreeSet<&String> = titles.collect();
    let distinct: Vec<String> = distinct.into_iter().cloned().collect();

    distinct
        .chunks(INSERT_CHUNK)
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Inserts the join rows of `pairs` that are not stored yet. Returns the number inserted.
async fn associate<C: ConnectionTrait>(
    txn: &C,
    pairs: &BTreeSet<(String, ItemKey)>,
    playlist_ids: &HashMap<String, i64>,
    ids: &ItemIds,
) -> Result<usize, DbErr> {
    let mut resolved = Vec::with_capacity(pairs.len());
    for (title, key) in pairs {
        let playlist_id = *playlist_ids
            .get(title)
            .ok_or_else(|| DbErr::RecordNotFound(format!("playlist `{}`", title)))?;
        let item = ids
            .get(key)
            .ok_or_else(|| DbErr::RecordNotFound(format!("item {:?}", key)))?;
        resolved.push((playlist_id, item));
    }

    let affected: BTreeSet<i64> = resolved.iter().map(|(playlist_id, _)| *playlist_id).collect();
    let mut present = present_members(txn, &affected).await?;

    let mut tracks = Vec::new();
    let mut episodes = Vec::new();
    let mut movies = Vec::new();
    let mut photos = Vec::new();

    for (playlist_id, item) in resolved {
        if !present.insert((playlist_id, item)) {
            continue;
        }

        match item {
            ItemId::Track(id) => tracks.push(playlist_track::ActiveModel {
                playlist_id: Set(playlist_id),
                track_id: Set(id),
                ..playlist_track::ActiveModel::new()
            }),
            ItemId::Episode(id) => episodes.push(playlist_episode::ActiveModel {
                playlist_id: Set(playlist_id),
                episode_id: Set(id),
                ..playlist_episode::ActiveModel::new()
            }),
            ItemId::Movie(id) => movies.push(playlist_movie::ActiveModel {
                playlist_id: Set(playlist_id),
                movie_id: Set(id),
                ..playlist_movie::ActiveModel::new()
            }),
            ItemId::Photo(id) => photos.push(playlist_photo::ActiveModel {
                playlist_id: Set(playlist_id),
                photo_id: Set(id),
                ..playlist_photo::ActiveModel::new()
            }),
        }
    }

    for chunk in tracks.chunks(INSERT_CHUNK) {
        playlist_track::Entity::insert_many(chunk.to_vec())
            .exec_without_returning(txn)
            .await?;
    }
    for chunk in episodes.chunks(INSERT_CHUNK) {
        playlist_episode::Entity::insert_many(chunk.to_vec())
            .exec_without_returning(txn)
            .await?;
    }
    for chunk in movies.chunks(INSERT_CHUNK) {
        playlist_movie::Entity::insert_many(chunk.to_vec())
            .exec_without_returning(txn)
            .await?;
    }
    for chunk in photos.chunks(INSERT_CHUNK) {
        playlist_photo::Entity::insert_many(chunk.to_vec())
            .exec_without_returning(txn)
            .await?;
    }

    Ok(tracks.len() + episodes.len() + movies.len() + photos.len())
}

/// Join rows already stored for the given playlists.
async fn present_members<C: ConnectionTrait>(
    txn: &C,
    playlist_ids: &BTreeSet<i64>,
) -> Result<HashSet<(i64, ItemId)>, DbErr> {
    let mut present = HashSet::new();
    let playlist_ids: Vec<i64> = playlist_ids.iter().copied().collect();

    for chunk in playlist_ids.chunks(INSERT_CHUNK) {
        for row in playlist_track::Entity::find()
            .filter(playlist_track::Column::PlaylistId.is_in(chunk.iter().copied()))
            .all(txn)
            .await?
        {
            present.insert((row.playlist_id, ItemId::Track(row.track_id)));
        }
        for row in playlist_episode::Entity::find()
            .filter(playlist_episode::Column::PlaylistId.is_in(chunk.iter().copied()))
            .all(txn)
            .await?
        {
            present.insert((row.playlist_id, ItemId::Episode(row.episode_id)));
        }
        for row in playlist_movie::Entity::find()
            .filter(playlist_movie::Column::PlaylistId.is_in(chunk.iter().copied()))
            .all(txn)
            .await?
        {
            present.insert((row.playlist_id, ItemId::Movie(row.movie_id)));
        }
        for row in playlist_photo::Entity::find()
            .filter(playlist_photo::Column::PlaylistId.is_in(chunk.iter().copied()))
            .all(txn)
            .await?
        {
            present.insert((row.playlist_id, ItemId::Photo(row.photo_id)));
        }
    }

    Ok(present)
}

/// Deletes playlists together with their join rows.
async fn remove_playlists<C: ConnectionTrait>(txn: &C, ids: &[i64]) -> Result<(), DbErr> {
    if ids.is_empty() {
        return Ok(());
    }

    playlist_track::Entity::delete_many()
        .filter(playlist_track::Column::PlaylistId.is_in(ids.iter().copied()))
        .exec(txn)
        .await?;
    playlist_episode::Entity::delete_many()
        .filter(playlist_episode::Column::PlaylistId.is_in(ids.iter().copied()))
        .exec(txn)
        .await?;
    playlist_movie::Entity::delete_many()
        .filter(playlist_movie::Column::PlaylistId.is_in(ids.iter().copied()))
        .exec(txn)
        .await?;
    playlist_photo::Entity::delete_many()
        .filter(playlist_photo::Column::PlaylistId.is_in(ids.iter().copied()))
        .exec(txn)
        .await?;

    let result = playlist::Entity::delete_many()
        .filter(playlist::Column::Id.is_in(ids.iter().copied()))
        .exec(txn)
        .await?;

    debug!("Removed {} playlists", result.rows_affected);
    Ok(())
}
