use std::collections::{BTreeSet, HashMap};

use sea_orm::{ConnectionTrait, DbErr, EntityTrait};

use super::keys::{EpisodeKey, ItemId, ItemKey, MovieKey, PhotoKey, TrackKey};
use crate::entities::{
    episode, movie, photo, playlist, playlist_episode, playlist_movie, playlist_photo,
    playlist_track, track,
};

/// The members of one playlist, one id set per item table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Association {
    tracks: BTreeSet<i64>,
    episodes: BTreeSet<i64>,
    movies: BTreeSet<i64>,
    photos: BTreeSet<i64>,
}

impl Association {
    /// Number of members over all categories.
    pub fn count(&self) -> usize {
        self.tracks.len() + self.episodes.len() + self.movies.len() + self.photos.len()
    }

    pub fn members(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.tracks
            .iter()
            .map(|id| ItemId::Track(*id))
            .chain(self.episodes.iter().map(|id| ItemId::Episode(*id)))
            .chain(self.movies.iter().map(|id| ItemId::Movie(*id)))
            .chain(self.photos.iter().map(|id| ItemId::Photo(*id)))
    }

    fn insert(&mut self, id: ItemId) {
        match id {
            ItemId::Track(id) => self.tracks.insert(id),
            ItemId::Episode(id) => self.episodes.insert(id),
            ItemId::Movie(id) => self.movies.insert(id),
            ItemId::Photo(id) => self.photos.insert(id),
        };
    }
}

/// Everything persisted, indexed by natural key. Read once per run before diffing.
#[derive(Debug, Default)]
pub struct StoreIndex {
    pub playlists: HashMap<String, playlist::Model>,
    pub tracks: HashMap<TrackKey, track::Model>,
    pub episodes: HashMap<EpisodeKey, episode::Model>,
    pub movies: HashMap<MovieKey, movie::Model>,
    pub photos: HashMap<PhotoKey, photo::Model>,
    keys: HashMap<ItemId, ItemKey>,
    associations: HashMap<i64, Association>,
}

impl StoreIndex {
    pub async fn load<C: ConnectionTrait>(conn: &C) -> Result<Self, DbErr> {
        let mut index = StoreIndex::default();

        for model in playlist::Entity::find().all(conn).await? {
            index.playlists.insert(model.title.clone(), model);
        }

        for model in track::Entity::find().all(conn).await? {
            let key = TrackKey::from(&model);
            index
                .keys
                .insert(ItemId::Track(model.id), ItemKey::Track(key.clone()));
            index.tracks.insert(key, model);
        }
        for model in episode::Entity::find().all(conn).await? {
            let key = EpisodeKey::from(&model);
            index
                .keys
                .insert(ItemId::Episode(model.id), ItemKey::Episode(key.clone()));
            index.episodes.insert(key, model);
        }
        for model in movie::Entity::find().all(conn).await? {
            let key = MovieKey::from(&model);
            index
                .keys
                .insert(ItemId::Movie(model.id), ItemKey::Movie(key.clone()));
            index.movies.insert(key, model);
        }
        for model in photo::Entity::find().all(conn).await? {
            let key = PhotoKey::from(&model);
            index
                .keys
                .insert(ItemId::Photo(model.id), ItemKey::Photo(key.clone()));
            index.photos.insert(key, model);
        }

        for row in playlist_track::Entity::find().all(conn).await? {
            index.associate(row.playlist_id, ItemId::Track(row.track_id));
        }
        for row in playlist_episode::Entity::find().all(conn).await? {
            index.associate(row.playlist_id, ItemId::Episode(row.episode_id));
        }
        for row in playlist_movie::Entity::find().all(conn).await? {
            index.associate(row.playlist_id, ItemId::Movie(row.movie_id));
        }
        for row in playlist_photo::Entity::find().all(conn).await? {
            index.associate(row.playlist_id, ItemId::Photo(row.photo_id));
        }

        tracing::debug!(
            "Loaded store: {} playlists, {} tracks, {} episodes, {} movies, {} photos",
            index.playlists.len(),
            index.tracks.len(),
            index.episodes.len(),
            index.movies.len(),
            index.photos.len()
        );

        Ok(index)
    }

    fn associate(&mut self, playlist_id: i64, item: ItemId) {
        self.associations
            .entry(playlist_id)
            .or_default()
            .insert(item);
    }

    /// Members of a playlist. Empty for unknown ids.
    pub fn association(&self, playlist_id: i64) -> Association {
        self.associations
            .get(&playlist_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn key_of(&self, id: ItemId) -> Option<&ItemKey> {
        self.keys.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::playlist::PlaylistCategory;
    use crate::test_utils::test_db;
    use sea_orm::{ActiveModelBehavior, ActiveModelTrait, Set};

    #[tokio::test]
    async fn test_load_empty_store() {
        let db = test_db().await;

        let index = StoreIndex::load(&db.conn).await.unwrap();

        assert!(index.playlists.is_empty());
        assert!(index.tracks.is_empty());
        assert_eq!(index.association(1).count(), 0);
    }

    #[tokio::test]
    async fn test_load_indexes_members_by_key() {
        let db = test_db().await;

        let playlist = playlist::ActiveModel {
            title: Set("Mixed".into()),
            category: Set(PlaylistCategory::Audio),
            duration: Set(Some(400)),
            ..playlist::ActiveModel::new()
        }
        .insert(&db.conn)
        .await
        .unwrap();

        let track = track::ActiveModel {
            title: Set("Run".into()),
            track_number: Set(1),
            album_title: Set("Pump".into()),
            artist_name: Set("DJ Flex".into()),
            duration: Set(Some(200)),
            ..track::ActiveModel::new()
        }
        .insert(&db.conn)
        .await
        .unwrap();

        playlist_track::ActiveModel {
            playlist_id: Set(playlist.id),
            track_id: Set(track.id),
            ..playlist_track::ActiveModel::new()
        }
        .insert(&db.conn)
        .await
        .unwrap();

        let index = StoreIndex::load(&db.conn).await.unwrap();

        let association = index.association(playlist.id);
        assert_eq!(association.count(), 1);
        assert_eq!(
            association.members().collect::<Vec<_>>(),
            vec![ItemId::Track(track.id)]
        );

        let Some(ItemKey::Track(key)) = index.key_of(ItemId::Track(track.id)) else {
            panic!("track {} is not indexed", track.id);
        };
        assert_eq!(index.tracks[key].id, track.id);
        assert_eq!(index.playlists["Mixed"].duration, Some(400));
    }
}
