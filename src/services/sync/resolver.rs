use std::collections::HashMap;
use std::hash::Hash;

use super::keys::{EpisodeKey, ItemKey, MovieKey, PhotoKey, TrackKey};
use super::snapshot::{EpisodeAttrs, MovieAttrs, PhotoAttrs, SnapshotItem, TrackAttrs};
use super::store::StoreIndex;

#[derive(Debug)]
struct Slot<A> {
    /// `None` until the row is inserted
    id: Option<i64>,
    attrs: A,
    dirty: bool,
}

/// Rows of one item table that must be written.
#[derive(Debug)]
pub struct Pending<K, A> {
    pub created: Vec<(K, A)>,
    pub updated: Vec<(i64, A)>,
    /// Ids of every row that already existed, by key
    pub existing: HashMap<K, i64>,
}

impl<K, A> Pending<K, A> {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty()
    }
}

/// Writes collected by a [`Resolver`], per item table.
#[derive(Debug)]
pub struct PendingWrites {
    pub tracks: Pending<TrackKey, TrackAttrs>,
    pub episodes: Pending<EpisodeKey, EpisodeAttrs>,
    pub movies: Pending<MovieKey, MovieAttrs>,
    pub photos: Pending<PhotoKey, PhotoAttrs>,
}

impl PendingWrites {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
            && self.episodes.is_empty()
            && self.movies.is_empty()
            && self.photos.is_empty()
    }

    pub fn created(&self) -> usize {
        self.tracks.created.len()
            + self.episodes.created.len()
            + self.movies.created.len()
            + self.photos.created.len()
    }

    pub fn updated(&self) -> usize {
        self.tracks.updated.len()
            + self.episodes.updated.len()
            + self.movies.updated.len()
            + self.photos.updated.len()
    }
}

/// Run-scoped map from natural key to entity, seeded from the store.
///
/// Resolving a key that is already known refreshes its mutable attributes; an unknown key
/// becomes a new entity. Each key maps to exactly one entity for the whole run.
#[derive(Debug, Default)]
pub struct Resolver {
    tracks: HashMap<TrackKey, Slot<TrackAttrs>>,
    episodes: HashMap<EpisodeKey, Slot<EpisodeAttrs>>,
    movies: HashMap<MovieKey, Slot<MovieAttrs>>,
    photos: HashMap<PhotoKey, Slot<PhotoAttrs>>,
}

impl Resolver {
    pub fn seed(index: &StoreIndex) -> Self {
        fn existing<A>(id: i64, attrs: A) -> Slot<A> {
            Slot {
                id: Some(id),
                attrs,
                dirty: false,
            }
        }

        Self {
            tracks: index
                .tracks
                .iter()
                .map(|(key, m)| {
                    let attrs = TrackAttrs {
                        album_year: m.album_year,
                        duration: m.duration,
                    };
                    (key.clone(), existing(m.id, attrs))
                })
                .collect(),
            episodes: index
                .episodes
                .iter()
                .map(|(key, m)| {
                    let attrs = EpisodeAttrs {
                        show_year: m.show_year,
                        duration: m.duration,
                    };
                    (key.clone(), existing(m.id, attrs))
                })
                .collect(),
            movies: index
                .movies
                .iter()
                .map(|(key, m)| {
                    let attrs = MovieAttrs {
                        thumbnail: m.thumbnail.clone(),
                    };
                    (key.clone(), existing(m.id, attrs))
                })
                .collect(),
            photos: index
                .photos
                .iter()
                .map(|(key, m)| {
                    let attrs = PhotoAttrs {
                        file_path: m.file_path.clone(),
                    };
                    (key.clone(), existing(m.id, attrs))
                })
                .collect(),
        }
    }

    pub fn resolve(&mut self, item: &SnapshotItem) -> ItemKey {
        match item {
            SnapshotItem::Track(key, attrs) => {
                resolve_in(&mut self.tracks, key, attrs);
                ItemKey::Track(key.clone())
            }
            SnapshotItem::Episode(key, attrs) => {
                resolve_in(&mut self.episodes, key, attrs);
                ItemKey::Episode(key.clone())
            }
            SnapshotItem::Movie(key, attrs) => {
                resolve_in(&mut self.movies, key, attrs);
                ItemKey::Movie(key.clone())
            }
            SnapshotItem::Photo(key, attrs) => {
                resolve_in(&mut self.photos, key, attrs);
                ItemKey::Photo(key.clone())
            }
        }
    }

    /// Ends the run, handing over the rows to insert and update.
    pub fn into_pending(self) -> PendingWrites {
        PendingWrites {
            tracks: split(self.tracks),
            episodes: split(self.episodes),
            movies: split(self.movies),
            photos: split(self.photos),
        }
    }
}

fn resolve_in<K, A>(slots: &mut HashMap<K, Slot<A>>, key: &K, attrs: &A)
where
    K: Hash + Eq + Clone,
    A: PartialEq + Clone,
{
    match slots.get_mut(key) {
        Some(slot) => {
            if slot.attrs != *attrs {
                slot.attrs = attrs.clone();
                slot.dirty = slot.id.is_some();
            }
        }
        None => {
            slots.insert(
                key.clone(),
                Slot {
                    id: None,
                    attrs: attrs.clone(),
                    dirty: false,
                },
            );
        }
    }
}

fn split<K: Hash + Eq, A>(slots: HashMap<K, Slot<A>>) -> Pending<K, A> {
    let mut pending = Pending {
        created: Vec::new(),
        updated: Vec::new(),
        existing: HashMap::new(),
    };

    for (key, slot) in slots {
        match slot.id {
            None => pending.created.push((key, slot.attrs)),
            Some(id) => {
                if slot.dirty {
                    pending.updated.push((id, slot.attrs));
                }
                pending.existing.insert(key, id);
            }
        }
    }

    pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{movie, track};
    use chrono::Utc;

    fn track_key(title: &str) -> TrackKey {
        TrackKey {
            title: title.into(),
            track_number: 1,
            album_title: "Pump".into(),
            artist_name: "DJ Flex".into(),
        }
    }

    fn seeded_index() -> StoreIndex {
        let now = Utc::now();
        let mut index = StoreIndex::default();
        index.tracks.insert(
            track_key("Run"),
            track::Model {
                id: 7,
                title: "Run".into(),
                track_number: 1,
                album_title: "Pump".into(),
                album_year: Some(2020),
                artist_name: "DJ Flex".into(),
                duration: Some(200),
                created_at: now,
                updated_at: now,
            },
        );
        let movie_key = MovieKey {
            title: "Heat".into(),
            year: 1995,
            duration: 10_000,
        };
        index.movies.insert(
            movie_key,
            movie::Model {
                id: 3,
                title: "Heat".into(),
                year: 1995,
                duration: 10_000,
                thumbnail: Some("/thumb/old".into()),
                created_at: now,
                updated_at: now,
            },
        );
        index
    }

    #[test]
    fn test_new_key_is_created_once() {
        let mut resolver = Resolver::seed(&StoreIndex::default());
        let item = SnapshotItem::Track(
            track_key("Jump"),
            TrackAttrs {
                album_year: None,
                duration: Some(180),
            },
        );

        let first = resolver.resolve(&item);
        let second = resolver.resolve(&item);
        assert_eq!(first, second);

        let pending = resolver.into_pending();
        assert_eq!(pending.tracks.created.len(), 1);
        assert_eq!(pending.created(), 1);
        assert_eq!(pending.updated(), 0);
    }

    #[test]
    fn test_known_key_unchanged_is_not_written() {
        let mut resolver = Resolver::seed(&seeded_index());
        resolver.resolve(&SnapshotItem::Track(
            track_key("Run"),
            TrackAttrs {
                album_year: Some(2020),
                duration: Some(200),
            },
        ));

        let pending = resolver.into_pending();
        assert!(pending.is_empty());
        assert_eq!(pending.tracks.existing.get(&track_key("Run")), Some(&7));
    }

    #[test]
    fn test_known_key_with_new_attributes_is_updated() {
        let mut resolver = Resolver::seed(&seeded_index());
        resolver.resolve(&SnapshotItem::Movie(
            MovieKey {
                title: "Heat".into(),
                year: 1995,
                duration: 10_000,
            },
            MovieAttrs {
                thumbnail: Some("/thumb/new".into()),
            },
        ));

        let pending = resolver.into_pending();
        assert_eq!(pending.created(), 0);
        assert_eq!(
            pending.movies.updated,
            vec![(
                3,
                MovieAttrs {
                    thumbnail: Some("/thumb/new".into())
                }
            )]
        );
    }
}
