use std::collections::{BTreeSet, HashSet};

use super::keys::{ItemId, ItemKey};
use super::snapshot::{SnapshotItem, SnapshotPlaylist};
use super::store::StoreIndex;
use crate::entities::playlist;

/// Playlist titles split by where they occur.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PlaylistDelta {
    /// Only in the snapshot
    pub to_add: BTreeSet<String>,
    /// Only in the store
    pub to_remove: BTreeSet<String>,
    /// In both
    pub kept: BTreeSet<String>,
}

pub fn playlist_delta<'a, S, N>(store_titles: S, snapshot_titles: N) -> PlaylistDelta
where
    S: IntoIterator<Item = &'a str>,
    N: IntoIterator<Item = &'a str>,
{
    let store: BTreeSet<&str> = store_titles.into_iter().collect();
    let snapshot: BTreeSet<&str> = snapshot_titles.into_iter().collect();

    PlaylistDelta {
        to_add: snapshot
            .difference(&store)
            .map(|title| title.to_string())
            .collect(),
        to_remove: store
            .difference(&snapshot)
            .map(|title| title.to_string())
            .collect(),
        kept: store
            .intersection(&snapshot)
            .map(|title| title.to_string())
            .collect(),
    }
}

/// Item changes for one kept playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDelta<'s> {
    /// Snapshot order, one entry per key
    pub to_add: Vec<&'s SnapshotItem>,
    pub to_remove: Vec<ItemId>,
}

/// The cheap staleness check: member count or duration differs.
///
/// A substitution that keeps both the count and the duration goes unnoticed.
pub fn is_stale(index: &StoreIndex, stored: &playlist::Model, snapshot: &SnapshotPlaylist) -> bool {
    index.association(stored.id).count() != snapshot.distinct_keys().len()
        || stored.duration != snapshot.duration
}

/// Items to associate and members to drop for a kept playlist, or `None` when it is not stale.
pub fn item_delta<'s>(
    index: &StoreIndex,
    stored: &playlist::Model,
    snapshot: &'s SnapshotPlaylist,
) -> Option<ItemDelta<'s>> {
    if !is_stale(index, stored, snapshot) {
        return None;
    }

    let members = index.association(stored.id);
    let stored_keys: HashSet<&ItemKey> = members
        .members()
        .filter_map(|id| index.key_of(id))
        .collect();
    let snapshot_keys = snapshot.distinct_keys();

    Some(ItemDelta {
        to_add: new_items(snapshot.items.iter(), |key| stored_keys.contains(&key)),
        to_remove: members
            .members()
            .filter(|id| {
                index
                    .key_of(*id)
                    .is_none_or(|key| !snapshot_keys.contains(key))
            })
            .collect(),
    })
}

/// First occurrence of every item whose key is not `present`, in snapshot order.
pub fn new_items<'s>(
    items: impl Iterator<Item = &'s SnapshotItem>,
    present: impl Fn(&ItemKey) -> bool,
) -> Vec<&'s SnapshotItem> {
    let mut seen = HashSet::new();

    items
        .filter(|item| {
            let key = item.key();
            !present(&key) && seen.insert(key)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::playlist::PlaylistCategory;
    use crate::entities::{playlist_track, track};
    use crate::services::sync::keys::TrackKey;
    use crate::services::sync::snapshot::TrackAttrs;
    use crate::test_utils::test_db;
    use sea_orm::{ActiveModelBehavior, ActiveModelTrait, Set};

    fn snapshot_track(title: &str, number: i32) -> SnapshotItem {
        SnapshotItem::Track(
            TrackKey {
                title: title.into(),
                track_number: number,
                album_title: "Album".into(),
                artist_name: "Artist".into(),
            },
            TrackAttrs {
                album_year: None,
                duration: Some(100),
            },
        )
    }

    fn snapshot_playlist(title: &str, duration: i64, items: Vec<SnapshotItem>) -> SnapshotPlaylist {
        SnapshotPlaylist {
            rating_key: "1".into(),
            title: title.into(),
            category: PlaylistCategory::Audio,
            duration: Some(duration),
            thumbnail: None,
            items,
            skipped_items: 0,
        }
    }

    #[test]
    fn test_playlist_delta_partitions_titles() {
        let store = ["A", "B", "C"];
        let snapshot = ["B", "C", "D"];

        let delta = playlist_delta(store, snapshot);

        assert_eq!(delta.to_add, BTreeSet::from(["D".to_string()]));
        assert_eq!(delta.to_remove, BTreeSet::from(["A".to_string()]));
        assert_eq!(
            delta.kept,
            BTreeSet::from(["B".to_string(), "C".to_string()])
        );

        let snapshot_titles: BTreeSet<String> = snapshot.iter().map(|t| t.to_string()).collect();
        let store_titles: BTreeSet<String> = store.iter().map(|t| t.to_string()).collect();
        assert_eq!(
            delta.to_add.union(&delta.kept).cloned().collect::<BTreeSet<_>>(),
            snapshot_titles
        );
        assert_eq!(
            delta.to_remove.union(&delta.kept).cloned().collect::<BTreeSet<_>>(),
            store_titles
        );
    }

    #[test]
    fn test_new_items_keeps_order_and_dedups() {
        let items = vec![
            snapshot_track("B", 2),
            snapshot_track("A", 1),
            snapshot_track("B", 2),
            snapshot_track("C", 3),
        ];

        let added = new_items(items.iter(), |key| {
            matches!(key, ItemKey::Track(k) if k.title == "C")
        });

        assert_eq!(added, vec![&items[0], &items[1]]);
    }

    #[tokio::test]
    async fn test_item_delta() {
        let db = test_db().await;

        let stored = playlist::ActiveModel {
            title: Set("Party".into()),
            category: Set(PlaylistCategory::Audio),
            duration: Set(Some(200)),
            ..playlist::ActiveModel::new()
        }
        .insert(&db.conn)
        .await
        .unwrap();

        for (title, number) in [("Keep", 1), ("Drop", 2)] {
            let track = track::ActiveModel {
                title: Set(title.into()),
                track_number: Set(number),
                album_title: Set("Album".into()),
                artist_name: Set("Artist".into()),
                ..track::ActiveModel::new()
            }
            .insert(&db.conn)
            .await
            .unwrap();

            playlist_track::ActiveModel {
                playlist_id: Set(stored.id),
                track_id: Set(track.id),
                ..playlist_track::ActiveModel::new()
            }
            .insert(&db.conn)
            .await
            .unwrap();
        }

        let index = StoreIndex::load(&db.conn).await.unwrap();

        // Same count, same duration: not stale even though membership differs
        let unchanged = snapshot_playlist(
            "Party",
            200,
            vec![snapshot_track("Keep", 1), snapshot_track("New", 3)],
        );
        assert!(!is_stale(&index, &stored, &unchanged));
        assert_eq!(item_delta(&index, &stored, &unchanged), None);

        let changed = snapshot_playlist(
            "Party",
            300,
            vec![snapshot_track("Keep", 1), snapshot_track("New", 3)],
        );
        let delta = item_delta(&index, &stored, &changed).unwrap();

        assert_eq!(delta.to_add, vec![&changed.items[1]]);
        let dropped = index.tracks.values().find(|t| t.title == "Drop").unwrap();
        assert_eq!(delta.to_remove, vec![ItemId::Track(dropped.id)]);
    }
}
