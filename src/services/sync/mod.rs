//! Reconciles the local store with the Plex catalog.
//!
//! One run reads the catalog and the store, computes playlist and item deltas, resolves
//! items to entities by natural key and commits everything in a single transaction.

pub mod commit;
pub mod diff;
pub mod error;
pub mod keys;
pub mod resolver;
pub mod snapshot;
pub mod store;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use crate::database::Database;
use crate::ports::plex::PlexCatalog;

use commit::{CommitPlan, CommitStats, PlaylistAttrs, commit};
use diff::{item_delta, new_items, playlist_delta};
pub use error::SyncError;
use resolver::Resolver;
use snapshot::{Snapshot, SnapshotPlaylist, fetch_snapshot};
use store::StoreIndex;

/// What a run did to one playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistOutcome {
    Created,
    Deleted,
    Updated,
    Untouched,
    /// The snapshot playlist could not be read
    Skipped,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub outcomes: BTreeMap<String, PlaylistOutcome>,
    pub items_associated: usize,
    pub items_disassociated: usize,
    pub entities_created: usize,
    pub entities_updated: usize,
    /// Snapshot items dropped by validation
    pub items_skipped: usize,
    /// Whether a transaction was committed
    pub committed: bool,
}

impl SyncReport {
    pub fn count(&self, outcome: PlaylistOutcome) -> usize {
        self.outcomes.values().filter(|o| **o == outcome).count()
    }

    fn record(&mut self, title: &str, outcome: PlaylistOutcome) {
        self.outcomes.insert(title.to_string(), outcome);
    }

    fn apply(&mut self, stats: CommitStats) {
        self.items_associated = stats.items_associated;
        self.items_disassociated = stats.items_disassociated;
        self.entities_created = stats.entities_created;
        self.entities_updated = stats.entities_updated;
        self.committed = true;
    }
}

pub struct SyncService<C: PlexCatalog> {
    db: Arc<Database>,
    catalog: C,
    fetch_timeout: Duration,
}

impl<C: PlexCatalog> SyncService<C> {
    pub fn new(db: Arc<Database>, catalog: C, fetch_timeout: Duration) -> Self {
        Self {
            db,
            catalog,
            fetch_timeout,
        }
    }

    /// Runs one reconciliation. Either everything is written or nothing is.
    #[instrument(skip(self), fields(fetch_timeout = ?self.fetch_timeout))]
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let started = Instant::now();

        let snapshot = fetch_snapshot(&self.catalog, self.fetch_timeout).await?;
        let index = StoreIndex::load(&self.db.conn).await?;

        let (plan, mut report) = plan_run(&snapshot, &index);

        if plan.is_empty() {
            info!(
                "Store already matches Plex ({} playlists), nothing to write",
                report.count(PlaylistOutcome::Untouched)
            );
            return Ok(report);
        }

        let stats = commit(&self.db.conn, plan).await?;
        report.apply(stats);

        info!(
            created = report.count(PlaylistOutcome::Created),
            updated = report.count(PlaylistOutcome::Updated),
            deleted = report.count(PlaylistOutcome::Deleted),
            untouched = report.count(PlaylistOutcome::Untouched),
            skipped = report.count(PlaylistOutcome::Skipped),
            items_associated = report.items_associated,
            items_disassociated = report.items_disassociated,
            "Reconciled store with Plex in {:?}",
            started.elapsed()
        );

        Ok(report)
    }
}

fn attrs_of(playlist: &SnapshotPlaylist) -> PlaylistAttrs {
    PlaylistAttrs {
        category: playlist.category,
        duration: playlist.duration,
        thumbnail: playlist.thumbnail.clone(),
    }
}

/// Decides every write of a run without touching the store.
fn plan_run(snapshot: &Snapshot, index: &StoreIndex) -> (CommitPlan, SyncReport) {
    let mut report = SyncReport::default();
    let mut resolver = Resolver::seed(index);

    let mut created_playlists = Vec::new();
    let mut refreshed_playlists = Vec::new();
    let mut removed_playlists = Vec::new();
    let mut associate = BTreeSet::new();
    let mut disassociate = BTreeSet::new();

    // Unreadable playlists keep whatever the store has for them
    let store_titles = index
        .playlists
        .keys()
        .map(String::as_str)
        .filter(|title| !snapshot.skipped.contains(*title));
    let delta = playlist_delta(store_titles, snapshot.titles());
    tracing::debug!(
        "Playlists: {} to add, {} to remove, {} kept",
        delta.to_add.len(),
        delta.to_remove.len(),
        delta.kept.len()
    );

    for title in &snapshot.skipped {
        report.record(title, PlaylistOutcome::Skipped);
    }

    for title in &delta.to_remove {
        if let Some(stored) = index.playlists.get(title) {
            removed_playlists.push(stored.id);
            report.record(title, PlaylistOutcome::Deleted);
        }
    }

    for playlist in &snapshot.playlists {
        report.items_skipped += playlist.skipped_items;

        let Some(stored) = index.playlists.get(&playlist.title) else {
            for item in new_items(playlist.items.iter(), |_| false) {
                associate.insert((playlist.title.clone(), resolver.resolve(item)));
            }
            created_playlists.push((playlist.title.clone(), attrs_of(playlist)));
            report.record(&playlist.title, PlaylistOutcome::Created);
            continue;
        };

        match item_delta(index, stored, playlist) {
            None => report.record(&playlist.title, PlaylistOutcome::Untouched),
            Some(delta) => {
                for item in delta.to_add {
                    associate.insert((playlist.title.clone(), resolver.resolve(item)));
                }
                for id in delta.to_remove {
                    disassociate.insert((stored.id, id));
                }
                refreshed_playlists.push((stored.clone(), attrs_of(playlist)));
                report.record(&playlist.title, PlaylistOutcome::Updated);
            }
        }
    }

    let plan = CommitPlan {
        created_playlists,
        refreshed_playlists,
        removed_playlists,
        writes: resolver.into_pending(),
        associate,
        disassociate,
    };

    (plan, report)
}
