// Collection diffing: match remote items against local entities, merge the
// matches, and compute the residual that still has to be sent out.

use std::collections::{HashMap, HashSet};

use media_sync_models::{
    EpisodeKey, Identified, Movie, RemoteIdentified, RemoteMovie, RemoteShow, Show, Trackable,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::episodes::reconcile_episodes;
use crate::error::SyncError;
use crate::id_matching::matching_namespace;
use crate::library::{AsEntityRef, EntityRef, EntityStore};
use crate::merge::merge_entity;

/// Counters for one reconcile pass.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DiffStats {
    /// Local entities matched by a remote item.
    pub matched: usize,
    /// Entities (including episodes) that changed and were written back.
    pub updated: usize,
    /// Per-entity persistence failures.
    pub errors: Vec<String>,
}

/// Result of [`diff_collection`]: indices into the local slice.
#[derive(Debug, Clone, Default)]
pub struct CollectionDiff {
    /// Candidates without a remote counterpart, in candidate order.
    pub residual: Vec<usize>,
    pub matched: Vec<usize>,
    pub stats: DiffStats,
    /// The walk stopped early; `residual` is incomplete and must not be sent.
    pub cancelled: bool,
}

pub type MovieDiff = CollectionDiff;

/// Result of [`diff_shows`].
#[derive(Debug, Clone, Default)]
pub struct ShowDiff {
    /// Episodes already known remotely, per matched show index.
    pub represented: HashMap<usize, HashSet<EpisodeKey>>,
    /// Candidate shows with no remote match at all.
    pub unmatched: Vec<usize>,
    pub stats: DiffStats,
    pub cancelled: bool,
}

/// Write an entity back: metadata file first, then the store.
/// Failures are logged and recorded, never propagated.
pub(crate) fn persist_entity(store: &dyn EntityStore, entity: EntityRef<'_>, stats: &mut DiffStats) {
    let result = store
        .write_external_metadata(entity)
        .and_then(|_| store.persist(entity));
    match result {
        Ok(()) => stats.updated += 1,
        Err(e) => {
            let err = SyncError::EntityReconcile {
                entity: entity.label(),
                reason: e.to_string(),
            };
            warn!("{}", err);
            stats.errors.push(err.to_string());
        }
    }
}

/// Walk `remote` against the `candidates` of `local`.
///
/// For every remote item, every remaining candidate that matches it is merged,
/// persisted when dirty, handed to `on_match`, and removed from the working
/// set. Candidates left over form the residual. Cancellation is checked once
/// per remote item; a cancelled walk still returns what it merged so far.
pub fn diff_collection<L, R, F>(
    local: &mut [L],
    candidates: &[usize],
    remote: &[R],
    store: &dyn EntityStore,
    cancel: &CancellationToken,
    mut on_match: F,
) -> CollectionDiff
where
    L: Identified + AsEntityRef,
    R: RemoteIdentified,
    F: FnMut(usize, &mut L, &R, &dyn EntityStore, &mut DiffStats),
{
    let mut working: Vec<usize> = candidates.to_vec();
    let mut diff = CollectionDiff::default();

    for remote_item in remote {
        if cancel.is_cancelled() {
            diff.cancelled = true;
            break;
        }

        // Reverse so that removal keeps the remaining positions valid.
        for pos in (0..working.len()).rev() {
            let idx = working[pos];
            let entity = &mut local[idx];
            let namespaces = entity.kind().namespaces();
            let Some(ns) = matching_namespace(entity.ids(), remote_item.ids(), namespaces) else {
                continue;
            };
            trace!("'{}' matches '{}' on {}", entity.label(), remote_item.title(), ns);

            let outcome = merge_entity(&mut *entity, remote_item);
            on_match(idx, &mut *entity, remote_item, store, &mut diff.stats);
            if outcome.dirty {
                persist_entity(store, entity.as_entity_ref(), &mut diff.stats);
            }

            diff.stats.matched += 1;
            diff.matched.push(idx);
            working.remove(pos);
        }
    }

    diff.residual = working;
    diff
}

pub fn diff_movies(
    movies: &mut [Movie],
    candidates: &[usize],
    remote: &[RemoteMovie],
    store: &dyn EntityStore,
    cancel: &CancellationToken,
) -> MovieDiff {
    diff_collection(movies, candidates, remote, store, cancel, |_, _, _, _, _| {})
}

/// Show-level diff plus episode reconciliation for every matched show.
pub fn diff_shows(
    shows: &mut [Show],
    candidates: &[usize],
    remote: &[RemoteShow],
    store: &dyn EntityStore,
    cancel: &CancellationToken,
) -> ShowDiff {
    let mut represented: HashMap<usize, HashSet<EpisodeKey>> = HashMap::new();
    let diff = diff_collection(shows, candidates, remote, store, cancel, |idx, show, remote_show, store, stats| {
        let episodes = reconcile_episodes(show, remote_show, store, stats);
        represented.entry(idx).or_default().extend(episodes);
    });

    ShowDiff {
        represented,
        unmatched: diff.residual,
        stats: diff.stats,
        cancelled: diff.cancelled,
    }
}
