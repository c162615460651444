// Field merge rules: the remote side is authoritative for timestamps

use media_sync_models::{IdNamespace, Identified, RemoteIdentified, RemoteRecord, Trackable};
use tracing::{info, trace};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The entity must be written back (metadata file and store).
    pub dirty: bool,
    pub ids_filled: Vec<IdNamespace>,
    /// `last_watched` changed. Never makes the entity dirty on its own.
    pub last_watched_changed: bool,
}

/// Apply the timestamp and watched rules to one record.
///
/// 1. a remote collection timestamp that differs from `date_added` replaces it (dirty)
/// 2. remote watched and local not watched sets `watched` (dirty); `watched` is never cleared
/// 3. a remote last-watched timestamp that differs replaces `last_watched` (not dirty)
pub fn merge_record<L, R>(local: &mut L, remote: &R) -> MergeOutcome
where
    L: Trackable + ?Sized,
    R: RemoteRecord + ?Sized,
{
    let mut outcome = MergeOutcome::default();

    if let Some(collected_at) = remote.collected_at() {
        if collected_at != local.date_added() {
            trace!(
                "Marking '{}' as collected on {} (was {})",
                local.label(),
                collected_at,
                local.date_added()
            );
            local.set_date_added(collected_at);
            outcome.dirty = true;
        }
    }

    if remote.is_watched() && !local.is_watched() {
        info!("Marking '{}' as watched", local.label());
        local.mark_watched();
        outcome.dirty = true;
    }

    if let Some(last_watched_at) = remote.last_watched_at() {
        if Some(last_watched_at) != local.last_watched() {
            trace!(
                "Marking '{}' as watched on {} (was {:?})",
                local.label(),
                last_watched_at,
                local.last_watched()
            );
            local.set_last_watched(Some(last_watched_at));
            outcome.last_watched_changed = true;
        }
    }

    outcome
}

/// Backfill empty ids from the remote item, then apply [`merge_record`].
pub fn merge_entity<L, R>(local: &mut L, remote: &R) -> MergeOutcome
where
    L: Identified,
    R: RemoteIdentified,
{
    let namespaces = local.kind().namespaces();
    let mut ids_filled = Vec::new();
    for ns in namespaces {
        if local.ids_mut().fill_from(remote.ids(), *ns) {
            ids_filled.push(*ns);
        }
    }
    if !ids_filled.is_empty() {
        trace!("Filled ids {:?} of '{}' from remote", ids_filled, local.label());
    }

    let mut outcome = merge_record(local, remote);
    outcome.dirty |= !ids_filled.is_empty();
    outcome.ids_filled = ids_filled;
    outcome
}
