// Identity matching between local entities and remote items

use media_sync_models::{IdNamespace, MediaIds};

/// First namespace, in priority order, holding the same value on both sides.
///
/// A namespace present on both sides with different values does not stop the
/// search; the next namespace is tried. Absent values never match.
pub fn matching_namespace(
    local: &MediaIds,
    remote: &MediaIds,
    namespaces: &[IdNamespace],
) -> Option<IdNamespace> {
    namespaces.iter().copied().find(|ns| {
        match (local.get(*ns), remote.get(*ns)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    })
}

pub fn matches(local: &MediaIds, remote: &MediaIds, namespaces: &[IdNamespace]) -> bool {
    matching_namespace(local, remote, namespaces).is_some()
}
