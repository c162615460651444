// Episode-level reconciliation inside an already matched show

use std::collections::HashSet;

use media_sync_models::{EpisodeKey, RemoteShow, Show};
use tracing::trace;

use crate::diff::{persist_entity, DiffStats};
use crate::library::{EntityRef, EntityStore};
use crate::merge::merge_record;

/// Merge every remote episode into the local episode with the same
/// (season, episode) pair and return the keys that were found locally.
///
/// Remote episodes without a local counterpart are ignored. Each changed
/// episode is persisted on its own, independently of the show.
pub fn reconcile_episodes(
    show: &mut Show,
    remote: &RemoteShow,
    store: &dyn EntityStore,
    stats: &mut DiffStats,
) -> HashSet<EpisodeKey> {
    let mut represented = HashSet::new();

    for remote_season in &remote.seasons {
        for remote_episode in &remote_season.episodes {
            let key = EpisodeKey {
                season: remote_season.number,
                episode: remote_episode.number,
            };
            let Some(episode) = show.episode_mut(key.season, key.episode) else {
                trace!("{} is not in the library", key);
                continue;
            };
            represented.insert(key);

            let outcome = merge_record(episode, remote_episode);
            if outcome.dirty {
                let show: &Show = show;
                if let Some(episode) = show.episode(key.season, key.episode) {
                    persist_entity(store, EntityRef::Episode { show, episode }, stats);
                }
            }
        }
    }

    represented
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::StoreError;
    use chrono::{DateTime, TimeZone, Utc};
    use media_sync_models::{Episode, RemoteEpisode, RemoteSeason};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl EntityStore for Recorder {
        fn persist(&self, entity: EntityRef<'_>) -> Result<(), StoreError> {
            self.0.lock().unwrap().push(entity.label());
            Ok(())
        }

        fn write_external_metadata(&self, _entity: EntityRef<'_>) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn show() -> Show {
        let mut show = Show::new("x", "Show X", date(2020, 1, 1));
        show.add_episode(Episode::new(1, 1, date(2020, 1, 1)));
        show.add_episode(Episode::new(1, 2, date(2020, 1, 2)));
        show
    }

    #[test]
    fn test_represented_only_for_local_episodes() {
        let mut show = show();
        let remote = RemoteShow {
            title: "Show X".to_string(),
            seasons: vec![RemoteSeason {
                number: 1,
                episodes: vec![
                    RemoteEpisode { number: 1, collected_at: Some(date(2020, 1, 1)), ..Default::default() },
                    RemoteEpisode { number: 9, collected_at: Some(date(2020, 1, 1)), ..Default::default() },
                ],
            }],
            ..RemoteShow::default()
        };
        let store = Recorder::default();
        let mut stats = DiffStats::default();

        let represented = reconcile_episodes(&mut show, &remote, &store, &mut stats);

        assert_eq!(represented, HashSet::from([EpisodeKey { season: 1, episode: 1 }]));
        assert_eq!(show.episode_count(), 2);
        assert_eq!(stats.updated, 0);
        assert!(store.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_changed_episode_persisted_alone() {
        let mut show = show();
        let remote = RemoteShow {
            seasons: vec![RemoteSeason {
                number: 1,
                episodes: vec![RemoteEpisode {
                    number: 2,
                    collected_at: Some(date(2019, 6, 1)),
                    ..Default::default()
                }],
            }],
            ..RemoteShow::default()
        };
        let store = Recorder::default();
        let mut stats = DiffStats::default();

        reconcile_episodes(&mut show, &remote, &store, &mut stats);

        assert_eq!(show.episode(1, 2).unwrap().date_added, date(2019, 6, 1));
        assert_eq!(stats.updated, 1);
        assert_eq!(*store.0.lock().unwrap(), vec!["Show X S01E02".to_string()]);
    }
}
