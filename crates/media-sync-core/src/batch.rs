// Outbound batch building for the collection and history directions

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use media_sync_models::{
    Episode, EpisodeKey, Movie, RemoteMovie, RemoteShow, Show, SyncEpisode, SyncItems, SyncMovie,
    SyncSeason, SyncShow, SyncStamp,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One sync direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Collection,
    Watched,
}

impl Direction {
    fn stamp(&self, collected_at: DateTime<Utc>, now: DateTime<Utc>) -> SyncStamp {
        match self {
            Direction::Collection => SyncStamp::CollectedAt(collected_at),
            Direction::Watched => SyncStamp::WatchedAt(now),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Collection => f.write_str("collection"),
            Direction::Watched => f.write_str("watched"),
        }
    }
}

/// What the builder produced. `items` is `None` when nothing is eligible, in
/// which case no write call must be made.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub items: Option<SyncItems>,
    /// Entities that would have been sent but carry no id at all.
    pub skipped: usize,
}

fn watched_here_only(watched: bool, last_watched: Option<DateTime<Utc>>) -> bool {
    watched && last_watched.is_none()
}

/// Build the movie batch for the residual movies.
///
/// Collection entries carry `date_added`; history entries carry `now`, and
/// only movies watched locally but not known to be watched remotely qualify.
pub fn build_movie_batch(
    movies: &[Movie],
    residual: &[usize],
    direction: Direction,
    now: DateTime<Utc>,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    let mut entries = Vec::new();

    for movie in residual.iter().filter_map(|idx| movies.get(*idx)) {
        if direction == Direction::Watched && !watched_here_only(movie.watched, movie.last_watched) {
            continue;
        }
        if !movie.ids.has_any() {
            outcome.skipped += 1;
            continue;
        }
        entries.push(SyncMovie {
            ids: movie.ids.clone().normalized(),
            stamp: Some(direction.stamp(movie.date_added, now)),
        });
    }

    if outcome.skipped > 0 {
        debug!("skipping {} movies, because they have not been scraped yet!", outcome.skipped);
    }
    if !entries.is_empty() {
        outcome.items = Some(SyncItems::movies(entries));
    }
    outcome
}

fn episode_entry(
    episode: &Episode,
    direction: Direction,
    represented: Option<&HashSet<EpisodeKey>>,
    now: DateTime<Utc>,
) -> Option<SyncEpisode> {
    if represented.is_some_and(|keys| keys.contains(&episode.key())) {
        return None;
    }
    if direction == Direction::Watched && !watched_here_only(episode.watched, episode.last_watched) {
        return None;
    }
    Some(SyncEpisode {
        number: episode.episode,
        stamp: Some(direction.stamp(episode.date_added, now)),
    })
}

/// Build the show batch for the candidate shows.
///
/// Only episodes not in `represented` qualify. Seasons without a qualifying
/// episode are left out, and so are shows without a qualifying season.
pub fn build_show_batch(
    shows: &[Show],
    candidates: &[usize],
    direction: Direction,
    represented: &HashMap<usize, HashSet<EpisodeKey>>,
    now: DateTime<Utc>,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    let mut entries = Vec::new();

    for idx in candidates {
        let Some(show) = shows.get(*idx) else {
            continue;
        };
        let known = represented.get(idx);

        let seasons: Vec<SyncSeason> = show
            .seasons
            .iter()
            .filter_map(|season| {
                let episodes: Vec<SyncEpisode> = season
                    .episodes
                    .iter()
                    .filter_map(|episode| episode_entry(episode, direction, known, now))
                    .collect();
                // Never send an empty season.
                (!episodes.is_empty()).then_some(SyncSeason {
                    number: season.number,
                    episodes,
                })
            })
            .collect();

        // An empty show would mean "the whole show" to the service.
        if seasons.is_empty() {
            continue;
        }
        if !show.ids.has_any() {
            outcome.skipped += 1;
            continue;
        }
        entries.push(SyncShow {
            ids: show.ids.clone().normalized(),
            stamp: Some(direction.stamp(show.date_added, now)),
            seasons,
        });
    }

    if outcome.skipped > 0 {
        debug!("skipping {} shows, because they have not been scraped yet!", outcome.skipped);
    }
    if !entries.is_empty() {
        outcome.items = Some(SyncItems::shows(entries));
    }
    outcome
}

/// Delete batch for every remote movie, without timestamps.
pub fn build_movie_removal(remote: &[RemoteMovie]) -> Option<SyncItems> {
    let movies: Vec<SyncMovie> = remote
        .iter()
        .filter(|m| m.ids.has_any())
        .map(|m| SyncMovie { ids: m.ids.clone(), stamp: None })
        .collect();
    (!movies.is_empty()).then(|| SyncItems::movies(movies))
}

/// Delete batch for every remote show, with all of its seasons and episodes.
pub fn build_show_removal(remote: &[RemoteShow]) -> Option<SyncItems> {
    let shows: Vec<SyncShow> = remote
        .iter()
        .filter(|s| s.ids.has_any())
        .map(|s| SyncShow {
            ids: s.ids.clone(),
            stamp: None,
            seasons: s
                .seasons
                .iter()
                .map(|season| SyncSeason {
                    number: season.number,
                    episodes: season
                        .episodes
                        .iter()
                        .map(|e| SyncEpisode { number: e.number, stamp: None })
                        .collect(),
                })
                .collect(),
        })
        .collect();
    (!shows.is_empty()).then(|| SyncItems::shows(shows))
}
