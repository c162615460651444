use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

use crate::media_ids::MediaIds;

/// The one timestamp an outbound entry carries. Collection and history
/// writes are mutually exclusive, so an entry can never hold both.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStamp {
    CollectedAt(DateTime<Utc>),
    WatchedAt(DateTime<Utc>),
}

/// Outbound payload for one write call (add or remove, collection or history).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncItems {
    #[serde(default)]
    pub movies: Vec<SyncMovie>,
    #[serde(default)]
    pub shows: Vec<SyncShow>,
}

impl SyncItems {
    pub fn movies(movies: Vec<SyncMovie>) -> Self {
        Self { movies, shows: Vec::new() }
    }

    pub fn shows(shows: Vec<SyncShow>) -> Self {
        Self { movies: Vec::new(), shows }
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty() && self.shows.is_empty()
    }

    pub fn episode_count(&self) -> usize {
        self.shows
            .iter()
            .flat_map(|s| s.seasons.iter())
            .map(|s| s.episodes.len())
            .sum()
    }

    /// Split into one payload per `size` shows, movies travelling with the
    /// first chunk. A `size` of zero keeps everything in one payload.
    pub fn into_chunks(self, size: usize) -> Vec<SyncItems> {
        if self.is_empty() {
            return Vec::new();
        }
        if size == 0 || self.shows.len() <= size {
            return vec![self];
        }

        let mut chunks = Vec::new();
        let mut movies = self.movies;
        let mut shows = self.shows.into_iter().peekable();
        while shows.peek().is_some() {
            let batch: Vec<SyncShow> = shows.by_ref().take(size).collect();
            chunks.push(SyncItems {
                movies: std::mem::take(&mut movies),
                shows: batch,
            });
        }
        chunks
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncMovie {
    pub ids: MediaIds,
    #[serde(default)]
    pub stamp: Option<SyncStamp>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncShow {
    pub ids: MediaIds,
    #[serde(default)]
    pub stamp: Option<SyncStamp>,
    #[serde(default)]
    pub seasons: Vec<SyncSeason>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncSeason {
    pub number: u32,
    #[serde(default)]
    pub episodes: Vec<SyncEpisode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncEpisode {
    pub number: u32,
    #[serde(default)]
    pub stamp: Option<SyncStamp>,
}

/// Per-kind counters reported by the tracking service after a write call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncStats {
    #[serde(default)]
    pub movies: u32,
    #[serde(default)]
    pub shows: u32,
    #[serde(default)]
    pub seasons: u32,
    #[serde(default)]
    pub episodes: u32,
}

impl SyncStats {
    pub fn is_zero(&self) -> bool {
        self.movies == 0 && self.shows == 0 && self.seasons == 0 && self.episodes == 0
    }

    /// e.g. `2 Movies 3 Episodes`; zero counters are left out.
    pub fn describe(&self) -> String {
        let parts: Vec<String> = [
            (self.movies, "Movies"),
            (self.shows, "Shows"),
            (self.seasons, "Seasons"),
            (self.episodes, "Episodes"),
        ]
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, label)| format!("{} {}", n, label))
        .collect();
        if parts.is_empty() {
            "0".to_string()
        } else {
            parts.join(" ")
        }
    }
}

impl AddAssign for SyncStats {
    fn add_assign(&mut self, rhs: Self) {
        self.movies += rhs.movies;
        self.shows += rhs.shows;
        self.seasons += rhs.seasons;
        self.episodes += rhs.episodes;
    }
}

/// Result of one write call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncResponse {
    #[serde(default)]
    pub added: SyncStats,
    #[serde(default)]
    pub existing: SyncStats,
    #[serde(default)]
    pub deleted: SyncStats,
    /// Entries the service could not resolve, as submitted.
    #[serde(default)]
    pub not_found: SyncItems,
}

impl AddAssign for SyncResponse {
    fn add_assign(&mut self, rhs: Self) {
        self.added += rhs.added;
        self.existing += rhs.existing;
        self.deleted += rhs.deleted;
        self.not_found.movies.extend(rhs.not_found.movies);
        self.not_found.shows.extend(rhs.not_found.shows);
    }
}
