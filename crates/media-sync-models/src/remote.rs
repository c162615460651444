use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media_ids::MediaIds;

/// A movie as listed by the tracking service, either from the collection or
/// from the watched list. Which timestamps are filled depends on the list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RemoteMovie {
    pub title: String,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub ids: MediaIds,
    #[serde(default)]
    pub collected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_watched_at: Option<DateTime<Utc>>,
    /// Number of recorded plays; anything above zero means watched.
    #[serde(default)]
    pub plays: u32,
}

impl RemoteMovie {
    pub fn is_watched(&self) -> bool {
        self.plays > 0 || self.last_watched_at.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RemoteShow {
    pub title: String,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub ids: MediaIds,
    /// Show-level collection timestamp (the most recent episode collected).
    #[serde(default)]
    pub collected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_watched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub plays: u32,
    #[serde(default)]
    pub seasons: Vec<RemoteSeason>,
}

impl RemoteShow {
    pub fn is_watched(&self) -> bool {
        self.plays > 0 || self.last_watched_at.is_some()
    }

    pub fn episode_count(&self) -> usize {
        self.seasons.iter().map(|s| s.episodes.len()).sum()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RemoteSeason {
    pub number: u32,
    #[serde(default)]
    pub episodes: Vec<RemoteEpisode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RemoteEpisode {
    pub number: u32,
    #[serde(default)]
    pub collected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_watched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub plays: u32,
}

impl RemoteEpisode {
    pub fn is_watched(&self) -> bool {
        self.plays > 0 || self.last_watched_at.is_some()
    }
}

/// Read-only view over the remote fields the merge rules look at, shared by
/// every level of the hierarchy.
pub trait RemoteRecord {
    fn collected_at(&self) -> Option<DateTime<Utc>>;
    fn last_watched_at(&self) -> Option<DateTime<Utc>>;
    fn is_watched(&self) -> bool;
}

/// Remote records that carry an identity set.
pub trait RemoteIdentified: RemoteRecord {
    fn ids(&self) -> &MediaIds;
    fn title(&self) -> &str;
}

impl RemoteRecord for RemoteMovie {
    fn collected_at(&self) -> Option<DateTime<Utc>> {
        self.collected_at
    }

    fn last_watched_at(&self) -> Option<DateTime<Utc>> {
        self.last_watched_at
    }

    fn is_watched(&self) -> bool {
        RemoteMovie::is_watched(self)
    }
}

impl RemoteIdentified for RemoteMovie {
    fn ids(&self) -> &MediaIds {
        &self.ids
    }

    fn title(&self) -> &str {
        &self.title
    }
}

impl RemoteRecord for RemoteShow {
    fn collected_at(&self) -> Option<DateTime<Utc>> {
        self.collected_at
    }

    fn last_watched_at(&self) -> Option<DateTime<Utc>> {
        self.last_watched_at
    }

    fn is_watched(&self) -> bool {
        RemoteShow::is_watched(self)
    }
}

impl RemoteIdentified for RemoteShow {
    fn ids(&self) -> &MediaIds {
        &self.ids
    }

    fn title(&self) -> &str {
        &self.title
    }
}

impl RemoteRecord for RemoteEpisode {
    fn collected_at(&self) -> Option<DateTime<Utc>> {
        self.collected_at
    }

    fn last_watched_at(&self) -> Option<DateTime<Utc>> {
        self.last_watched_at
    }

    fn is_watched(&self) -> bool {
        RemoteEpisode::is_watched(self)
    }
}
