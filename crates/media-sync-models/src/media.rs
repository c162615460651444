use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::media_ids::{IdNamespace, MediaIds, MOVIE_NAMESPACES, SHOW_NAMESPACES};

/// Top-level kind of a library entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Show,
}

impl MediaKind {
    /// Id namespaces that identify this kind, in matching priority order.
    pub fn namespaces(&self) -> &'static [IdNamespace] {
        match self {
            MediaKind::Movie => MOVIE_NAMESPACES,
            MediaKind::Show => SHOW_NAMESPACES,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Movie => f.write_str("movies"),
            MediaKind::Show => f.write_str("shows"),
        }
    }
}

/// The state every synchronised record carries, whatever its level in the
/// hierarchy (movie, show, episode).
///
/// `watched` can only be raised through [`Trackable::mark_watched`]; nothing
/// in the sync engine ever lowers it.
pub trait Trackable {
    /// Human-readable label for logs.
    fn label(&self) -> String;
    fn date_added(&self) -> DateTime<Utc>;
    fn set_date_added(&mut self, date: DateTime<Utc>);
    fn is_watched(&self) -> bool;
    fn mark_watched(&mut self);
    fn last_watched(&self) -> Option<DateTime<Utc>>;
    fn set_last_watched(&mut self, date: Option<DateTime<Utc>>);
}

/// Entities that own an identity set. Episodes do not: their identity is
/// always (season, episode) inside an already matched show.
pub trait Identified: Trackable {
    fn kind(&self) -> MediaKind;
    fn ids(&self) -> &MediaIds;
    fn ids_mut(&mut self) -> &mut MediaIds;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    /// Stable library key (directory name, database key, ...).
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub ids: MediaIds,
    pub date_added: DateTime<Utc>,
    #[serde(default)]
    pub watched: bool,
    #[serde(default)]
    pub last_watched: Option<DateTime<Utc>>,
}

impl Movie {
    pub fn new(key: impl Into<String>, title: impl Into<String>, date_added: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            year: None,
            ids: MediaIds::new(),
            date_added,
            watched: false,
            last_watched: None,
        }
    }

    pub fn with_ids(mut self, ids: MediaIds) -> Self {
        self.ids = ids.normalized();
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Show {
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub ids: MediaIds,
    pub date_added: DateTime<Utc>,
    #[serde(default)]
    pub watched: bool,
    #[serde(default)]
    pub last_watched: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seasons: Vec<Season>,
}

impl Show {
    pub fn new(key: impl Into<String>, title: impl Into<String>, date_added: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            year: None,
            ids: MediaIds::new(),
            date_added,
            watched: false,
            last_watched: None,
            seasons: Vec::new(),
        }
    }

    pub fn with_ids(mut self, ids: MediaIds) -> Self {
        self.ids = ids.normalized();
        self
    }

    /// Add an episode, creating its season if needed. Seasons and episodes
    /// are kept ordered by number.
    pub fn add_episode(&mut self, episode: Episode) {
        let season_number = episode.season;
        let idx = match self.seasons.iter().position(|s| s.number == season_number) {
            Some(idx) => idx,
            None => {
                self.seasons.push(Season { number: season_number, episodes: Vec::new() });
                self.seasons.sort_by_key(|s| s.number);
                self.seasons
                    .iter()
                    .position(|s| s.number == season_number)
                    .unwrap_or(self.seasons.len() - 1)
            }
        };
        let season = &mut self.seasons[idx];
        season.episodes.push(episode);
        season.episodes.sort_by_key(|e| e.episode);
    }

    pub fn episode(&self, season: u32, episode: u32) -> Option<&Episode> {
        self.seasons
            .iter()
            .filter(|s| s.number == season)
            .flat_map(|s| s.episodes.iter())
            .find(|e| e.episode == episode)
    }

    pub fn episode_mut(&mut self, season: u32, episode: u32) -> Option<&mut Episode> {
        self.seasons
            .iter_mut()
            .filter(|s| s.number == season)
            .flat_map(|s| s.episodes.iter_mut())
            .find(|e| e.episode == episode)
    }

    pub fn episodes(&self) -> impl Iterator<Item = &Episode> {
        self.seasons.iter().flat_map(|s| s.episodes.iter())
    }

    pub fn episode_count(&self) -> usize {
        self.seasons.iter().map(|s| s.episodes.len()).sum()
    }

    /// Make every episode's season number agree with the season holding it.
    /// Returns how many episodes were corrected.
    pub fn normalize_seasons(&mut self) -> usize {
        let mut fixed = 0;
        for season in &mut self.seasons {
            for episode in &mut season.episodes {
                if episode.season != season.number {
                    episode.season = season.number;
                    fixed += 1;
                }
            }
        }
        fixed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Season {
    pub number: u32,
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Episode {
    pub season: u32,
    pub episode: u32,
    #[serde(default)]
    pub title: Option<String>,
    pub date_added: DateTime<Utc>,
    #[serde(default)]
    pub watched: bool,
    #[serde(default)]
    pub last_watched: Option<DateTime<Utc>>,
}

impl Episode {
    pub fn new(season: u32, episode: u32, date_added: DateTime<Utc>) -> Self {
        Self {
            season,
            episode,
            title: None,
            date_added,
            watched: false,
            last_watched: None,
        }
    }

    pub fn key(&self) -> EpisodeKey {
        EpisodeKey { season: self.season, episode: self.episode }
    }
}

/// Identity of an episode inside one show.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EpisodeKey {
    pub season: u32,
    pub episode: u32,
}

impl fmt::Display for EpisodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}E{:02}", self.season, self.episode)
    }
}

/// A top-level library entity, borrowed from a [`Library`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocalEntity<'a> {
    Movie(&'a Movie),
    Show(&'a Show),
}

impl LocalEntity<'_> {
    pub fn key(&self) -> &str {
        match self {
            LocalEntity::Movie(m) => &m.key,
            LocalEntity::Show(s) => &s.key,
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            LocalEntity::Movie(_) => MediaKind::Movie,
            LocalEntity::Show(_) => MediaKind::Show,
        }
    }

    pub fn label(&self) -> String {
        match self {
            LocalEntity::Movie(m) => m.label(),
            LocalEntity::Show(s) => s.label(),
        }
    }
}

/// The whole local library as handed to a sync operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Library {
    #[serde(default)]
    pub movies: Vec<Movie>,
    #[serde(default)]
    pub shows: Vec<Show>,
}

impl Library {
    pub fn new(movies: Vec<Movie>, shows: Vec<Show>) -> Self {
        Self { movies, shows }
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty() && self.shows.is_empty()
    }

    /// Look up a movie or show by library key. Movies win on a clash.
    pub fn get(&self, key: &str) -> Option<LocalEntity<'_>> {
        self.movies
            .iter()
            .find(|m| m.key == key)
            .map(LocalEntity::Movie)
            .or_else(|| self.shows.iter().find(|s| s.key == key).map(LocalEntity::Show))
    }
}

fn title_with_year(title: &str, year: Option<u32>) -> String {
    match year {
        Some(y) => format!("{} ({})", title, y),
        None => title.to_string(),
    }
}

impl Trackable for Movie {
    fn label(&self) -> String {
        title_with_year(&self.title, self.year)
    }

    fn date_added(&self) -> DateTime<Utc> {
        self.date_added
    }

    fn set_date_added(&mut self, date: DateTime<Utc>) {
        self.date_added = date;
    }

    fn is_watched(&self) -> bool {
        self.watched
    }

    fn mark_watched(&mut self) {
        self.watched = true;
    }

    fn last_watched(&self) -> Option<DateTime<Utc>> {
        self.last_watched
    }

    fn set_last_watched(&mut self, date: Option<DateTime<Utc>>) {
        self.last_watched = date;
    }
}

impl Identified for Movie {
    fn kind(&self) -> MediaKind {
        MediaKind::Movie
    }

    fn ids(&self) -> &MediaIds {
        &self.ids
    }

    fn ids_mut(&mut self) -> &mut MediaIds {
        &mut self.ids
    }
}

impl Trackable for Show {
    fn label(&self) -> String {
        title_with_year(&self.title, self.year)
    }

    fn date_added(&self) -> DateTime<Utc> {
        self.date_added
    }

    fn set_date_added(&mut self, date: DateTime<Utc>) {
        self.date_added = date;
    }

    fn is_watched(&self) -> bool {
        self.watched
    }

    fn mark_watched(&mut self) {
        self.watched = true;
    }

    fn last_watched(&self) -> Option<DateTime<Utc>> {
        self.last_watched
    }

    fn set_last_watched(&mut self, date: Option<DateTime<Utc>>) {
        self.last_watched = date;
    }
}

impl Identified for Show {
    fn kind(&self) -> MediaKind {
        MediaKind::Show
    }

    fn ids(&self) -> &MediaIds {
        &self.ids
    }

    fn ids_mut(&mut self) -> &mut MediaIds {
        &mut self.ids
    }
}

impl Trackable for Episode {
    fn label(&self) -> String {
        match &self.title {
            Some(title) => format!("{} {}", self.key(), title),
            None => self.key().to_string(),
        }
    }

    fn date_added(&self) -> DateTime<Utc> {
        self.date_added
    }

    fn set_date_added(&mut self, date: DateTime<Utc>) {
        self.date_added = date;
    }

    fn is_watched(&self) -> bool {
        self.watched
    }

    fn mark_watched(&mut self) {
        self.watched = true;
    }

    fn last_watched(&self) -> Option<DateTime<Utc>> {
        self.last_watched
    }

    fn set_last_watched(&mut self, date: Option<DateTime<Utc>>) {
        self.last_watched = date;
    }
}
