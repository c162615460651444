// Persistence seam for local entities, plus a JSON-file implementation

use media_sync_models::{Episode, Library, Movie, Show, Trackable};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid library key '{0}'")]
    InvalidKey(String),
}

/// A local entity handed to the store. Episodes are written through their show.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Movie(&'a Movie),
    Show(&'a Show),
    Episode { show: &'a Show, episode: &'a Episode },
}

impl EntityRef<'_> {
    pub fn label(&self) -> String {
        match self {
            EntityRef::Movie(movie) => movie.label(),
            EntityRef::Show(show) => show.label(),
            EntityRef::Episode { show, episode } => format!("{} {}", show.label(), episode.key()),
        }
    }
}

/// Local entities that can be handed to an [`EntityStore`].
pub trait AsEntityRef {
    fn as_entity_ref(&self) -> EntityRef<'_>;
}

impl AsEntityRef for Movie {
    fn as_entity_ref(&self) -> EntityRef<'_> {
        EntityRef::Movie(self)
    }
}

impl AsEntityRef for Show {
    fn as_entity_ref(&self) -> EntityRef<'_> {
        EntityRef::Show(self)
    }
}

/// Where changed entities go. Failures are reported per entity and never stop a sync.
pub trait EntityStore: Send + Sync {
    fn persist(&self, entity: EntityRef<'_>) -> Result<(), StoreError>;
    fn write_external_metadata(&self, entity: EntityRef<'_>) -> Result<(), StoreError>;
}

/// A library kept as one JSON document per movie or show.
///
/// ```text
/// <root>/movies/<key>.json
/// <root>/movies/<key>.meta.json
/// <root>/shows/<key>.json
/// <root>/shows/<key>.meta.json
/// <root>/shows/<key>.S01E02.meta.json
/// ```
pub struct JsonLibrary {
    root: PathBuf,
}

#[derive(Serialize)]
struct MetadataSidecar<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    year: Option<u32>,
    ids: &'a media_sync_models::MediaIds,
    date_added: chrono::DateTime<chrono::Utc>,
    watched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_watched: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Serialize)]
struct EpisodeSidecar<'a> {
    show: &'a str,
    season: u32,
    episode: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    date_added: chrono::DateTime<chrono::Utc>,
    watched: bool,
}

impl JsonLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn movies_dir(&self) -> PathBuf {
        self.root.join("movies")
    }

    fn shows_dir(&self) -> PathBuf {
        self.root.join("shows")
    }

    /// Read every movie and show document. Missing directories mean an empty library.
    ///
    /// The file name is the key: a document whose `key` field disagrees is
    /// re-keyed so that persisting it rewrites the same file.
    pub fn load(&self) -> Result<Library, StoreError> {
        let mut movies = Vec::new();
        for (stem, mut movie) in read_documents::<Movie>(&self.movies_dir())? {
            rekey(&mut movie.key, stem);
            movie.ids = std::mem::take(&mut movie.ids).normalized();
            movies.push(movie);
        }
        let mut shows = Vec::new();
        for (stem, mut show) in read_documents::<Show>(&self.shows_dir())? {
            rekey(&mut show.key, stem);
            show.ids = std::mem::take(&mut show.ids).normalized();
            let fixed = show.normalize_seasons();
            if fixed > 0 {
                warn!("{}: {} episodes had a season number not matching their season", show.key, fixed);
            }
            shows.push(show);
        }
        movies.sort_by(|a, b| a.key.cmp(&b.key));
        shows.sort_by(|a, b| a.key.cmp(&b.key));
        debug!(
            "Loaded {} movies and {} shows from {}",
            movies.len(),
            shows.len(),
            self.root.display()
        );
        Ok(Library::new(movies, shows))
    }

    pub fn save_movie(&self, movie: &Movie) -> Result<(), StoreError> {
        let path = document_path(&self.movies_dir(), &movie.key, "json")?;
        write_json(&path, movie)
    }

    pub fn save_show(&self, show: &Show) -> Result<(), StoreError> {
        let path = document_path(&self.shows_dir(), &show.key, "json")?;
        write_json(&path, show)
    }
}

impl EntityStore for JsonLibrary {
    fn persist(&self, entity: EntityRef<'_>) -> Result<(), StoreError> {
        match entity {
            EntityRef::Movie(movie) => self.save_movie(movie),
            EntityRef::Show(show) | EntityRef::Episode { show, .. } => self.save_show(show),
        }
    }

    fn write_external_metadata(&self, entity: EntityRef<'_>) -> Result<(), StoreError> {
        match entity {
            EntityRef::Movie(movie) => {
                let path = document_path(&self.movies_dir(), &movie.key, "meta.json")?;
                write_json(
                    &path,
                    &MetadataSidecar {
                        title: &movie.title,
                        year: movie.year,
                        ids: &movie.ids,
                        date_added: movie.date_added,
                        watched: movie.watched,
                        last_watched: movie.last_watched,
                    },
                )
            }
            EntityRef::Show(show) => {
                let path = document_path(&self.shows_dir(), &show.key, "meta.json")?;
                write_json(
                    &path,
                    &MetadataSidecar {
                        title: &show.title,
                        year: show.year,
                        ids: &show.ids,
                        date_added: show.date_added,
                        watched: show.watched,
                        last_watched: show.last_watched,
                    },
                )
            }
            EntityRef::Episode { show, episode } => {
                let extension = format!("{}.meta.json", episode.key());
                let path = document_path(&self.shows_dir(), &show.key, &extension)?;
                write_json(
                    &path,
                    &EpisodeSidecar {
                        show: &show.title,
                        season: episode.season,
                        episode: episode.episode,
                        title: episode.title.as_deref(),
                        date_added: episode.date_added,
                        watched: episode.watched,
                    },
                )
            }
        }
    }
}

fn document_path(dir: &Path, key: &str, extension: &str) -> Result<PathBuf, StoreError> {
    let key = key.trim();
    if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(dir.join(format!("{}.{}", key, extension)))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    // Write next to the target and rename, so a crash never leaves half a document.
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn rekey(key: &mut String, stem: String) {
    if *key != stem {
        warn!("Library document {}.json declares key '{}', using the file name", stem, key);
        *key = stem;
    }
}

/// Documents in `dir` paired with their file stem.
fn read_documents<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<(String, T)>, StoreError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut documents = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if !name.ends_with(".json") || name.ends_with(".meta.json") {
            continue;
        }
        let stem = name.trim_end_matches(".json").to_string();
        let content = fs::read_to_string(&path)?;
        match serde_json::from_str(&content) {
            Ok(document) => documents.push((stem, document)),
            Err(e) => warn!("Skipping unreadable library document {}: {}", path.display(), e),
        }
    }
    Ok(documents)
}
