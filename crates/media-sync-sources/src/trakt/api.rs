use chrono::{DateTime, SecondsFormat, Utc};
use media_sync_models::{
    MediaIds, RemoteEpisode, RemoteMovie, RemoteSeason, RemoteShow, SyncItems, SyncMovie,
    SyncResponse, SyncShow, SyncStamp, SyncStats,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::SourceError;

/// Everything an authenticated call needs.
pub struct TraktApi<'a> {
    pub client: &'a Client,
    pub base_url: &'a str,
    pub access_token: &'a str,
    pub client_id: &'a str,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraktIds {
    #[serde(default)]
    pub trakt: Option<u64>,
    #[serde(default)]
    pub imdb: Option<String>,
    #[serde(default)]
    pub tmdb: Option<u32>,
    #[serde(default)]
    pub tvdb: Option<u32>,
    #[serde(default)]
    pub slug: Option<String>,
}

impl From<&TraktIds> for MediaIds {
    fn from(ids: &TraktIds) -> Self {
        MediaIds {
            trakt: ids.trakt,
            imdb: ids.imdb.clone(),
            tmdb: ids.tmdb,
            tvdb: ids.tvdb,
        }
        .normalized()
    }
}

#[derive(Debug, Deserialize)]
struct TraktMovie {
    title: String,
    year: Option<u32>,
    #[serde(default)]
    ids: TraktIds,
}

#[derive(Debug, Deserialize)]
struct TraktShow {
    title: String,
    year: Option<u32>,
    #[serde(default)]
    ids: TraktIds,
}

#[derive(Debug, Deserialize)]
struct TraktCollectedMovie {
    collected_at: Option<DateTime<Utc>>,
    movie: TraktMovie,
}

#[derive(Debug, Deserialize)]
struct TraktCollectedShow {
    last_collected_at: Option<DateTime<Utc>>,
    show: TraktShow,
    #[serde(default)]
    seasons: Vec<TraktSeason>,
}

#[derive(Debug, Deserialize)]
struct TraktWatchedMovie {
    #[serde(default)]
    plays: u32,
    last_watched_at: Option<DateTime<Utc>>,
    movie: TraktMovie,
}

#[derive(Debug, Deserialize)]
struct TraktWatchedShow {
    #[serde(default)]
    plays: u32,
    last_watched_at: Option<DateTime<Utc>>,
    show: TraktShow,
    #[serde(default)]
    seasons: Vec<TraktSeason>,
}

#[derive(Debug, Deserialize)]
struct TraktSeason {
    number: u32,
    #[serde(default)]
    episodes: Vec<TraktEpisode>,
}

#[derive(Debug, Deserialize)]
struct TraktEpisode {
    number: u32,
    #[serde(default)]
    collected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    plays: u32,
    #[serde(default)]
    last_watched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct TraktStats {
    #[serde(default)]
    movies: u32,
    #[serde(default)]
    shows: u32,
    #[serde(default)]
    seasons: u32,
    #[serde(default)]
    episodes: u32,
}

#[derive(Debug, Deserialize)]
struct TraktIdsHolder {
    #[serde(default)]
    ids: TraktIds,
}

#[derive(Debug, Default, Deserialize)]
struct TraktNotFound {
    #[serde(default)]
    movies: Vec<TraktIdsHolder>,
    #[serde(default)]
    shows: Vec<TraktIdsHolder>,
}

#[derive(Debug, Deserialize)]
struct TraktSyncResponse {
    #[serde(default)]
    added: TraktStats,
    #[serde(default)]
    existing: TraktStats,
    #[serde(default)]
    deleted: TraktStats,
    #[serde(default)]
    not_found: TraktNotFound,
}

impl From<TraktStats> for SyncStats {
    fn from(stats: TraktStats) -> Self {
        SyncStats {
            movies: stats.movies,
            shows: stats.shows,
            seasons: stats.seasons,
            episodes: stats.episodes,
        }
    }
}

impl From<TraktSyncResponse> for SyncResponse {
    fn from(response: TraktSyncResponse) -> Self {
        SyncResponse {
            added: response.added.into(),
            existing: response.existing.into(),
            deleted: response.deleted.into(),
            not_found: SyncItems {
                movies: response
                    .not_found
                    .movies
                    .iter()
                    .map(|m| SyncMovie { ids: (&m.ids).into(), stamp: None })
                    .collect(),
                shows: response
                    .not_found
                    .shows
                    .iter()
                    .map(|s| SyncShow { ids: (&s.ids).into(), stamp: None, seasons: Vec::new() })
                    .collect(),
            },
        }
    }
}

fn convert_seasons(seasons: Vec<TraktSeason>) -> Vec<RemoteSeason> {
    seasons
        .into_iter()
        .map(|season| RemoteSeason {
            number: season.number,
            episodes: season
                .episodes
                .into_iter()
                .map(|e| RemoteEpisode {
                    number: e.number,
                    collected_at: e.collected_at,
                    last_watched_at: e.last_watched_at,
                    plays: e.plays,
                })
                .collect(),
        })
        .collect()
}

fn authorized(api: &TraktApi<'_>, builder: RequestBuilder) -> RequestBuilder {
    builder
        .header("Authorization", format!("Bearer {}", api.access_token))
        .header("trakt-api-version", "2")
        .header("trakt-api-key", api.client_id)
        .header("Accept", "application/json")
        .header("Content-Type", "application/json")
}

/// Map non-2xx responses to errors; 401 gets its own variant.
pub(crate) async fn check_status(response: Response, action: &str) -> Result<Response, SourceError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(SourceError::Unauthorized);
    }
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(SourceError::Http {
            status: status.as_u16(),
            message: format!("Failed to {}: {}", action, error_text.trim()),
        });
    }
    Ok(response)
}

pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, SourceError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| SourceError::Decode(e.to_string()))
}

async fn get_json<T: DeserializeOwned>(api: &TraktApi<'_>, path: &str, action: &str) -> Result<T, SourceError> {
    let url = format!("{}{}", api.base_url, path);
    debug!("GET {}", url);
    let response = authorized(api, api.client.get(&url)).send().await?;
    let response = check_status(response, action).await?;
    decode(response).await
}

/// Fetch the movie collection.
pub async fn get_collection_movies(api: &TraktApi<'_>) -> Result<Vec<RemoteMovie>, SourceError> {
    let items: Vec<TraktCollectedMovie> =
        get_json(api, "/sync/collection/movies", "fetch movie collection").await?;
    Ok(items
        .into_iter()
        .map(|item| RemoteMovie {
            ids: (&item.movie.ids).into(),
            title: item.movie.title,
            year: item.movie.year,
            collected_at: item.collected_at,
            last_watched_at: None,
            plays: 0,
        })
        .collect())
}

/// Fetch the show collection with its collected seasons and episodes.
pub async fn get_collection_shows(api: &TraktApi<'_>) -> Result<Vec<RemoteShow>, SourceError> {
    let items: Vec<TraktCollectedShow> =
        get_json(api, "/sync/collection/shows", "fetch show collection").await?;
    Ok(items
        .into_iter()
        .map(|item| RemoteShow {
            ids: (&item.show.ids).into(),
            title: item.show.title,
            year: item.show.year,
            collected_at: item.last_collected_at,
            last_watched_at: None,
            plays: 0,
            seasons: convert_seasons(item.seasons),
        })
        .collect())
}

pub async fn get_watched_movies(api: &TraktApi<'_>) -> Result<Vec<RemoteMovie>, SourceError> {
    let items: Vec<TraktWatchedMovie> =
        get_json(api, "/sync/watched/movies", "fetch watched movies").await?;
    Ok(items
        .into_iter()
        .map(|item| RemoteMovie {
            ids: (&item.movie.ids).into(),
            title: item.movie.title,
            year: item.movie.year,
            collected_at: None,
            last_watched_at: item.last_watched_at,
            plays: item.plays,
        })
        .collect())
}

pub async fn get_watched_shows(api: &TraktApi<'_>) -> Result<Vec<RemoteShow>, SourceError> {
    let items: Vec<TraktWatchedShow> =
        get_json(api, "/sync/watched/shows", "fetch watched shows").await?;
    Ok(items
        .into_iter()
        .map(|item| RemoteShow {
            ids: (&item.show.ids).into(),
            title: item.show.title,
            year: item.show.year,
            collected_at: None,
            last_watched_at: item.last_watched_at,
            plays: item.plays,
            seasons: convert_seasons(item.seasons),
        })
        .collect())
}

fn ids_object(ids: &MediaIds) -> Value {
    let mut ids_obj = Map::new();
    if let Some(trakt) = ids.trakt {
        ids_obj.insert("trakt".to_string(), Value::Number(trakt.into()));
    }
    if let Some(ref imdb) = ids.imdb {
        ids_obj.insert("imdb".to_string(), Value::String(imdb.clone()));
    }
    if let Some(tmdb) = ids.tmdb {
        ids_obj.insert("tmdb".to_string(), Value::Number(tmdb.into()));
    }
    if let Some(tvdb) = ids.tvdb {
        ids_obj.insert("tvdb".to_string(), Value::Number(tvdb.into()));
    }
    Value::Object(ids_obj)
}

fn insert_stamp(obj: &mut Map<String, Value>, stamp: Option<&SyncStamp>) {
    match stamp {
        Some(SyncStamp::CollectedAt(at)) => {
            obj.insert("collected_at".to_string(), Value::String(format_time(at)));
        }
        Some(SyncStamp::WatchedAt(at)) => {
            obj.insert("watched_at".to_string(), Value::String(format_time(at)));
        }
        None => {}
    }
}

fn format_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Build the JSON body shared by the four `/sync/...` write endpoints.
pub fn sync_payload(items: &SyncItems) -> Value {
    let movies: Vec<Value> = items
        .movies
        .iter()
        .map(|movie| {
            let mut obj = Map::new();
            obj.insert("ids".to_string(), ids_object(&movie.ids));
            insert_stamp(&mut obj, movie.stamp.as_ref());
            Value::Object(obj)
        })
        .collect();

    let shows: Vec<Value> = items
        .shows
        .iter()
        .map(|show| {
            let seasons: Vec<Value> = show
                .seasons
                .iter()
                .map(|season| {
                    let episodes: Vec<Value> = season
                        .episodes
                        .iter()
                        .map(|episode| {
                            let mut obj = Map::new();
                            obj.insert("number".to_string(), Value::Number(episode.number.into()));
                            insert_stamp(&mut obj, episode.stamp.as_ref());
                            Value::Object(obj)
                        })
                        .collect();
                    serde_json::json!({
                        "number": season.number,
                        "episodes": episodes
                    })
                })
                .collect();

            let mut obj = Map::new();
            obj.insert("ids".to_string(), ids_object(&show.ids));
            insert_stamp(&mut obj, show.stamp.as_ref());
            if !seasons.is_empty() {
                obj.insert("seasons".to_string(), Value::Array(seasons));
            }
            Value::Object(obj)
        })
        .collect();

    serde_json::json!({
        "movies": movies,
        "shows": shows
    })
}

async fn post_sync(
    api: &TraktApi<'_>,
    path: &str,
    items: &SyncItems,
    action: &str,
) -> Result<SyncResponse, SourceError> {
    let url = format!("{}{}", api.base_url, path);
    debug!(
        movies = items.movies.len(),
        shows = items.shows.len(),
        episodes = items.episode_count(),
        "POST {}",
        url
    );
    let response = authorized(api, api.client.post(&url))
        .json(&sync_payload(items))
        .send()
        .await?;
    let response = check_status(response, action).await?;
    let body: TraktSyncResponse = decode(response).await?;
    Ok(body.into())
}

pub async fn add_to_collection(api: &TraktApi<'_>, items: &SyncItems) -> Result<SyncResponse, SourceError> {
    post_sync(api, "/sync/collection", items, "add to collection").await
}

pub async fn add_to_history(api: &TraktApi<'_>, items: &SyncItems) -> Result<SyncResponse, SourceError> {
    post_sync(api, "/sync/history", items, "add to history").await
}

pub async fn remove_from_collection(api: &TraktApi<'_>, items: &SyncItems) -> Result<SyncResponse, SourceError> {
    post_sync(api, "/sync/collection/remove", items, "remove from collection").await
}

pub async fn remove_from_history(api: &TraktApi<'_>, items: &SyncItems) -> Result<SyncResponse, SourceError> {
    post_sync(api, "/sync/history/remove", items, "remove from history").await
}
