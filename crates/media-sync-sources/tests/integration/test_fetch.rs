//! Fetching collection and watched lists.

use chrono::{TimeZone, Utc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use media_sync_sources::{SourceError, TrackingService};

use crate::common;

#[tokio::test]
async fn test_collection_movies_parsed() {
    let (server, client) = common::setup_trakt_mock().await;
    common::mount_get(
        &server,
        "/sync/collection/movies",
        serde_json::json!([
            {
                "collected_at": "2020-01-01T00:00:00.000Z",
                "updated_at": "2020-01-02T00:00:00.000Z",
                "movie": {
                    "title": "Alien",
                    "year": 1979,
                    "ids": { "trakt": 1, "slug": "alien-1979", "imdb": "tt0078748", "tmdb": 348 }
                }
            }
        ]),
    )
    .await;

    let movies = client.collection_movies().await.expect("collection_movies failed");

    assert_eq!(movies.len(), 1);
    assert_eq!(movies[0].title, "Alien");
    assert_eq!(movies[0].ids.imdb.as_deref(), Some("tt0078748"));
    assert_eq!(movies[0].ids.tmdb, Some(348));
    assert_eq!(
        movies[0].collected_at,
        Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap())
    );
    assert!(!movies[0].is_watched());
}

#[tokio::test]
async fn test_collection_shows_carry_episodes() {
    let (server, client) = common::setup_trakt_mock().await;
    common::mount_get(
        &server,
        "/sync/collection/shows",
        serde_json::json!([
            {
                "last_collected_at": "2021-03-01T10:00:00.000Z",
                "show": { "title": "Show X", "year": 2010, "ids": { "trakt": 7, "tvdb": 81189 } },
                "seasons": [
                    { "number": 1, "episodes": [
                        { "number": 1, "collected_at": "2021-03-01T10:00:00.000Z" }
                    ]}
                ]
            }
        ]),
    )
    .await;

    let shows = client.collection_shows().await.expect("collection_shows failed");

    assert_eq!(shows.len(), 1);
    assert_eq!(shows[0].ids.tvdb, Some(81189));
    assert_eq!(shows[0].episode_count(), 1);
    assert!(shows[0].seasons[0].episodes[0].collected_at.is_some());
}

#[tokio::test]
async fn test_watched_movies_and_shows() {
    let (server, client) = common::setup_trakt_mock().await;
    common::mount_get(
        &server,
        "/sync/watched/movies",
        serde_json::json!([
            {
                "plays": 2,
                "last_watched_at": "2022-05-05T20:00:00.000Z",
                "movie": { "title": "Alien", "year": 1979, "ids": { "imdb": "tt0078748" } }
            }
        ]),
    )
    .await;
    common::mount_get(
        &server,
        "/sync/watched/shows",
        serde_json::json!([
            {
                "plays": 1,
                "last_watched_at": "2022-05-06T20:00:00.000Z",
                "show": { "title": "Show X", "year": 2010, "ids": { "trakt": 7 } },
                "seasons": [
                    { "number": 1, "episodes": [
                        { "number": 2, "plays": 1, "last_watched_at": "2022-05-06T20:00:00.000Z" }
                    ]}
                ]
            }
        ]),
    )
    .await;

    let movies = client.watched_movies().await.expect("watched_movies failed");
    assert!(movies[0].is_watched());
    assert_eq!(movies[0].plays, 2);

    let shows = client.watched_shows().await.expect("watched_shows failed");
    let episode = &shows[0].seasons[0].episodes[0];
    assert_eq!(episode.number, 2);
    assert!(episode.is_watched());
}

#[tokio::test]
async fn test_unauthorized_maps_to_dedicated_error() {
    let (server, client) = common::setup_trakt_mock().await;
    Mock::given(method("GET"))
        .and(path("/sync/collection/movies"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.collection_movies().await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn test_server_error_keeps_status() {
    let (server, client) = common::setup_trakt_mock().await;
    Mock::given(method("GET"))
        .and(path("/sync/watched/movies"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client.watched_movies().await.unwrap_err();
    match err {
        SourceError::Http { status, message } => {
            assert_eq!(status, 503);
            assert!(message.contains("maintenance"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let (server, client) = common::setup_trakt_mock().await;
    Mock::given(method("GET"))
        .and(path("/sync/collection/shows"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client.collection_shows().await.unwrap_err();
    assert!(matches!(err, SourceError::Decode(_)));
}
