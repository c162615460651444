//! Write endpoints: payload shape and response statistics.

use chrono::{TimeZone, Utc};

use media_sync_models::{
    MediaIds, SyncEpisode, SyncItems, SyncMovie, SyncSeason, SyncShow, SyncStamp,
};
use media_sync_sources::TrackingService;

use crate::common;

#[tokio::test]
async fn test_add_to_collection_posts_payload_and_reads_stats() {
    let (server, client) = common::setup_trakt_mock().await;
    common::mount_post(
        &server,
        "/sync/collection",
        serde_json::json!({
            "added": { "movies": 1, "episodes": 0 },
            "updated": { "movies": 0, "episodes": 0 },
            "existing": { "movies": 0, "episodes": 0 },
            "not_found": { "movies": [], "shows": [], "seasons": [], "episodes": [] }
        }),
    )
    .await;

    let collected = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
    let items = SyncItems::movies(vec![SyncMovie {
        ids: MediaIds::new().with_tmdb(555),
        stamp: Some(SyncStamp::CollectedAt(collected)),
    }]);

    let response = client.add_to_collection(&items).await.expect("add_to_collection failed");
    assert_eq!(response.added.movies, 1);

    let body = common::last_request_body(&server).await;
    assert_eq!(
        body,
        serde_json::json!({
            "movies": [ { "ids": { "tmdb": 555 }, "collected_at": "2019-01-01T00:00:00.000Z" } ],
            "shows": []
        })
    );
}

#[tokio::test]
async fn test_add_to_history_reports_not_found() {
    let (server, client) = common::setup_trakt_mock().await;
    common::mount_post(
        &server,
        "/sync/history",
        serde_json::json!({
            "added": { "movies": 0, "episodes": 1 },
            "not_found": {
                "movies": [ { "ids": { "imdb": "tt0000000" } } ],
                "shows": []
            }
        }),
    )
    .await;

    let watched = Utc.with_ymd_and_hms(2024, 2, 2, 2, 2, 2).unwrap();
    let items = SyncItems {
        movies: vec![SyncMovie {
            ids: MediaIds::new().with_imdb("tt0000000"),
            stamp: Some(SyncStamp::WatchedAt(watched)),
        }],
        shows: vec![SyncShow {
            ids: MediaIds::new().with_trakt(7),
            stamp: Some(SyncStamp::WatchedAt(watched)),
            seasons: vec![SyncSeason {
                number: 1,
                episodes: vec![SyncEpisode { number: 3, stamp: Some(SyncStamp::WatchedAt(watched)) }],
            }],
        }],
    };

    let response = client.add_to_history(&items).await.expect("add_to_history failed");
    assert_eq!(response.added.episodes, 1);
    assert_eq!(response.not_found.movies.len(), 1);
    assert_eq!(response.not_found.movies[0].ids.imdb.as_deref(), Some("tt0000000"));

    let body = common::last_request_body(&server).await;
    assert_eq!(body["shows"][0]["seasons"][0]["episodes"][0]["number"], 3);
    assert_eq!(body["movies"][0]["watched_at"], "2024-02-02T02:02:02.000Z");
}

#[tokio::test]
async fn test_remove_endpoints_read_deleted_counts() {
    let (server, client) = common::setup_trakt_mock().await;
    let deleted = serde_json::json!({
        "deleted": { "movies": 2, "episodes": 5 },
        "not_found": { "movies": [], "shows": [] }
    });
    common::mount_post(&server, "/sync/collection/remove", deleted.clone()).await;
    common::mount_post(&server, "/sync/history/remove", deleted).await;

    let items = SyncItems::movies(vec![
        SyncMovie { ids: MediaIds::new().with_trakt(1), stamp: None },
        SyncMovie { ids: MediaIds::new().with_trakt(2), stamp: None },
    ]);

    let response = client.remove_from_collection(&items).await.expect("remove_from_collection failed");
    assert_eq!(response.deleted.movies, 2);
    assert_eq!(response.deleted.episodes, 5);

    let body = common::last_request_body(&server).await;
    assert!(body["movies"][0].get("collected_at").is_none());

    let response = client.remove_from_history(&items).await.expect("remove_from_history failed");
    assert_eq!(response.deleted.movies, 2);
}
