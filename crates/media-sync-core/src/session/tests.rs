use super::*;
use crate::error::FailureKind;
use crate::library::{EntityRef, StoreError};
use async_trait::async_trait;
use chrono::TimeZone;
use media_sync_models::{
    Episode, MediaIds, RemoteEpisode, RemoteMovie, RemoteSeason, RemoteShow, SyncStamp, SyncStats,
};
use std::sync::{Arc, Mutex};

fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn now() -> DateTime<Utc> {
    date(2030, 6, 1)
}

#[derive(Default)]
struct FakeState {
    collection_movies: Vec<RemoteMovie>,
    collection_shows: Vec<RemoteShow>,
    watched_movies: Vec<RemoteMovie>,
    watched_shows: Vec<RemoteShow>,
    calls: Vec<&'static str>,
    writes: Vec<(&'static str, SyncItems)>,
    /// The next N calls answer 401.
    unauthorized: usize,
    /// Calls that answer 503.
    failing: Vec<&'static str>,
}

/// In-memory tracking service. Writes are applied to its lists, so a second
/// run sees what the first one sent.
struct FakeService {
    authenticated: bool,
    refresh_fails: bool,
    refreshes: usize,
    state: Mutex<FakeState>,
}

impl FakeService {
    fn new() -> Self {
        Self {
            authenticated: true,
            refresh_fails: false,
            refreshes: 0,
            state: Mutex::new(FakeState::default()),
        }
    }

    fn with(self, setup: impl FnOnce(&mut FakeState)) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            setup(&mut *state);
        }
        self
    }

    fn gate(&self, op: &'static str) -> Result<(), SourceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(op);
        if state.unauthorized > 0 {
            state.unauthorized -= 1;
            return Err(SourceError::Unauthorized);
        }
        if state.failing.contains(&op) {
            return Err(SourceError::Http {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    fn writes(&self) -> Vec<(&'static str, SyncItems)> {
        self.state.lock().unwrap().writes.clone()
    }

    fn write(&self, op: &'static str, items: &SyncItems) -> SyncResponse {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.writes.push((op, items.clone()));
        let counts = SyncStats {
            movies: items.movies.len() as u32,
            episodes: items.episode_count() as u32,
            ..SyncStats::default()
        };
        match op {
            "add_to_collection" => {
                add_movies(&mut state.collection_movies, items);
                add_shows(&mut state.collection_shows, items);
                SyncResponse { added: counts, ..SyncResponse::default() }
            }
            "add_to_history" => {
                add_movies(&mut state.watched_movies, items);
                add_shows(&mut state.watched_shows, items);
                SyncResponse { added: counts, ..SyncResponse::default() }
            }
            "remove_from_collection" => {
                remove(&mut state.collection_movies, &mut state.collection_shows, items);
                SyncResponse { deleted: counts, ..SyncResponse::default() }
            }
            _ => {
                remove(&mut state.watched_movies, &mut state.watched_shows, items);
                SyncResponse { deleted: counts, ..SyncResponse::default() }
            }
        }
    }
}

fn stamp_fields(stamp: Option<SyncStamp>) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>, u32) {
    match stamp {
        Some(SyncStamp::CollectedAt(at)) => (Some(at), None, 0),
        Some(SyncStamp::WatchedAt(at)) => (None, Some(at), 1),
        None => (None, None, 0),
    }
}

fn add_movies(list: &mut Vec<RemoteMovie>, items: &SyncItems) {
    for movie in &items.movies {
        if list.iter().any(|r| r.ids == movie.ids) {
            continue;
        }
        let (collected_at, last_watched_at, plays) = stamp_fields(movie.stamp);
        list.push(RemoteMovie {
            title: movie.ids.describe(),
            ids: movie.ids.clone(),
            collected_at,
            last_watched_at,
            plays,
            ..RemoteMovie::default()
        });
    }
}

fn add_shows(list: &mut Vec<RemoteShow>, items: &SyncItems) {
    for show in &items.shows {
        let pos = match list.iter().position(|r| r.ids == show.ids) {
            Some(pos) => pos,
            None => {
                list.push(RemoteShow {
                    title: show.ids.describe(),
                    ids: show.ids.clone(),
                    ..RemoteShow::default()
                });
                list.len() - 1
            }
        };
        let remote = &mut list[pos];
        for season in &show.seasons {
            let season_pos = match remote.seasons.iter().position(|s| s.number == season.number) {
                Some(p) => p,
                None => {
                    remote.seasons.push(RemoteSeason { number: season.number, episodes: Vec::new() });
                    remote.seasons.len() - 1
                }
            };
            for episode in &season.episodes {
                let (collected_at, last_watched_at, plays) = stamp_fields(episode.stamp);
                remote.seasons[season_pos].episodes.push(RemoteEpisode {
                    number: episode.number,
                    collected_at,
                    last_watched_at,
                    plays,
                });
            }
        }
    }
}

fn remove(movies: &mut Vec<RemoteMovie>, shows: &mut Vec<RemoteShow>, items: &SyncItems) {
    movies.retain(|r| !items.movies.iter().any(|m| m.ids == r.ids));
    shows.retain(|r| !items.shows.iter().any(|s| s.ids == r.ids));
}

#[async_trait]
impl TrackingService for FakeService {
    fn service_name(&self) -> &str {
        "fake"
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    async fn refresh_access_token(&mut self) -> Result<(), SourceError> {
        self.refreshes += 1;
        if self.refresh_fails {
            return Err(SourceError::TokenRefresh("invalid_grant".to_string()));
        }
        Ok(())
    }

    async fn collection_movies(&self) -> Result<Vec<RemoteMovie>, SourceError> {
        self.gate("collection_movies")?;
        Ok(self.state.lock().unwrap().collection_movies.clone())
    }

    async fn collection_shows(&self) -> Result<Vec<RemoteShow>, SourceError> {
        self.gate("collection_shows")?;
        Ok(self.state.lock().unwrap().collection_shows.clone())
    }

    async fn watched_movies(&self) -> Result<Vec<RemoteMovie>, SourceError> {
        self.gate("watched_movies")?;
        Ok(self.state.lock().unwrap().watched_movies.clone())
    }

    async fn watched_shows(&self) -> Result<Vec<RemoteShow>, SourceError> {
        self.gate("watched_shows")?;
        Ok(self.state.lock().unwrap().watched_shows.clone())
    }

    async fn add_to_collection(&self, items: &SyncItems) -> Result<SyncResponse, SourceError> {
        self.gate("add_to_collection")?;
        Ok(self.write("add_to_collection", items))
    }

    async fn add_to_history(&self, items: &SyncItems) -> Result<SyncResponse, SourceError> {
        self.gate("add_to_history")?;
        Ok(self.write("add_to_history", items))
    }

    async fn remove_from_collection(&self, items: &SyncItems) -> Result<SyncResponse, SourceError> {
        self.gate("remove_from_collection")?;
        Ok(self.write("remove_from_collection", items))
    }

    async fn remove_from_history(&self, items: &SyncItems) -> Result<SyncResponse, SourceError> {
        self.gate("remove_from_history")?;
        Ok(self.write("remove_from_history", items))
    }
}

#[derive(Clone, Default)]
struct Recorder {
    persisted: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn persisted(&self) -> Vec<String> {
        self.persisted.lock().unwrap().clone()
    }
}

impl EntityStore for Recorder {
    fn persist(&self, entity: EntityRef<'_>) -> Result<(), StoreError> {
        self.persisted.lock().unwrap().push(entity.label());
        Ok(())
    }

    fn write_external_metadata(&self, _entity: EntityRef<'_>) -> Result<(), StoreError> {
        Ok(())
    }
}

fn session(service: FakeService, store: &Recorder) -> SyncSession<FakeService> {
    SyncSession::new(service, store.clone()).with_clock(now)
}

/// Movies A (matched remotely), B (unscraped) and C (only local), plus show X
/// with episode 1 collected remotely and episode 2 only local.
fn library() -> Library {
    let a = Movie::new("a", "A", date(2019, 1, 1)).with_ids(MediaIds::new().with_imdb("tt0001"));
    let b = Movie::new("b", "B", date(2019, 2, 2));
    let c = Movie::new("c", "C", date(2019, 3, 3)).with_ids(MediaIds::new().with_tmdb(555));

    let mut x = Show::new("x", "X", date(2020, 1, 1)).with_ids(MediaIds::new().with_tvdb(100));
    x.add_episode(Episode::new(1, 1, date(2020, 1, 1)));
    x.add_episode(Episode::new(1, 2, date(2020, 1, 8)));

    Library::new(vec![a, b, c], vec![x])
}

fn remote_state(state: &mut FakeState) {
    state.collection_movies.push(RemoteMovie {
        title: "A".to_string(),
        ids: MediaIds::new().with_imdb("tt0001"),
        collected_at: Some(date(2020, 1, 1)),
        ..RemoteMovie::default()
    });
    state.collection_shows.push(RemoteShow {
        title: "X".to_string(),
        ids: MediaIds::new().with_tvdb(100),
        seasons: vec![RemoteSeason {
            number: 1,
            episodes: vec![RemoteEpisode {
                number: 1,
                collected_at: Some(date(2020, 1, 1)),
                ..RemoteEpisode::default()
            }],
        }],
        ..RemoteShow::default()
    });
}

#[tokio::test]
async fn test_collection_sync_merges_and_sends_residual() {
    let store = Recorder::default();
    let mut session = session(FakeService::new().with(remote_state), &store);
    let mut library = library();

    let summary = session
        .run_sync(&mut library, SyncDirection::Collection, &SyncScope::All)
        .await;

    assert!(summary.is_success(), "{:?}", summary.failures);
    assert_eq!(session.state(), SessionState::Done);

    // A took the remote collection date and was written back.
    assert_eq!(library.movies[0].date_added, date(2020, 1, 1));
    assert_eq!(store.persisted(), vec!["A".to_string()]);

    let writes = session.service().writes();
    assert_eq!(writes.len(), 2);

    // B is unscraped and skipped; C is the only movie sent.
    let (op, movies) = &writes[0];
    assert_eq!(*op, "add_to_collection");
    assert_eq!(movies.movies.len(), 1);
    assert_eq!(movies.movies[0].ids, MediaIds::new().with_tmdb(555));
    assert_eq!(movies.movies[0].stamp, Some(SyncStamp::CollectedAt(date(2019, 3, 3))));
    assert_eq!(summary.passes[0].skipped, 1);
    assert_eq!(summary.skipped(), 1);

    // Only episode 2 of show X goes out, with its own date.
    let (_, shows) = &writes[1];
    assert_eq!(shows.shows.len(), 1);
    let season = &shows.shows[0].seasons[0];
    assert_eq!(season.number, 1);
    assert_eq!(season.episodes.len(), 1);
    assert_eq!(season.episodes[0].number, 2);
    assert_eq!(season.episodes[0].stamp, Some(SyncStamp::CollectedAt(date(2020, 1, 8))));

    assert_eq!(summary.added().movies, 1);
    assert_eq!(summary.added().episodes, 1);
}

#[tokio::test]
async fn test_second_collection_sync_sends_nothing() {
    let store = Recorder::default();
    let mut session = session(FakeService::new().with(remote_state), &store);
    let mut library = library();

    session.run_sync(&mut library, SyncDirection::Collection, &SyncScope::All).await;
    let first = session.service().writes().len();
    assert!(first > 0);

    let summary = session
        .run_sync(&mut library, SyncDirection::Collection, &SyncScope::All)
        .await;

    assert!(summary.is_success());
    assert_eq!(session.service().writes().len(), first);
    assert!(summary.passes.iter().all(|p| p.outcome == PassOutcome::UpToDate));
    // Still counted, still not sent.
    assert_eq!(summary.skipped(), 1);
}

#[tokio::test]
async fn test_unauthorized_twice_fails_without_writes() {
    let store = Recorder::default();
    let service = FakeService::new().with(|state| {
        remote_state(state);
        state.unauthorized = 2;
    });
    let mut session = session(service, &store);
    let mut library = library();

    let summary = session.run_sync(&mut library, SyncDirection::Both, &SyncScope::All).await;

    assert_eq!(summary.state, SessionState::Failed);
    assert!(summary.has_failure(FailureKind::AuthFailure));
    assert_eq!(session.service().refreshes, 1);
    assert_eq!(session.service().calls(), vec!["collection_movies", "collection_movies"]);
    assert!(session.service().writes().is_empty());
    assert!(store.persisted().is_empty());
}

#[tokio::test]
async fn test_single_unauthorized_is_refreshed_and_retried() {
    let store = Recorder::default();
    let service = FakeService::new().with(|state| {
        remote_state(state);
        state.unauthorized = 1;
    });
    let mut session = session(service, &store);
    let mut library = library();

    let summary = session
        .run_sync(&mut library, SyncDirection::Collection, &SyncScope::All)
        .await;

    assert!(summary.is_success());
    assert_eq!(session.service().refreshes, 1);
    assert_eq!(session.service().writes().len(), 2);
}

#[tokio::test]
async fn test_failed_refresh_is_auth_failure() {
    let store = Recorder::default();
    let mut service = FakeService::new().with(|state| state.unauthorized = 1);
    service.refresh_fails = true;
    let mut session = session(service, &store);
    let mut library = library();

    let summary = session
        .run_sync(&mut library, SyncDirection::Collection, &SyncScope::All)
        .await;

    assert_eq!(summary.state, SessionState::Failed);
    assert!(summary.has_failure(FailureKind::AuthFailure));
    assert_eq!(session.service().calls().len(), 1);
}

#[tokio::test]
async fn test_not_authenticated_makes_no_calls() {
    let store = Recorder::default();
    let mut service = FakeService::new();
    service.authenticated = false;
    let mut session = session(service, &store);
    let mut library = library();

    let summary = session.run_sync(&mut library, SyncDirection::Both, &SyncScope::All).await;

    assert_eq!(summary.state, SessionState::Failed);
    assert!(summary.has_failure(FailureKind::AuthFailure));
    assert!(session.service().calls().is_empty());
}

#[tokio::test]
async fn test_fetch_failure_moves_on_to_next_direction() {
    let store = Recorder::default();
    let service = FakeService::new().with(|state| state.failing.push("collection_movies"));
    let mut session = session(service, &store);
    let mut library = library();
    library.movies[0].watched = true;

    let summary = session.run_sync(&mut library, SyncDirection::Both, &SyncScope::All).await;

    assert_eq!(summary.state, SessionState::Failed);
    assert!(summary.has_failure(FailureKind::RemoteUnavailable));
    let calls = session.service().calls();
    assert!(calls.contains(&"watched_movies"));
    assert!(calls.contains(&"add_to_history"));
    assert!(calls.contains(&"collection_shows"));
    assert_eq!(summary.passes[0].outcome, PassOutcome::Aborted);
}

#[tokio::test]
async fn test_failed_write_skips_remaining_directions_of_that_kind() {
    let store = Recorder::default();
    let service = FakeService::new().with(|state| {
        remote_state(state);
        state.failing.push("add_to_collection");
    });
    let mut session = session(service, &store);
    let mut library = library();

    let summary = session.run_sync(&mut library, SyncDirection::Both, &SyncScope::All).await;

    assert_eq!(summary.state, SessionState::Failed);
    let calls = session.service().calls();
    assert!(!calls.contains(&"watched_movies"));
    assert!(!calls.contains(&"watched_shows"));
    // The show kind still ran after the movie write failed.
    assert!(calls.contains(&"collection_shows"));
    // Merges done before the failure stay applied.
    assert_eq!(library.movies[0].date_added, date(2020, 1, 1));
    assert_eq!(summary.failures.len(), 2);
}

#[tokio::test]
async fn test_watched_sync_is_monotonic_and_converges() {
    let store = Recorder::default();
    let service = FakeService::new().with(|state| {
        state.watched_movies.push(RemoteMovie {
            title: "A".to_string(),
            ids: MediaIds::new().with_imdb("tt0001"),
            plays: 2,
            last_watched_at: Some(date(2021, 5, 5)),
            ..RemoteMovie::default()
        });
    });
    let mut session = session(service, &store);
    let mut library = library();
    library.movies[2].watched = true;

    let summary = session
        .run_sync(&mut library, SyncDirection::Watched, &SyncScope::All)
        .await;

    assert!(summary.is_success());
    assert!(library.movies[0].watched);
    assert_eq!(library.movies[0].last_watched, Some(date(2021, 5, 5)));
    assert_eq!(store.persisted(), vec!["A".to_string()]);

    let writes = session.service().writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, "add_to_history");
    assert_eq!(writes[0].1.movies[0].ids.tmdb, Some(555));
    assert_eq!(writes[0].1.movies[0].stamp, Some(SyncStamp::WatchedAt(now())));

    let summary = session
        .run_sync(&mut library, SyncDirection::Watched, &SyncScope::All)
        .await;
    assert!(summary.is_success());
    assert_eq!(session.service().writes().len(), 1);
    assert_eq!(library.movies[2].last_watched, Some(now()));
    assert!(library.movies[2].watched);
}

#[tokio::test]
async fn test_shows_are_chunked_per_request() {
    let store = Recorder::default();
    let mut session = session(FakeService::new(), &store);
    let mut y = Show::new("y", "Y", date(2020, 1, 1)).with_ids(MediaIds::new().with_trakt(7));
    y.add_episode(Episode::new(1, 1, date(2020, 1, 1)));
    let mut library = library();
    library.shows.push(y);

    session
        .run_sync(&mut library, SyncDirection::Collection, &SyncScope::All)
        .await;

    let show_writes: Vec<_> = session
        .service()
        .writes()
        .into_iter()
        .filter(|(_, items)| !items.shows.is_empty())
        .collect();
    assert_eq!(show_writes.len(), 2);
    assert!(show_writes.iter().all(|(_, items)| items.shows.len() == 1));
}

#[tokio::test]
async fn test_dry_run_builds_but_does_not_send() {
    let store = Recorder::default();
    let mut session = session(FakeService::new().with(remote_state), &store).with_options(SessionOptions {
        shows_per_request: 1,
        dry_run: true,
    });
    let mut library = library();

    let summary = session
        .run_sync(&mut library, SyncDirection::Collection, &SyncScope::All)
        .await;

    assert!(summary.is_success());
    assert!(session.service().writes().is_empty());
    assert_eq!(summary.passes[0].outcome, PassOutcome::DryRun);
    assert_eq!(summary.passes[0].pending, 1);
    assert_eq!(summary.passes[1].pending, 1);
}

#[tokio::test]
async fn test_scope_limits_entities() {
    let store = Recorder::default();
    let mut session = session(FakeService::new().with(remote_state), &store);
    let mut library = library();

    let summary = session
        .run_sync(
            &mut library,
            SyncDirection::Collection,
            &SyncScope::Only(vec!["c".to_string(), "missing".to_string()]),
        )
        .await;

    assert!(summary.is_success());
    // Only the movie pass ran and A was never touched.
    assert_eq!(summary.passes.len(), 1);
    assert_eq!(library.movies[0].date_added, date(2019, 1, 1));
    assert!(!session.service().calls().contains(&"collection_shows"));
}

#[tokio::test]
async fn test_cancelled_session_fails_before_fetching() {
    let store = Recorder::default();
    let cancel = CancellationToken::new();
    let mut session = session(FakeService::new().with(remote_state), &store).with_cancellation(cancel.clone());
    cancel.cancel();
    let mut library = library();

    let summary = session.run_sync(&mut library, SyncDirection::Both, &SyncScope::All).await;

    assert_eq!(summary.state, SessionState::Failed);
    assert!(summary.has_failure(FailureKind::Cancelled));
    assert!(session.service().calls().is_empty());
}

/// Cancels the session on its first write and fails every persist.
struct InterruptingStore {
    cancel: CancellationToken,
}

impl EntityStore for InterruptingStore {
    fn persist(&self, entity: EntityRef<'_>) -> Result<(), StoreError> {
        Err(StoreError::InvalidKey(entity.label()))
    }

    fn write_external_metadata(&self, _entity: EntityRef<'_>) -> Result<(), StoreError> {
        self.cancel.cancel();
        Ok(())
    }
}

#[tokio::test]
async fn test_cancelled_pass_still_reports_entity_errors() {
    let cancel = CancellationToken::new();
    let service = FakeService::new().with(|state| {
        remote_state(state);
        state.collection_movies.push(RemoteMovie {
            title: "C".to_string(),
            ids: MediaIds::new().with_tmdb(555),
            collected_at: Some(date(2021, 1, 1)),
            ..RemoteMovie::default()
        });
    });
    let mut session = SyncSession::new(service, InterruptingStore { cancel: cancel.clone() })
        .with_clock(now)
        .with_cancellation(cancel);
    let mut library = library();

    let summary = session.run_sync(&mut library, SyncDirection::Collection, &SyncScope::All).await;

    assert_eq!(summary.state, SessionState::Failed);
    assert!(summary.has_failure(FailureKind::Cancelled));
    assert_eq!(summary.passes.len(), 1);
    let pass = &summary.passes[0];
    assert_eq!(pass.outcome, PassOutcome::Aborted);
    assert_eq!(pass.matched, 1);
    assert_eq!(pass.errors.len(), 1);
    assert!(pass.errors[0].contains("A"));
    assert_eq!(summary.errors, pass.errors);
    // A was merged before the interruption; C was never reached.
    assert_eq!(library.movies[0].date_added, date(2020, 1, 1));
    assert_eq!(library.movies[2].date_added, date(2019, 3, 3));
    assert!(session.service().writes().is_empty());
}

#[tokio::test]
async fn test_clear_removes_everything_and_is_idempotent() {
    let store = Recorder::default();
    let service = FakeService::new().with(|state| {
        remote_state(state);
        state.watched_movies.push(RemoteMovie {
            title: "A".to_string(),
            ids: MediaIds::new().with_imdb("tt0001"),
            plays: 1,
            ..RemoteMovie::default()
        });
    });
    let mut session = session(service, &store);

    let summary = session.run_clear(ClearScope::Both).await;

    assert!(summary.is_success());
    assert_eq!(summary.remote_collection, 2);
    assert_eq!(summary.remote_watched, 1);
    let ops: Vec<&str> = session.service().writes().iter().map(|(op, _)| *op).collect();
    assert_eq!(ops, vec!["remove_from_collection", "remove_from_history", "remove_from_collection"]);
    let show_removal = &session.service().writes()[2].1;
    assert_eq!(show_removal.shows[0].seasons[0].episodes[0].number, 1);
    assert!(show_removal.shows[0].stamp.is_none());

    let summary = session.run_clear(ClearScope::Both).await;
    assert!(summary.is_success());
    assert_eq!(session.service().writes().len(), 3);
    assert!(store.persisted().is_empty());
}

#[test]
fn test_direction_flags() {
    assert_eq!(SyncDirection::from_flags(true, true), Some(SyncDirection::Both));
    assert_eq!(SyncDirection::from_flags(false, false), None);
    assert_eq!(
        SyncDirection::Both.directions(),
        &[Direction::Collection, Direction::Watched]
    );
    assert_eq!(ClearScope::from_flags(false, false), ClearScope::Both);
    assert_eq!(ClearScope::from_flags(true, false), ClearScope::Movies);
}
