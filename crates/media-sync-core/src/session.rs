// One sync or clear run against the tracking service

use std::time::Instant;

use chrono::{DateTime, Utc};
use media_sync_models::{Library, MediaKind, Movie, Show, SyncItems, SyncResponse};
use media_sync_sources::{SourceError, TrackingService};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::batch::{build_movie_batch, build_movie_removal, build_show_batch, build_show_removal, Direction};
use crate::diff::{diff_movies, diff_shows, DiffStats};
use crate::error::SyncError;
use crate::library::EntityStore;
use crate::summary::{ClearSummary, PassOutcome, PassSummary, SessionFailure, SessionState, SyncSummary};

/// Issue one service call. A 401 triggers one token refresh and one retry;
/// every other failure is returned as is.
macro_rules! remote_call {
    ($session:expr, $op:expr, $method:ident($($arg:expr),*)) => {{
        let mut refreshed = false;
        loop {
            match $session.service.$method($($arg),*).await {
                Ok(value) => break Ok(value),
                Err(err) => {
                    if let Err(fatal) = $session.recover($op, err, &mut refreshed).await {
                        break Err(fatal);
                    }
                }
            }
        }
    }};
}

/// Which directions a sync covers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    Collection,
    Watched,
    Both,
}

impl SyncDirection {
    pub fn from_flags(collection: bool, watched: bool) -> Option<Self> {
        match (collection, watched) {
            (true, true) => Some(SyncDirection::Both),
            (true, false) => Some(SyncDirection::Collection),
            (false, true) => Some(SyncDirection::Watched),
            (false, false) => None,
        }
    }

    /// Collection always runs before watched.
    pub fn directions(&self) -> &'static [Direction] {
        match self {
            SyncDirection::Collection => &[Direction::Collection],
            SyncDirection::Watched => &[Direction::Watched],
            SyncDirection::Both => &[Direction::Collection, Direction::Watched],
        }
    }
}

/// Which local entities take part in a sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SyncScope {
    #[default]
    All,
    /// Library keys of the movies and shows to sync.
    Only(Vec<String>),
}

impl SyncScope {
    fn select<T>(&self, items: &[T], key: impl Fn(&T) -> &str) -> Vec<usize> {
        match self {
            SyncScope::All => (0..items.len()).collect(),
            SyncScope::Only(keys) => items
                .iter()
                .enumerate()
                .filter(|(_, item)| keys.iter().any(|k| k == key(item)))
                .map(|(idx, _)| idx)
                .collect(),
        }
    }
}

/// What a clear removes from the tracking service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClearScope {
    Movies,
    Shows,
    Both,
}

impl ClearScope {
    pub fn from_flags(movies: bool, shows: bool) -> Self {
        match (movies, shows) {
            (true, false) => ClearScope::Movies,
            (false, true) => ClearScope::Shows,
            _ => ClearScope::Both,
        }
    }

    fn kinds(&self) -> &'static [MediaKind] {
        match self {
            ClearScope::Movies => &[MediaKind::Movie],
            ClearScope::Shows => &[MediaKind::Show],
            ClearScope::Both => &[MediaKind::Movie, MediaKind::Show],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionOptions {
    /// Shows per write call; 0 sends every show in one call.
    pub shows_per_request: usize,
    /// Build batches without submitting them.
    pub dry_run: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            shows_per_request: 1,
            dry_run: false,
        }
    }
}

impl From<&media_sync_config::SyncOptions> for SessionOptions {
    fn from(options: &media_sync_config::SyncOptions) -> Self {
        Self {
            shows_per_request: options.shows_per_request,
            dry_run: false,
        }
    }
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Owns the service handle and the store for the duration of a run. Runs are
/// strictly sequential: one remote call at a time, and every entity is merged
/// and persisted before the next one is looked at.
pub struct SyncSession<S: TrackingService> {
    service: S,
    store: Box<dyn EntityStore>,
    options: SessionOptions,
    state: SessionState,
    cancel: CancellationToken,
    clock: Clock,
}

impl<S: TrackingService> SyncSession<S> {
    pub fn new(service: S, store: impl EntityStore + 'static) -> Self {
        Self {
            service,
            store: Box::new(store),
            options: SessionOptions::default(),
            state: SessionState::Idle,
            cancel: CancellationToken::new(),
            clock: Box::new(Utc::now),
        }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replace the wall clock used for history timestamps.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Reconcile the library with the service and push what is missing there.
    ///
    /// Movies run before shows. A remote failure aborts the current direction
    /// (while fetching) or the remaining directions of that kind (while
    /// submitting); an auth failure or cancellation ends the session. The
    /// summary is returned in every case.
    #[instrument(skip(self, library, scope), fields(service = self.service.service_name()))]
    pub async fn run_sync(
        &mut self,
        library: &mut Library,
        direction: SyncDirection,
        scope: &SyncScope,
    ) -> SyncSummary {
        let started = Instant::now();
        let mut summary = SyncSummary::default();

        if !self.service.is_authenticated() {
            let err = SyncError::AuthFailure(format!("not authenticated with {}", self.service.service_name()));
            error!("{}", err);
            summary.failures.extend(SessionFailure::from_error(&err));
            return self.finish_sync(summary, started);
        }

        if let SyncScope::Only(keys) = scope {
            for key in keys {
                match library.get(key) {
                    Some(entity) => debug!("Syncing {} '{}'", entity.kind(), entity.label()),
                    None => warn!("'{}' is not in the library", key),
                }
            }
        }

        let movie_candidates = scope.select(&library.movies, |m| m.key.as_str());
        let show_candidates = scope.select(&library.shows, |s| s.key.as_str());

        'kinds: for kind in [MediaKind::Movie, MediaKind::Show] {
            let candidates = match kind {
                MediaKind::Movie => &movie_candidates,
                MediaKind::Show => &show_candidates,
            };
            if candidates.is_empty() {
                debug!("No {} to sync", kind);
                continue;
            }

            for dir in direction.directions() {
                let mut pass = PassSummary::new(kind, *dir);
                let result = match kind {
                    MediaKind::Movie => self.movie_pass(&mut library.movies, candidates, &mut pass).await,
                    MediaKind::Show => self.show_pass(&mut library.shows, candidates, &mut pass).await,
                };

                let Err(err) = result else {
                    summary.record(pass);
                    continue;
                };
                pass.outcome = PassOutcome::Aborted;
                summary.record(pass);
                summary.failures.extend(SessionFailure::from_error(&err));

                if err.aborts_session() {
                    break 'kinds;
                }
                if self.state == SessionState::Submitting {
                    warn!("Skipping the remaining {} directions after a failed write", kind);
                    break;
                }
            }
        }

        self.finish_sync(summary, started)
    }

    fn finish_sync(&mut self, mut summary: SyncSummary, started: Instant) -> SyncSummary {
        self.state = if summary.failures.is_empty() {
            SessionState::Done
        } else {
            SessionState::Failed
        };
        summary.state = self.state;
        summary.duration = started.elapsed();
        info!(
            "Sync finished in {:.1}s: added {}, skipped {}, errors {}",
            summary.duration.as_secs_f64(),
            summary.added().describe(),
            summary.skipped(),
            summary.errors.len() + summary.failures.len()
        );
        summary
    }

    async fn movie_pass(
        &mut self,
        movies: &mut [Movie],
        candidates: &[usize],
        pass: &mut PassSummary,
    ) -> Result<(), SyncError> {
        self.check_cancelled()?;
        self.state = SessionState::Fetching;
        let remote = match pass.direction {
            Direction::Collection => {
                let remote = remote_call!(self, "retrieve movie collection", collection_movies())?;
                info!("You have {} movies in your collection", remote.len());
                remote
            }
            Direction::Watched => {
                let remote = remote_call!(self, "retrieve watched movies", watched_movies())?;
                info!("You have {} watched movies", remote.len());
                remote
            }
        };
        pass.remote_items = remote.len();

        self.state = SessionState::Reconciling;
        let diff = diff_movies(movies, candidates, &remote, self.store.as_ref(), &self.cancel);
        pass.unmatched = diff.residual.len();
        record_stats(pass, diff.stats);
        if diff.cancelled {
            return Err(SyncError::Cancelled);
        }

        self.state = SessionState::Building;
        let batch = build_movie_batch(movies, &diff.residual, pass.direction, (self.clock)());
        pass.skipped = batch.skipped;
        let Some(items) = batch.items else {
            info!("Movie {} is already up-to-date", pass.direction);
            return Ok(());
        };
        pass.pending = items.movies.len();
        info!("Sending {} movies to the {}", pass.pending, pass.direction);

        self.submit(items, 0, pass).await
    }

    async fn show_pass(
        &mut self,
        shows: &mut [Show],
        candidates: &[usize],
        pass: &mut PassSummary,
    ) -> Result<(), SyncError> {
        self.check_cancelled()?;
        self.state = SessionState::Fetching;
        let remote = match pass.direction {
            Direction::Collection => {
                let remote = remote_call!(self, "retrieve show collection", collection_shows())?;
                info!("You have {} shows in your collection", remote.len());
                remote
            }
            Direction::Watched => {
                let remote = remote_call!(self, "retrieve watched shows", watched_shows())?;
                info!("You have {} watched shows", remote.len());
                remote
            }
        };
        pass.remote_items = remote.len();

        self.state = SessionState::Reconciling;
        let diff = diff_shows(shows, candidates, &remote, self.store.as_ref(), &self.cancel);
        if !diff.unmatched.is_empty() {
            debug!("{} shows have no remote {} entry yet", diff.unmatched.len(), pass.direction);
        }
        pass.unmatched = diff.unmatched.len();
        record_stats(pass, diff.stats);
        if diff.cancelled {
            return Err(SyncError::Cancelled);
        }

        self.state = SessionState::Building;
        let batch = build_show_batch(shows, candidates, pass.direction, &diff.represented, (self.clock)());
        pass.skipped = batch.skipped;
        let Some(items) = batch.items else {
            info!("Show {} is already up-to-date", pass.direction);
            return Ok(());
        };
        pass.pending = items.episode_count();
        info!(
            "Sending {} episodes of {} shows to the {}",
            pass.pending,
            items.shows.len(),
            pass.direction
        );

        let chunk_size = self.options.shows_per_request;
        self.submit(items, chunk_size, pass).await
    }

    async fn submit(&mut self, items: SyncItems, chunk_size: usize, pass: &mut PassSummary) -> Result<(), SyncError> {
        if self.options.dry_run {
            info!("Dry run, not sending the {} batch", pass.direction);
            pass.outcome = PassOutcome::DryRun;
            return Ok(());
        }

        self.state = SessionState::Submitting;
        for chunk in items.into_chunks(chunk_size) {
            let response = match pass.direction {
                Direction::Collection => remote_call!(self, "add to collection", add_to_collection(&chunk))?,
                Direction::Watched => remote_call!(self, "add to history", add_to_history(&chunk))?,
            };
            print_status(&response);
            pass.response += response;
            pass.outcome = PassOutcome::Submitted;
        }
        Ok(())
    }

    /// Remove every movie and/or show from the service's collection and
    /// history. Nothing local is read or written.
    #[instrument(skip(self), fields(service = self.service.service_name()))]
    pub async fn run_clear(&mut self, scope: ClearScope) -> ClearSummary {
        let mut summary = ClearSummary::default();

        if !self.service.is_authenticated() {
            let err = SyncError::AuthFailure(format!("not authenticated with {}", self.service.service_name()));
            error!("{}", err);
            summary.failures.extend(SessionFailure::from_error(&err));
        } else {
            for kind in scope.kinds() {
                if let Err(err) = self.clear_kind(*kind, &mut summary).await {
                    summary.failures.extend(SessionFailure::from_error(&err));
                    if err.aborts_session() {
                        break;
                    }
                }
            }
        }

        self.state = if summary.failures.is_empty() {
            SessionState::Done
        } else {
            SessionState::Failed
        };
        summary.state = self.state;
        summary
    }

    async fn clear_kind(&mut self, kind: MediaKind, summary: &mut ClearSummary) -> Result<(), SyncError> {
        self.check_cancelled()?;
        self.state = SessionState::Fetching;
        let (collection, history) = match kind {
            MediaKind::Movie => {
                let collection = remote_call!(self, "retrieve movie collection", collection_movies())?;
                let watched = remote_call!(self, "retrieve watched movies", watched_movies())?;
                info!("Clearing {} collected and {} watched movies", collection.len(), watched.len());
                summary.remote_collection += collection.len();
                summary.remote_watched += watched.len();
                (build_movie_removal(&collection), build_movie_removal(&watched))
            }
            MediaKind::Show => {
                let collection = remote_call!(self, "retrieve show collection", collection_shows())?;
                let watched = remote_call!(self, "retrieve watched shows", watched_shows())?;
                info!("Clearing {} collected and {} watched shows", collection.len(), watched.len());
                summary.remote_collection += collection.len();
                summary.remote_watched += watched.len();
                (build_show_removal(&collection), build_show_removal(&watched))
            }
        };

        if self.options.dry_run {
            info!("Dry run, not clearing {}", kind);
            return Ok(());
        }

        self.state = SessionState::Submitting;
        match collection {
            Some(items) => {
                let response = remote_call!(self, "remove from collection", remove_from_collection(&items))?;
                print_status(&response);
                summary.removed_from_collection += response.deleted;
            }
            None => info!("Your {} collection is already empty", kind),
        }
        match history {
            Some(items) => {
                let response = remote_call!(self, "remove from history", remove_from_history(&items))?;
                print_status(&response);
                summary.removed_from_history += response.deleted;
            }
            None => info!("Your {} history is already empty", kind),
        }
        Ok(())
    }

    /// Decide what to do with a failed call. `Ok` means retry.
    async fn recover(&mut self, op: &str, err: SourceError, refreshed: &mut bool) -> Result<(), SyncError> {
        match SyncError::from(err) {
            SyncError::AuthExpired if !*refreshed => {
                *refreshed = true;
                warn!("Failed to {}: access token rejected, refreshing", op);
                if let Err(e) = self.service.refresh_access_token().await {
                    let err = SyncError::AuthFailure(format!("could not refresh access token: {}", e));
                    error!("Failed to {}: {}", op, err);
                    return Err(err);
                }
                Ok(())
            }
            SyncError::AuthExpired => {
                let err = SyncError::AuthFailure(format!("{} still unauthorized after a token refresh", op));
                error!("Failed to {}: {}", op, err);
                Err(err)
            }
            other => {
                error!("Failed to {}: {}", op, other);
                Err(other)
            }
        }
    }

    fn check_cancelled(&self) -> Result<(), SyncError> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }
}

fn record_stats(pass: &mut PassSummary, stats: DiffStats) {
    pass.matched = stats.matched;
    pass.updated = stats.updated;
    pass.errors = stats.errors;
}

fn print_status(response: &SyncResponse) {
    debug!("Added       : {}", response.added.describe());
    debug!("Existing    : {}", response.existing.describe());
    debug!("Deleted     : {}", response.deleted.describe());
    for movie in &response.not_found.movies {
        info!("Not found   : movie {}", movie.ids.describe());
    }
    for show in &response.not_found.shows {
        info!("Not found   : show {}", show.ids.describe());
    }
}

#[cfg(test)]
mod tests;
