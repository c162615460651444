// Per-session reporting types

use std::time::Duration;

use media_sync_models::{MediaKind, SyncResponse, SyncStats};
use serde::Serialize;

use crate::batch::Direction;
use crate::error::{FailureKind, SyncError};

/// Where a session is, or where it stopped.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Fetching,
    Reconciling,
    Building,
    Submitting,
    Done,
    Failed,
}

/// How one pass (kind × direction) ended.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    /// At least one write call was made.
    Submitted,
    /// Nothing eligible to send.
    UpToDate,
    /// A batch was built but not sent.
    DryRun,
    /// The remote side failed; the pass produced no writes.
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    pub kind: MediaKind,
    pub direction: Direction,
    /// Items in the fetched remote list.
    pub remote_items: usize,
    pub matched: usize,
    /// Scoped entities with no remote counterpart.
    pub unmatched: usize,
    /// Local entities written back.
    pub updated: usize,
    /// Entries in the outbound batch (movies, or episodes for shows).
    pub pending: usize,
    /// Unscraped entities left out of the batch.
    pub skipped: usize,
    pub outcome: PassOutcome,
    pub response: SyncResponse,
    /// Per-entity persistence errors raised while reconciling.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl PassSummary {
    pub(crate) fn new(kind: MediaKind, direction: Direction) -> Self {
        Self {
            kind,
            direction,
            remote_items: 0,
            matched: 0,
            unmatched: 0,
            updated: 0,
            pending: 0,
            skipped: 0,
            outcome: PassOutcome::UpToDate,
            response: SyncResponse::default(),
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl SessionFailure {
    pub(crate) fn from_error(err: &SyncError) -> Option<Self> {
        err.failure_kind().map(|kind| Self {
            kind,
            message: err.to_string(),
        })
    }
}

/// Outcome of a sync session.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SyncSummary {
    pub state: SessionState,
    pub passes: Vec<PassSummary>,
    /// Remote or auth failures, in the order they happened.
    pub failures: Vec<SessionFailure>,
    /// Per-entity persistence errors.
    pub errors: Vec<String>,
    #[serde(skip)]
    pub duration: Duration,
}

impl SyncSummary {
    pub(crate) fn record(&mut self, pass: PassSummary) {
        self.errors.extend(pass.errors.iter().cloned());
        self.passes.push(pass);
    }

    pub fn added(&self) -> SyncStats {
        self.fold(|pass| pass.response.added)
    }

    pub fn existing(&self) -> SyncStats {
        self.fold(|pass| pass.response.existing)
    }

    pub fn skipped(&self) -> usize {
        self.passes.iter().map(|p| p.skipped).sum()
    }

    pub fn updated(&self) -> usize {
        self.passes.iter().map(|p| p.updated).sum()
    }

    /// Items the service reported as not found, across all passes.
    pub fn not_found(&self) -> usize {
        self.passes
            .iter()
            .map(|p| p.response.not_found.movies.len() + p.response.not_found.shows.len())
            .sum()
    }

    pub fn errored(&self) -> bool {
        !self.failures.is_empty() || !self.errors.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.state == SessionState::Done && self.failures.is_empty()
    }

    pub fn has_failure(&self, kind: FailureKind) -> bool {
        self.failures.iter().any(|f| f.kind == kind)
    }

    fn fold(&self, pick: impl Fn(&PassSummary) -> SyncStats) -> SyncStats {
        let mut total = SyncStats::default();
        for pass in &self.passes {
            total += pick(pass);
        }
        total
    }
}

/// Outcome of a clear session.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ClearSummary {
    pub state: SessionState,
    pub failures: Vec<SessionFailure>,
    /// Remote items seen before clearing.
    pub remote_collection: usize,
    pub remote_watched: usize,
    pub removed_from_collection: SyncStats,
    pub removed_from_history: SyncStats,
}

impl ClearSummary {
    pub fn is_success(&self) -> bool {
        self.state == SessionState::Done && self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_fold_over_passes() {
        let mut movies = PassSummary::new(MediaKind::Movie, Direction::Collection);
        movies.response.added.movies = 2;
        movies.skipped = 1;
        let mut shows = PassSummary::new(MediaKind::Show, Direction::Watched);
        shows.response.added.episodes = 3;
        shows.response.existing.episodes = 1;

        let summary = SyncSummary {
            state: SessionState::Done,
            passes: vec![movies, shows],
            ..SyncSummary::default()
        };

        assert_eq!(summary.added().describe(), "2 Movies 3 Episodes");
        assert_eq!(summary.existing().episodes, 1);
        assert_eq!(summary.skipped(), 1);
        assert!(summary.is_success());
        assert!(!summary.errored());
    }

    #[test]
    fn test_failure_marks_summary_unsuccessful() {
        let summary = SyncSummary {
            state: SessionState::Failed,
            failures: SessionFailure::from_error(&SyncError::AuthFailure("401".to_string())).into_iter().collect(),
            ..SyncSummary::default()
        };
        assert!(!summary.is_success());
        assert!(summary.has_failure(FailureKind::AuthFailure));
    }
}
