pub mod batch;
pub mod diff;
pub mod episodes;
pub mod error;
pub mod id_matching;
pub mod library;
pub mod merge;
pub mod session;
pub mod summary;

pub use batch::{BatchOutcome, Direction};
pub use diff::{diff_movies, diff_shows, DiffStats};
pub use error::{FailureKind, SyncError};
pub use id_matching::{matches, matching_namespace};
pub use library::{EntityRef, EntityStore, JsonLibrary, StoreError};
pub use merge::{merge_entity, merge_record, MergeOutcome};
pub use session::{ClearScope, SessionOptions, SyncDirection, SyncScope, SyncSession};
pub use summary::{ClearSummary, PassOutcome, PassSummary, SessionFailure, SessionState, SyncSummary};
