pub mod traits;
pub mod trakt;
pub mod error;

pub use traits::TrackingService;
pub use error::SourceError;
pub use trakt::TraktClient;
