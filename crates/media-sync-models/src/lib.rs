pub mod media;
pub mod media_ids;
pub mod remote;
pub mod sync_items;

pub use media::{
    Episode, EpisodeKey, Identified, Library, LocalEntity, MediaKind, Movie, Season, Show, Trackable,
};
pub use media_ids::{IdNamespace, IdValue, MediaIds, MOVIE_NAMESPACES, SHOW_NAMESPACES};
pub use remote::{RemoteEpisode, RemoteIdentified, RemoteMovie, RemoteRecord, RemoteSeason, RemoteShow};
pub use sync_items::{
    SyncEpisode, SyncItems, SyncMovie, SyncResponse, SyncSeason, SyncShow, SyncStamp, SyncStats,
};
