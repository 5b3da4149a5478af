// Artist library - the entity graph and the rules that keep it consistent
// The store is the only writer; everything else reads snapshots or subscribes

mod autosave;    // background writer for immediate saves
pub mod error;   // NotFound / Protected / Invalid and storage failures
pub mod model;   // artists, songs, playlists and their ids
pub mod storage; // durable storage port + JSON file implementation
pub mod store;   // mutation protocol, integrity, derived views

pub use error::{EntityKind, LibraryError, StorageError};
pub use model::{
    Artist, ArtistId, ArtistUpdate, AudioSource, Playlist, PlaylistId, Song, SongId, SongUpdate,
    ALL_SONGS_PLAYLIST,
};
pub use storage::{JsonFileStorage, LibraryStorage, MemoryStorage, SaveMode};
pub use store::{LibraryEvent, LibraryResult, LibraryStore};
