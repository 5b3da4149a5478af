// Encore Library - core of the artist library browser
// Two independently owned state containers: the library store and the playback engine

pub mod config;   // settings and preferences
pub mod events;   // subscription mechanism shared by both containers
pub mod library;  // artists, songs, playlists + integrity rules
pub mod logging;  // tracing subscriber setup
pub mod playback; // transport state machine and progress clock

// Export the stuff consumers actually use
pub use config::Config;
pub use library::{
    Artist, ArtistId, LibraryError, LibraryEvent, LibraryStore, Playlist, PlaylistId, Song, SongId,
};
pub use playback::{NullDevice, PlaybackDevice, PlaybackEngine, PlaybackState, PlayerEvent};
