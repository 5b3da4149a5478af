use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Name of the system-managed playlist every artist carries.
///
/// The playlist is recognised by this exact name; it mirrors the artist's
/// full song set and rejects manual edits.
pub const ALL_SONGS_PLAYLIST: &str = "All Songs";

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

entity_id!(
    /// Stable identifier of an [`Artist`].
    ArtistId
);
entity_id!(
    /// Identifier of a [`Song`], unique within its artist.
    SongId
);
entity_id!(
    /// Identifier of a [`Playlist`], unique within its artist.
    PlaylistId
);

/// Opaque handle the playback device resolves to playable audio.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioSource(String);

impl AudioSource {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn from_path(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub title: String,
    pub version: String,
    pub creators: Vec<String>, // collaborators, in credit order
    pub artwork: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
    pub audio_source: Option<AudioSource>,
    pub duration: Option<Duration>,
}

impl Song {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: SongId::new(),
            title: title.into(),
            version: String::new(),
            creators: Vec::new(),
            artwork: None,
            created_at: Utc::now(),
            audio_source: None,
            duration: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_creators<I, S>(mut self, creators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.creators = creators.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_audio_source(mut self, source: AudioSource) -> Self {
        self.audio_source = Some(source);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn display_title(&self) -> String {
        if self.version.is_empty() {
            self.title.clone()
        } else {
            format!("{} ({})", self.title, self.version)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
    pub artwork: Option<Vec<u8>>,
    /// Ordered multiset of member songs; the same id may appear more than once.
    pub song_ids: Vec<SongId>,
}

impl Playlist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PlaylistId::new(),
            name: name.into(),
            artwork: None,
            song_ids: Vec::new(),
        }
    }

    pub fn is_all_songs(&self) -> bool {
        self.name == ALL_SONGS_PLAYLIST
    }

    pub fn occurrences(&self, song_id: SongId) -> usize {
        self.song_ids.iter().filter(|id| **id == song_id).count()
    }

    pub fn len(&self) -> usize {
        self.song_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.song_ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: ArtistId,
    pub name: String,
    pub banner: Option<Vec<u8>>,
    pub avatar: Option<Vec<u8>>,
    pub songs: Vec<Song>,
    pub playlists: Vec<Playlist>,
}

impl Artist {
    /// Create an artist that already owns its empty "All Songs" playlist.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ArtistId::new(),
            name: name.into(),
            banner: None,
            avatar: None,
            songs: Vec::new(),
            playlists: vec![Playlist::new(ALL_SONGS_PLAYLIST)],
        }
    }

    pub fn song(&self, id: SongId) -> Option<&Song> {
        self.songs.iter().find(|s| s.id == id)
    }

    pub fn song_mut(&mut self, id: SongId) -> Option<&mut Song> {
        self.songs.iter_mut().find(|s| s.id == id)
    }

    pub fn contains_song(&self, id: SongId) -> bool {
        self.songs.iter().any(|s| s.id == id)
    }

    pub fn playlist(&self, id: PlaylistId) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.id == id)
    }

    pub fn playlist_mut(&mut self, id: PlaylistId) -> Option<&mut Playlist> {
        self.playlists.iter_mut().find(|p| p.id == id)
    }

    pub fn all_songs(&self) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.is_all_songs())
    }

    pub fn all_songs_mut(&mut self) -> Option<&mut Playlist> {
        self.playlists.iter_mut().find(|p| p.is_all_songs())
    }
}

/// Field changes for `LibraryStore::update_artist`. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtistUpdate {
    pub name: Option<String>,
    pub banner: Option<Option<Vec<u8>>>,
    pub avatar: Option<Option<Vec<u8>>>,
}

impl ArtistUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub(crate) fn apply(&self, artist: &mut Artist) {
        if let Some(name) = &self.name {
            artist.name = name.trim().to_string();
        }
        if let Some(banner) = &self.banner {
            artist.banner = banner.clone();
        }
        if let Some(avatar) = &self.avatar {
            artist.avatar = avatar.clone();
        }
    }
}

/// Field changes applied to one song, or to every song of a batch edit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongUpdate {
    pub title: Option<String>,
    pub version: Option<String>,
    /// Replaces the creator list outright.
    pub creators: Option<Vec<String>>,
    /// Appended after `creators` is applied, skipping names already credited.
    pub add_creators: Vec<String>,
    pub artwork: Option<Option<Vec<u8>>>,
    pub audio_source: Option<Option<AudioSource>>,
}

impl SongUpdate {
    /// Tag every target song with one more collaborator.
    pub fn add_collaborator(name: impl Into<String>) -> Self {
        Self {
            add_creators: vec![name.into()],
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn apply(&self, song: &mut Song) {
        if let Some(title) = &self.title {
            song.title = title.trim().to_string();
        }
        if let Some(version) = &self.version {
            song.version = version.clone();
        }
        if let Some(creators) = &self.creators {
            song.creators = creators.clone();
        }
        for creator in &self.add_creators {
            if !song.creators.contains(creator) {
                song.creators.push(creator.clone());
            }
        }
        if let Some(artwork) = &self.artwork {
            song.artwork = artwork.clone();
        }
        if let Some(source) = &self.audio_source {
            song.audio_source = source.clone();
        }
    }
}
