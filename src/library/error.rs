use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Artist,
    Song,
    Playlist,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Artist => "artist",
            EntityKind::Song => "song",
            EntityKind::Playlist => "playlist",
        };
        f.write_str(name)
    }
}

/// Typed failure returned by every library command.
///
/// All variants are recoverable; callers decide whether to show them to a user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryError {
    /// A referenced artist, song or playlist does not exist.
    #[error("{0} not found: {1}")]
    NotFound(EntityKind, String),

    /// Attempted manual edit of the system-managed "All Songs" playlist.
    #[error("playlist '{0}' is managed by the library and cannot be changed this way")]
    Protected(String),

    /// Blank or malformed input.
    #[error("invalid input: {0}")]
    Invalid(String),
}

impl LibraryError {
    pub fn not_found(kind: EntityKind, id: impl fmt::Display) -> Self {
        LibraryError::NotFound(kind, id.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LibraryError::NotFound(..))
    }
}

/// Failure reading or writing durable library storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("library serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
