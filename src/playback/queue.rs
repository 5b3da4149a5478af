use serde::{Deserialize, Serialize};

use crate::library::Song;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

/// Songs queued for playback plus the index of the one playing.
///
/// The queue owns copies of the songs, so library edits made after
/// enqueueing never reach it.
#[derive(Debug, Clone, Default)]
pub struct PlayQueue {
    songs: Vec<Song>,
    cursor: Option<usize>,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue and point at its first song.
    pub fn replace(&mut self, songs: Vec<Song>) -> Option<&Song> {
        self.cursor = if songs.is_empty() { None } else { Some(0) };
        self.songs = songs;
        self.current()
    }

    pub fn current(&self) -> Option<&Song> {
        self.cursor.and_then(|i| self.songs.get(i))
    }

    pub fn position(&self) -> Option<usize> {
        self.cursor
    }

    /// Step forward. Past the end this wraps when `wrap` is set and
    /// otherwise returns `None`, leaving the cursor in place.
    pub fn advance(&mut self, wrap: bool) -> Option<&Song> {
        let cursor = self.cursor?;
        let next = cursor + 1;
        if next < self.songs.len() {
            self.cursor = Some(next);
        } else if wrap {
            self.cursor = Some(0);
        } else {
            return None;
        }
        self.current()
    }

    /// Step back; at the start the cursor stays on the first song.
    pub fn retreat(&mut self) -> Option<&Song> {
        let cursor = self.cursor?;
        self.cursor = Some(cursor.saturating_sub(1));
        self.current()
    }

    pub fn clear(&mut self) {
        self.songs.clear();
        self.cursor = None;
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}
