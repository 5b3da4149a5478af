use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::autosave::{Autosave, AUTOSAVE_DELAY};
use super::error::{EntityKind, LibraryError, StorageError};
use super::model::{
    Artist, ArtistId, ArtistUpdate, Playlist, PlaylistId, Song, SongId, SongUpdate,
    ALL_SONGS_PLAYLIST,
};
use super::storage::{LibraryStorage, SaveMode};
use crate::events::Notifier;

pub type LibraryResult<T> = Result<T, LibraryError>;

/// Published after every successful mutation. Consumers re-read the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryEvent {
    ArtistCreated(ArtistId),
    ArtistUpdated(ArtistId),
    ArtistDeleted(ArtistId),
    SongsChanged(ArtistId),
    PlaylistsChanged(ArtistId),
    Reloaded,
}

/// Owns the artist graph and is its only writer.
///
/// Every mutating call either succeeds and leaves the library with no dangling
/// playlist references, or fails with a [`LibraryError`] and changes nothing.
pub struct LibraryStore {
    artists: Vec<Artist>,
    storage: Option<Arc<dyn LibraryStorage>>,
    autosave: Option<Autosave>,
    notifier: Notifier<LibraryEvent>,
}

impl LibraryStore {
    /// Empty in-memory library with no durable storage attached.
    pub fn new() -> Self {
        Self {
            artists: Vec::new(),
            storage: None,
            autosave: None,
            notifier: Notifier::default(),
        }
    }

    /// Load the library once from `storage` and keep it for later saves.
    ///
    /// `SaveMode::Immediate` starts a background writer, so it must be called
    /// inside a tokio runtime.
    pub fn open(storage: Box<dyn LibraryStorage>, save_mode: SaveMode) -> Result<Self, StorageError> {
        let storage: Arc<dyn LibraryStorage> = Arc::from(storage);
        let mut artists = storage.load()?;
        let repaired = artists.iter_mut().map(repair_artist).filter(|changed| *changed).count();
        if repaired > 0 {
            warn!("Repaired playlist integrity for {} artists on load", repaired);
        }

        let autosave = match save_mode {
            SaveMode::Immediate => Some(Autosave::spawn(Arc::clone(&storage), AUTOSAVE_DELAY)?),
            SaveMode::Manual => None,
        };

        info!("Opened library with {} artists ({:?} saves)", artists.len(), save_mode);
        Ok(Self {
            artists,
            storage: Some(storage),
            autosave,
            notifier: Notifier::default(),
        })
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<LibraryEvent> {
        self.notifier.subscribe()
    }

    /// Write the current library to storage now, regardless of the save mode.
    pub fn flush(&self) -> Result<(), StorageError> {
        match &self.storage {
            Some(storage) => storage.save(&self.artists),
            None => Ok(()),
        }
    }

    /// Wait for pending background saves, then write the library a final time.
    pub async fn close(mut self) -> Result<(), StorageError> {
        if let Some(autosave) = self.autosave.take() {
            autosave.finish().await;
        }
        self.flush()
    }

    /// Replace the whole library, e.g. after an out-of-band import.
    pub fn replace_all(&mut self, mut artists: Vec<Artist>) {
        for artist in &mut artists {
            repair_artist(artist);
        }
        self.artists = artists;
        self.committed(LibraryEvent::Reloaded);
    }

    // -------- artists --------

    pub fn artists(&self) -> &[Artist] {
        &self.artists
    }

    pub fn snapshot(&self) -> Vec<Artist> {
        self.artists.clone()
    }

    pub fn artist(&self, id: ArtistId) -> LibraryResult<&Artist> {
        self.artists
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| LibraryError::not_found(EntityKind::Artist, id))
    }

    pub fn artist_named(&self, name: &str) -> LibraryResult<&Artist> {
        self.artists
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| LibraryError::not_found(EntityKind::Artist, name))
    }

    pub fn create_artist(&mut self, name: &str) -> LibraryResult<ArtistId> {
        let name = non_blank(name, "artist name")?;
        let artist = Artist::new(name);
        let id = artist.id;
        info!("Created artist '{}' ({})", artist.name, id);
        self.artists.push(artist);
        self.committed(LibraryEvent::ArtistCreated(id));
        Ok(id)
    }

    pub fn update_artist(&mut self, id: ArtistId, update: ArtistUpdate) -> LibraryResult<()> {
        let artist = self.artist_mut(id)?;
        if let Some(name) = &update.name {
            non_blank(name, "artist name")?;
        }
        update.apply(artist);
        debug!("Updated artist '{}' ({})", artist.name, id);
        self.committed(LibraryEvent::ArtistUpdated(id));
        Ok(())
    }

    /// Remove the artist together with every song and playlist it owns.
    pub fn delete_artist(&mut self, id: ArtistId) -> LibraryResult<()> {
        let pos = self
            .artists
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| LibraryError::not_found(EntityKind::Artist, id))?;
        let artist = self.artists.remove(pos);
        info!(
            "Deleted artist '{}' with {} songs and {} playlists",
            artist.name,
            artist.songs.len(),
            artist.playlists.len()
        );
        self.committed(LibraryEvent::ArtistDeleted(id));
        Ok(())
    }

    // -------- songs --------

    pub fn song(&self, song_id: SongId, artist_id: ArtistId) -> LibraryResult<&Song> {
        self.artist(artist_id)?
            .song(song_id)
            .ok_or_else(|| LibraryError::not_found(EntityKind::Song, song_id))
    }

    /// Look a song up across every artist.
    pub fn find_song(&self, song_id: SongId) -> LibraryResult<(ArtistId, &Song)> {
        self.artists
            .iter()
            .find_map(|a| a.song(song_id).map(|s| (a.id, s)))
            .ok_or_else(|| LibraryError::not_found(EntityKind::Song, song_id))
    }

    /// Append `song` to the artist and to its "All Songs" playlist in one step.
    pub fn add_song(&mut self, artist_id: ArtistId, mut song: Song) -> LibraryResult<SongId> {
        let artist = self.artist_mut(artist_id)?;
        song.title = non_blank(&song.title, "song title")?;
        if artist.contains_song(song.id) {
            return Err(LibraryError::Invalid(format!(
                "song {} already belongs to '{}'",
                song.id, artist.name
            )));
        }

        let id = song.id;
        info!("Added song '{}' to artist '{}'", song.title, artist.name);
        artist.songs.push(song);
        match artist.all_songs_mut() {
            Some(all) => all.song_ids.push(id),
            None => {
                let mut all = Playlist::new(ALL_SONGS_PLAYLIST);
                all.song_ids = artist.songs.iter().map(|s| s.id).collect();
                artist.playlists.insert(0, all);
            }
        }
        self.committed(LibraryEvent::SongsChanged(artist_id));
        Ok(id)
    }

    /// Remove each listed song and purge it from every playlist of the artist.
    ///
    /// Ids the artist does not own are skipped; returns how many songs were removed.
    pub fn delete_songs(&mut self, ids: &[SongId], artist_id: ArtistId) -> LibraryResult<usize> {
        let artist = self.artist_mut(artist_id)?;
        let before = artist.songs.len();
        artist.songs.retain(|s| !ids.contains(&s.id));
        let removed = before - artist.songs.len();

        if removed == 0 {
            debug!("No matching songs to delete for artist '{}'", artist.name);
            return Ok(0);
        }

        for playlist in &mut artist.playlists {
            playlist.song_ids.retain(|id| !ids.contains(id));
        }
        info!("Deleted {} songs from artist '{}'", removed, artist.name);
        self.committed(LibraryEvent::SongsChanged(artist_id));
        Ok(removed)
    }

    pub fn update_song(
        &mut self,
        song_id: SongId,
        artist_id: ArtistId,
        update: &SongUpdate,
    ) -> LibraryResult<()> {
        let song = self
            .artist_mut(artist_id)?
            .song_mut(song_id)
            .ok_or_else(|| LibraryError::not_found(EntityKind::Song, song_id))?;
        validate_song_update(update)?;
        if update.is_empty() {
            return Ok(());
        }
        update.apply(song);
        debug!("Updated song '{}' ({})", song.title, song_id);
        self.committed(LibraryEvent::SongsChanged(artist_id));
        Ok(())
    }

    pub fn set_song_artwork(
        &mut self,
        song_id: SongId,
        data: Option<Vec<u8>>,
        artist_id: ArtistId,
    ) -> LibraryResult<()> {
        let update = SongUpdate {
            artwork: Some(data),
            ..SongUpdate::default()
        };
        self.update_song(song_id, artist_id, &update)
    }

    /// Apply the same changes to every listed song; unknown ids are skipped.
    ///
    /// Returns the number of songs edited, zero for an empty update.
    pub fn batch_edit_songs(
        &mut self,
        ids: &[SongId],
        artist_id: ArtistId,
        update: &SongUpdate,
    ) -> LibraryResult<usize> {
        let artist = self.artist_mut(artist_id)?;
        validate_song_update(update)?;
        if update.is_empty() {
            return Ok(0);
        }
        let mut edited = 0;
        for song in artist.songs.iter_mut().filter(|s| ids.contains(&s.id)) {
            update.apply(song);
            edited += 1;
        }

        if edited > 0 {
            info!("Batch edited {} songs of artist '{}'", edited, artist.name);
            self.committed(LibraryEvent::SongsChanged(artist_id));
        }
        Ok(edited)
    }

    // -------- playlists --------

    pub fn playlist(&self, playlist_id: PlaylistId, artist_id: ArtistId) -> LibraryResult<&Playlist> {
        self.artist(artist_id)?
            .playlist(playlist_id)
            .ok_or_else(|| LibraryError::not_found(EntityKind::Playlist, playlist_id))
    }

    /// Resolve a playlist into song values in playlist order, ready for the playback queue.
    pub fn playlist_songs(&self, playlist_id: PlaylistId, artist_id: ArtistId) -> LibraryResult<Vec<Song>> {
        let artist = self.artist(artist_id)?;
        let playlist = artist
            .playlist(playlist_id)
            .ok_or_else(|| LibraryError::not_found(EntityKind::Playlist, playlist_id))?;
        Ok(playlist
            .song_ids
            .iter()
            .filter_map(|id| artist.song(*id))
            .cloned()
            .collect())
    }

    pub fn create_playlist(&mut self, name: &str, artist_id: ArtistId) -> LibraryResult<PlaylistId> {
        let artist = self.artist_mut(artist_id)?;
        let name = playlist_name(name)?;
        let playlist = Playlist::new(name);
        let id = playlist.id;
        info!("Created playlist '{}' for artist '{}'", playlist.name, artist.name);
        artist.playlists.push(playlist);
        self.committed(LibraryEvent::PlaylistsChanged(artist_id));
        Ok(id)
    }

    /// Delete a user playlist. Its songs stay in the library.
    pub fn delete_playlist(&mut self, playlist_id: PlaylistId, artist_id: ArtistId) -> LibraryResult<()> {
        let artist = self.artist_mut(artist_id)?;
        let pos = artist
            .playlists
            .iter()
            .position(|p| p.id == playlist_id)
            .ok_or_else(|| LibraryError::not_found(EntityKind::Playlist, playlist_id))?;
        if artist.playlists[pos].is_all_songs() {
            return Err(LibraryError::Protected(ALL_SONGS_PLAYLIST.to_string()));
        }

        let playlist = artist.playlists.remove(pos);
        info!("Deleted playlist '{}' from artist '{}'", playlist.name, artist.name);
        self.committed(LibraryEvent::PlaylistsChanged(artist_id));
        Ok(())
    }

    /// Append a song to a playlist. Adding a song twice keeps both entries.
    ///
    /// This is the whole drop-onto-playlist gesture: the dragged song must
    /// belong to the same artist as the target playlist.
    pub fn add_song_to_playlist(
        &mut self,
        song_id: SongId,
        playlist_id: PlaylistId,
        artist_id: ArtistId,
    ) -> LibraryResult<()> {
        let artist = self.artist_mut(artist_id)?;
        if !artist.contains_song(song_id) {
            return Err(LibraryError::not_found(EntityKind::Song, song_id));
        }
        let playlist = editable_playlist(artist, playlist_id)?;
        playlist.song_ids.push(song_id);
        debug!("Added song {} to playlist '{}'", song_id, playlist.name);
        self.committed(LibraryEvent::PlaylistsChanged(artist_id));
        Ok(())
    }

    /// Remove the first occurrence of the song. Returns false when it was not there.
    pub fn remove_song_from_playlist(
        &mut self,
        song_id: SongId,
        playlist_id: PlaylistId,
        artist_id: ArtistId,
    ) -> LibraryResult<bool> {
        let artist = self.artist_mut(artist_id)?;
        let playlist = editable_playlist(artist, playlist_id)?;
        let Some(pos) = playlist.song_ids.iter().position(|id| *id == song_id) else {
            return Ok(false);
        };
        playlist.song_ids.remove(pos);
        debug!("Removed song {} from playlist '{}'", song_id, playlist.name);
        self.committed(LibraryEvent::PlaylistsChanged(artist_id));
        Ok(true)
    }

    /// Move the entry at `from` so it ends up at index `to`.
    pub fn move_song_in_playlist(
        &mut self,
        playlist_id: PlaylistId,
        from: usize,
        to: usize,
        artist_id: ArtistId,
    ) -> LibraryResult<()> {
        let artist = self.artist_mut(artist_id)?;
        let playlist = editable_playlist(artist, playlist_id)?;
        let len = playlist.song_ids.len();
        if from >= len || to >= len {
            return Err(LibraryError::Invalid(format!(
                "cannot move entry {} to {} in a playlist of {}",
                from, to, len
            )));
        }
        if from == to {
            return Ok(());
        }

        let id = playlist.song_ids.remove(from);
        playlist.song_ids.insert(to, id);
        debug!("Moved entry {} to {} in playlist '{}'", from, to, playlist.name);
        self.committed(LibraryEvent::PlaylistsChanged(artist_id));
        Ok(())
    }

    pub fn rename_playlist(
        &mut self,
        playlist_id: PlaylistId,
        new_name: &str,
        artist_id: ArtistId,
    ) -> LibraryResult<()> {
        let artist = self.artist_mut(artist_id)?;
        let playlist = editable_playlist(artist, playlist_id)?;
        let new_name = playlist_name(new_name)?;
        info!("Renamed playlist '{}' to '{}'", playlist.name, new_name);
        playlist.name = new_name;
        self.committed(LibraryEvent::PlaylistsChanged(artist_id));
        Ok(())
    }

    /// Artwork is the one property "All Songs" lets users change.
    pub fn set_playlist_artwork(
        &mut self,
        playlist_id: PlaylistId,
        data: Option<Vec<u8>>,
        artist_id: ArtistId,
    ) -> LibraryResult<()> {
        let playlist = self
            .artist_mut(artist_id)?
            .playlist_mut(playlist_id)
            .ok_or_else(|| LibraryError::not_found(EntityKind::Playlist, playlist_id))?;
        playlist.artwork = data;
        self.committed(LibraryEvent::PlaylistsChanged(artist_id));
        Ok(())
    }

    // -------- derived views --------

    /// Songs ordered by creation time, ties broken by id.
    pub fn chronological_songs(&self, artist_id: ArtistId) -> LibraryResult<Vec<&Song>> {
        let mut songs: Vec<&Song> = self.artist(artist_id)?.songs.iter().collect();
        songs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(songs)
    }

    /// Every credited creator across the artist's songs, deduplicated and sorted.
    pub fn collaborators(&self, artist_id: ArtistId) -> LibraryResult<Vec<String>> {
        let names: BTreeSet<&str> = self
            .artist(artist_id)?
            .songs
            .iter()
            .flat_map(|s| s.creators.iter().map(String::as_str))
            .collect();
        Ok(names.into_iter().map(str::to_string).collect())
    }

    // -------- internals --------

    fn artist_mut(&mut self, id: ArtistId) -> LibraryResult<&mut Artist> {
        self.artists
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| LibraryError::not_found(EntityKind::Artist, id))
    }

    fn committed(&self, event: LibraryEvent) {
        if let Some(autosave) = &self.autosave {
            autosave.schedule(self.artists.clone());
        }
        self.notifier.publish(event);
    }
}

impl Default for LibraryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn non_blank(value: &str, what: &str) -> LibraryResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LibraryError::Invalid(format!("{} must not be empty", what)));
    }
    Ok(trimmed.to_string())
}

fn playlist_name(name: &str) -> LibraryResult<String> {
    let name = non_blank(name, "playlist name")?;
    if name == ALL_SONGS_PLAYLIST {
        return Err(LibraryError::Invalid(format!(
            "'{}' is reserved for the library",
            ALL_SONGS_PLAYLIST
        )));
    }
    Ok(name)
}

fn validate_song_update(update: &SongUpdate) -> LibraryResult<()> {
    if let Some(title) = &update.title {
        non_blank(title, "song title")?;
    }
    Ok(())
}

/// Look up a playlist that user commands may edit.
fn editable_playlist(artist: &mut Artist, playlist_id: PlaylistId) -> LibraryResult<&mut Playlist> {
    let playlist = artist
        .playlist_mut(playlist_id)
        .ok_or_else(|| LibraryError::not_found(EntityKind::Playlist, playlist_id))?;
    if playlist.is_all_songs() {
        return Err(LibraryError::Protected(ALL_SONGS_PLAYLIST.to_string()));
    }
    Ok(playlist)
}

/// Restore playlist invariants on externally loaded data. Returns true if anything changed.
fn repair_artist(artist: &mut Artist) -> bool {
    let mut changed = false;

    let mut seen_all_songs = false;
    let before = artist.playlists.len();
    artist.playlists.retain(|p| {
        if !p.is_all_songs() {
            return true;
        }
        let keep = !seen_all_songs;
        seen_all_songs = true;
        keep
    });
    changed |= artist.playlists.len() != before;

    let song_ids: Vec<SongId> = artist.songs.iter().map(|s| s.id).collect();
    match artist.all_songs_mut() {
        Some(all) => {
            if all.song_ids != song_ids {
                all.song_ids = song_ids.clone();
                changed = true;
            }
        }
        None => {
            let mut all = Playlist::new(ALL_SONGS_PLAYLIST);
            all.song_ids = song_ids.clone();
            artist.playlists.insert(0, all);
            changed = true;
        }
    }

    for playlist in artist.playlists.iter_mut().filter(|p| !p.is_all_songs()) {
        let len = playlist.song_ids.len();
        playlist.song_ids.retain(|id| song_ids.contains(id));
        changed |= playlist.song_ids.len() != len;
    }

    changed
}
