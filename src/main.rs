// Encore - artist library + playback preview from the terminal
// A thin consumer: every command maps onto one store or engine operation

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use encore::{
    config::Config,
    library::{
        Artist, AudioSource, JsonFileStorage, LibraryStore, PlaylistId, Song, SongId,
        SongUpdate,
    },
    logging::init_logging,
    playback::{self, EngineSettings, NullDevice, PlaybackEngine, PlaybackState},
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "encore")]
#[command(about = "Manage an artist library and preview playback from the terminal")]
struct Args {
    /// Config file to use instead of the per-user one
    #[arg(long)]
    config: Option<PathBuf>,

    /// Library file to use instead of the configured one
    #[arg(long)]
    library: Option<PathBuf>,

    /// Mirror log output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every artist with song and playlist counts
    Artists,
    /// Create an artist
    AddArtist { name: String },
    /// Delete an artist with all of its songs and playlists
    RemoveArtist { name: String },
    /// Add a song to an artist
    AddSong {
        artist: String,
        title: String,
        #[arg(long, default_value = "")]
        version: String,
        /// Credited creator, repeatable
        #[arg(long = "creator")]
        creators: Vec<String>,
        /// Audio file backing the song
        #[arg(long)]
        source: Option<PathBuf>,
        /// Song length in seconds
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// List an artist's songs
    Songs {
        artist: String,
        /// Order by creation time instead of insertion order
        #[arg(long)]
        chronological: bool,
    },
    /// Delete songs by title
    DeleteSongs { artist: String, titles: Vec<String> },
    /// Credit one more collaborator on several songs at once
    Tag {
        artist: String,
        collaborator: String,
        titles: Vec<String>,
    },
    /// List everyone credited on an artist's songs
    Collaborators { artist: String },
    /// List an artist's playlists
    Playlists { artist: String },
    CreatePlaylist { artist: String, name: String },
    DeletePlaylist { artist: String, name: String },
    RenamePlaylist {
        artist: String,
        name: String,
        new_name: String,
    },
    /// Drop a song onto a playlist
    AddToPlaylist {
        artist: String,
        playlist: String,
        title: String,
    },
    RemoveFromPlaylist {
        artist: String,
        playlist: String,
        title: String,
    },
    /// Simulate playback of a playlist (defaults to "All Songs")
    Play {
        artist: String,
        #[arg(long)]
        playlist: Option<String>,
        /// How long to run the clock
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let _log_guard = init_logging(&config.logging.directory, args.verbose)?;

    let library_path = args.library.clone().unwrap_or_else(|| config.library.path.clone());
    info!("Using library at {}", library_path.display());
    let storage = JsonFileStorage::new(library_path);
    let mut store = LibraryStore::open(Box::new(storage), config.library.save_mode)?;

    run(&mut store, &config, args.command).await?;

    store.close().await?;
    Ok(())
}

async fn run(store: &mut LibraryStore, config: &Config, command: Command) -> Result<()> {
    match command {
        Command::Artists => {
            for artist in store.artists() {
                println!(
                    "{}  ({} songs, {} playlists)",
                    artist.name,
                    artist.songs.len(),
                    artist.playlists.len()
                );
            }
        }
        Command::AddArtist { name } => {
            let id = store.create_artist(&name)?;
            println!("Created {} ({})", name, id);
        }
        Command::RemoveArtist { name } => {
            let id = store.artist_named(&name)?.id;
            store.delete_artist(id)?;
            println!("Deleted {}", name);
        }
        Command::AddSong {
            artist,
            title,
            version,
            creators,
            source,
            seconds,
        } => {
            let artist_id = store.artist_named(&artist)?.id;
            let mut song = Song::new(title).with_version(version).with_creators(creators);
            if let Some(path) = source {
                song = song.with_audio_source(AudioSource::from_path(&path));
            }
            if let Some(secs) = seconds {
                song = song.with_duration(Duration::from_secs(secs));
            }
            let id = store.add_song(artist_id, song)?;
            println!("Added song {}", id);
        }
        Command::Songs { artist, chronological } => {
            let artist = store.artist_named(&artist)?;
            let songs: Vec<&Song> = if chronological {
                store.chronological_songs(artist.id)?
            } else {
                artist.songs.iter().collect()
            };
            for song in songs {
                println!(
                    "{}  {}  [{}]",
                    song.created_at.format("%Y-%m-%d %H:%M"),
                    song.display_title(),
                    song.creators.join(", ")
                );
            }
        }
        Command::DeleteSongs { artist, titles } => {
            let artist = store.artist_named(&artist)?;
            let artist_id = artist.id;
            let ids = songs_titled(artist, &titles);
            let removed = store.delete_songs(&ids, artist_id)?;
            println!("Deleted {} songs", removed);
        }
        Command::Tag {
            artist,
            collaborator,
            titles,
        } => {
            let artist = store.artist_named(&artist)?;
            let artist_id = artist.id;
            let ids = songs_titled(artist, &titles);
            let edited =
                store.batch_edit_songs(&ids, artist_id, &SongUpdate::add_collaborator(collaborator))?;
            println!("Tagged {} songs", edited);
        }
        Command::Collaborators { artist } => {
            let artist_id = store.artist_named(&artist)?.id;
            for name in store.collaborators(artist_id)? {
                println!("{}", name);
            }
        }
        Command::Playlists { artist } => {
            let artist = store.artist_named(&artist)?;
            for playlist in &artist.playlists {
                let marker = if playlist.is_all_songs() { "*" } else { " " };
                println!("{} {}  ({} entries)", marker, playlist.name, playlist.len());
            }
        }
        Command::CreatePlaylist { artist, name } => {
            let artist_id = store.artist_named(&artist)?.id;
            store.create_playlist(&name, artist_id)?;
            println!("Created playlist {}", name);
        }
        Command::DeletePlaylist { artist, name } => {
            let artist = store.artist_named(&artist)?;
            let (artist_id, playlist_id) = (artist.id, playlist_named(artist, &name)?);
            store.delete_playlist(playlist_id, artist_id)?;
            println!("Deleted playlist {}", name);
        }
        Command::RenamePlaylist {
            artist,
            name,
            new_name,
        } => {
            let artist = store.artist_named(&artist)?;
            let (artist_id, playlist_id) = (artist.id, playlist_named(artist, &name)?);
            store.rename_playlist(playlist_id, &new_name, artist_id)?;
            println!("Renamed {} to {}", name, new_name);
        }
        Command::AddToPlaylist {
            artist,
            playlist,
            title,
        } => {
            let artist = store.artist_named(&artist)?;
            let artist_id = artist.id;
            let playlist_id = playlist_named(artist, &playlist)?;
            let song_id = song_titled(artist, &title)?;
            store.add_song_to_playlist(song_id, playlist_id, artist_id)?;
            println!("Added {} to {}", title, playlist);
        }
        Command::RemoveFromPlaylist {
            artist,
            playlist,
            title,
        } => {
            let artist = store.artist_named(&artist)?;
            let artist_id = artist.id;
            let playlist_id = playlist_named(artist, &playlist)?;
            let song_id = song_titled(artist, &title)?;
            if store.remove_song_from_playlist(song_id, playlist_id, artist_id)? {
                println!("Removed {} from {}", title, playlist);
            } else {
                println!("{} was not in {}", title, playlist);
            }
        }
        Command::Play {
            artist,
            playlist,
            seconds,
        } => {
            let settings = EngineSettings::from(&config.playback);
            play(store, settings, &artist, playlist.as_deref(), seconds).await?;
        }
    }
    Ok(())
}

fn songs_titled(artist: &Artist, titles: &[String]) -> Vec<SongId> {
    artist
        .songs
        .iter()
        .filter(|s| titles.contains(&s.title))
        .map(|s| s.id)
        .collect()
}

fn song_titled(artist: &Artist, title: &str) -> Result<SongId> {
    artist
        .songs
        .iter()
        .find(|s| s.title == title)
        .map(|s| s.id)
        .ok_or_else(|| anyhow!("{} has no song titled '{}'", artist.name, title))
}

fn playlist_named(artist: &Artist, name: &str) -> Result<PlaylistId> {
    artist
        .playlists
        .iter()
        .find(|p| p.name == name)
        .map(|p| p.id)
        .ok_or_else(|| anyhow!("{} has no playlist named '{}'", artist.name, name))
}

async fn play(
    store: &LibraryStore,
    settings: EngineSettings,
    artist: &str,
    playlist: Option<&str>,
    seconds: u64,
) -> Result<()> {
    let artist = store.artist_named(artist)?;
    let playlist_id = match playlist {
        Some(name) => playlist_named(artist, name)?,
        None => artist
            .all_songs()
            .map(|p| p.id)
            .ok_or_else(|| anyhow!("{} has no song list", artist.name))?,
    };
    let songs = store.playlist_songs(playlist_id, artist.id)?;
    if songs.is_empty() {
        println!("Nothing to play");
        return Ok(());
    }

    let period = settings.tick_interval;
    let engine = playback::shared(PlaybackEngine::new(NullDevice::new(), settings));
    engine.lock().await.enqueue(songs);
    let clock = playback::spawn_clock(engine.clone(), period);

    for _ in 0..seconds {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let snapshot = engine.lock().await.snapshot();
        let Some(song) = snapshot.current_song else {
            println!("Queue finished");
            break;
        };
        let icon = if snapshot.state == PlaybackState::Paused { "||" } else { ">" };
        println!(
            "{} {:>5.1}%  {:>6.0} deg  {}",
            icon,
            snapshot.progress * 100.0,
            snapshot.rotation,
            song.display_title()
        );
    }

    clock.cancel();
    engine.lock().await.stop();
    Ok(())
}
