use std::time::Duration;
use tracing::{debug, info, warn};

use super::device::{PlayToken, PlaybackDevice};
use super::queue::{PlayQueue, RepeatMode};
use crate::config::PlaybackConfig;
use crate::events::Notifier;
use crate::library::Song;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    SongStarted(Song),
    Paused,
    Resumed,
    Seeked(f64),
    PositionChanged { progress: f64, rotation: f64 },
    QueueFinished,
    Stopped,
}

/// Read-only view of the engine for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub current_song: Option<Song>,
    pub is_playing: bool,
    pub progress: f64,
    pub rotation: f64,
    pub position: Option<usize>,
    pub queue_len: usize,
    pub repeat: RepeatMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub tick_interval: Duration,
    /// Length assumed for songs that carry no duration.
    pub fallback_song_length: Duration,
    pub rotation_degrees_per_second: f64,
    pub repeat: RepeatMode,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(50),
            fallback_song_length: Duration::from_secs(180),
            rotation_degrees_per_second: 90.0,
            repeat: RepeatMode::Off,
        }
    }
}

impl From<&PlaybackConfig> for EngineSettings {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            tick_interval: Duration::from_millis(config.tick_interval_ms.max(1)),
            fallback_song_length: Duration::from_secs(config.fallback_song_secs.max(1)),
            rotation_degrees_per_second: config.rotation_degrees_per_second,
            repeat: config.repeat,
        }
    }
}

/// Transport state machine over a queue of song copies.
///
/// Commands never fail. Anything called in a state where it has no meaning
/// (toggling while idle, skipping an empty queue) is a no-op, and device
/// errors are logged rather than returned.
pub struct PlaybackEngine<D: PlaybackDevice> {
    device: D,
    queue: PlayQueue,
    state: PlaybackState,
    progress: f64,
    rotation: f64,
    settings: EngineSettings,
    starts: u64,
    token: Option<PlayToken>,
    notifier: Notifier<PlayerEvent>,
}

impl<D: PlaybackDevice> PlaybackEngine<D> {
    pub fn new(device: D, settings: EngineSettings) -> Self {
        Self {
            device,
            queue: PlayQueue::new(),
            state: PlaybackState::Idle,
            progress: 0.0,
            rotation: 0.0,
            settings,
            starts: 0,
            token: None,
            notifier: Notifier::default(),
        }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PlayerEvent> {
        self.notifier.subscribe()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn current_song(&self) -> Option<&Song> {
        self.queue.current()
    }

    /// Token of the current song start, the one a completion report must carry.
    pub fn play_token(&self) -> Option<PlayToken> {
        self.token
    }

    pub fn queue(&self) -> &PlayQueue {
        &self.queue
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn repeat(&self) -> RepeatMode {
        self.settings.repeat
    }

    pub fn set_repeat(&mut self, repeat: RepeatMode) {
        debug!("Repeat mode {:?} -> {:?}", self.settings.repeat, repeat);
        self.settings.repeat = repeat;
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state: self.state,
            current_song: self.queue.current().cloned(),
            is_playing: self.is_playing(),
            progress: self.progress,
            rotation: self.rotation,
            position: self.queue.position(),
            queue_len: self.queue.len(),
            repeat: self.settings.repeat,
        }
    }

    // -------- transport commands --------

    /// Replace the queue and start playing its first song.
    ///
    /// An empty list ends playback the way running off the queue does, so
    /// rotation is kept.
    pub fn enqueue(&mut self, songs: Vec<Song>) {
        info!("Queued {} songs", songs.len());
        if self.queue.replace(songs).is_some() {
            self.start_current();
        } else if self.state != PlaybackState::Idle {
            self.finish_queue();
        }
    }

    /// Play one song immediately, dropping whatever was queued.
    pub fn play_song(&mut self, song: Song) {
        self.enqueue(vec![song]);
    }

    pub fn toggle(&mut self) {
        match self.state {
            PlaybackState::Playing => {
                self.drive("pause", |device| device.pause());
                self.state = PlaybackState::Paused;
                info!("Paused at {:.1}%", self.progress * 100.0);
                self.notifier.publish(PlayerEvent::Paused);
            }
            PlaybackState::Paused => {
                self.drive("resume", |device| device.resume());
                self.state = PlaybackState::Playing;
                info!("Resumed at {:.1}%", self.progress * 100.0);
                self.notifier.publish(PlayerEvent::Resumed);
            }
            PlaybackState::Idle => debug!("Toggle ignored while idle"),
        }
    }

    /// Skip forward; past the end of a non-repeating queue the engine goes idle.
    pub fn next(&mut self) {
        if self.state == PlaybackState::Idle {
            debug!("Next ignored while idle");
            return;
        }
        self.advance();
    }

    /// Skip back one song, or restart the current one at the head of the queue.
    pub fn previous(&mut self) {
        if self.state == PlaybackState::Idle {
            debug!("Previous ignored while idle");
            return;
        }
        if self.queue.retreat().is_some() {
            self.start_current();
        }
    }

    /// Jump to a fraction of the current song. Out-of-range values are clamped.
    pub fn seek_to_percentage(&mut self, fraction: f64) {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        self.progress = fraction;
        if self.state != PlaybackState::Idle {
            self.drive("seek", |device| device.seek(fraction));
        }
        debug!("Seeked to {:.3}", fraction);
        self.notifier.publish(PlayerEvent::Seeked(fraction));
    }

    /// Clear the queue and reset progress and rotation.
    pub fn stop(&mut self) {
        let was_active = self.state != PlaybackState::Idle;
        self.queue.clear();
        self.state = PlaybackState::Idle;
        self.token = None;
        self.progress = 0.0;
        self.rotation = 0.0;
        if was_active {
            self.drive("stop", |device| device.stop());
            info!("Playback stopped");
        }
        self.notifier.publish(PlayerEvent::Stopped);
    }

    // -------- clock + device signals --------

    /// Advance progress and rotation by one clock period.
    ///
    /// Only acts while playing. Reaching the end of the song advances the
    /// queue exactly as a completion signal from the device would.
    pub fn tick(&mut self, elapsed: Duration) {
        if self.state != PlaybackState::Playing {
            return;
        }
        let Some(song) = self.queue.current() else {
            return;
        };

        let length = song
            .duration
            .filter(|d| !d.is_zero())
            .unwrap_or(self.settings.fallback_song_length)
            .as_secs_f64()
            .max(f64::EPSILON);
        let seconds = elapsed.as_secs_f64();

        self.progress = (self.progress + seconds / length).min(1.0);
        self.rotation += self.settings.rotation_degrees_per_second * seconds;
        self.notifier.publish(PlayerEvent::PositionChanged {
            progress: self.progress,
            rotation: self.rotation,
        });

        if self.progress >= 1.0 {
            self.complete_current();
        }
    }

    /// The device finished the song it was started with `token`.
    ///
    /// A report for an earlier start is ignored, e.g. when the clock already
    /// moved past that song.
    pub fn on_playback_finished(&mut self, token: PlayToken) {
        if self.token != Some(token) {
            debug!("Ignoring completion for {:?}, current start is {:?}", token, self.token);
            return;
        }
        if self.state != PlaybackState::Playing {
            return;
        }
        self.complete_current();
    }

    // -------- internals --------

    fn complete_current(&mut self) {
        if self.settings.repeat == RepeatMode::One {
            debug!("Repeating current song");
            self.start_current();
        } else {
            self.advance();
        }
    }

    fn advance(&mut self) {
        let wrap = self.settings.repeat != RepeatMode::Off;
        if self.queue.advance(wrap).is_some() {
            self.start_current();
        } else {
            self.finish_queue();
        }
    }

    fn start_current(&mut self) {
        let Some(song) = self.queue.current().cloned() else {
            self.finish_queue();
            return;
        };

        self.starts += 1;
        let token = PlayToken(self.starts);
        self.token = Some(token);
        self.progress = 0.0;
        self.state = PlaybackState::Playing;
        match &song.audio_source {
            Some(source) => self.drive("start", |device| device.start(source, token)),
            None => {
                debug!("'{}' has no audio source; progress follows the clock only", song.title);
                self.drive("stop", |device| device.stop());
            }
        }

        info!(
            "Playing '{}' ({} of {})",
            song.display_title(),
            self.queue.position().map(|p| p + 1).unwrap_or(0),
            self.queue.len()
        );
        self.notifier.publish(PlayerEvent::SongStarted(song));
    }

    /// Ran off the end of the queue. Rotation is left where it stopped.
    fn finish_queue(&mut self) {
        self.queue.clear();
        self.state = PlaybackState::Idle;
        self.token = None;
        self.progress = 0.0;
        self.drive("stop", |device| device.stop());
        info!("Queue finished");
        self.notifier.publish(PlayerEvent::QueueFinished);
    }

    fn drive(&mut self, action: &str, command: impl FnOnce(&mut D) -> anyhow::Result<()>) {
        if let Err(e) = command(&mut self.device) {
            warn!("Playback device failed to {}: {}", action, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{AudioSource, LibraryStore};

    #[derive(Debug, Default)]
    struct RecordingDevice {
        calls: Vec<String>,
        broken: bool,
    }

    impl RecordingDevice {
        fn record(&mut self, call: String) -> anyhow::Result<()> {
            self.calls.push(call);
            if self.broken {
                anyhow::bail!("device unplugged");
            }
            Ok(())
        }
    }

    impl PlaybackDevice for RecordingDevice {
        fn start(&mut self, source: &AudioSource, _token: PlayToken) -> anyhow::Result<()> {
            self.record(format!("start {}", source))
        }

        fn pause(&mut self) -> anyhow::Result<()> {
            self.record("pause".into())
        }

        fn resume(&mut self) -> anyhow::Result<()> {
            self.record("resume".into())
        }

        fn seek(&mut self, fraction: f64) -> anyhow::Result<()> {
            self.record(format!("seek {:.2}", fraction))
        }

        fn stop(&mut self) -> anyhow::Result<()> {
            self.record("stop".into())
        }
    }

    fn song(title: &str) -> Song {
        Song::new(title)
            .with_audio_source(AudioSource::new(format!("{}.mp3", title)))
            .with_duration(Duration::from_secs(10))
    }

    fn engine() -> PlaybackEngine<RecordingDevice> {
        PlaybackEngine::new(RecordingDevice::default(), EngineSettings::default())
    }

    fn current_title<D: PlaybackDevice>(engine: &PlaybackEngine<D>) -> Option<String> {
        engine.current_song().map(|s| s.title.clone())
    }

    #[test]
    fn test_next_runs_off_the_end_into_idle() {
        let mut engine = engine();
        engine.enqueue(vec![song("A"), song("B"), song("C")]);
        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(current_title(&engine).as_deref(), Some("A"));

        engine.next();
        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(current_title(&engine).as_deref(), Some("B"));

        engine.next();
        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(current_title(&engine).as_deref(), Some("C"));

        engine.next();
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(engine.current_song().is_none());

        engine.next();
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(engine.progress(), 0.0);
    }

    #[test]
    fn test_seek_is_clamped() {
        let mut engine = engine();
        engine.seek_to_percentage(1.5);
        assert_eq!(engine.progress(), 1.0);
        engine.seek_to_percentage(-0.25);
        assert_eq!(engine.progress(), 0.0);
        engine.seek_to_percentage(f64::NAN);
        assert_eq!(engine.progress(), 0.0);
        assert_eq!(engine.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_seek_keeps_play_pause_state() {
        let mut engine = engine();
        engine.enqueue(vec![song("A")]);
        engine.toggle();
        engine.seek_to_percentage(0.4);

        assert_eq!(engine.state(), PlaybackState::Paused);
        assert_eq!(engine.progress(), 0.4);
        assert_eq!(engine.device().calls.last().map(String::as_str), Some("seek 0.40"));
    }

    #[test]
    fn test_idle_commands_are_no_ops() {
        let mut engine = engine();
        engine.toggle();
        engine.next();
        engine.previous();
        engine.tick(Duration::from_secs(1));

        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(engine.progress(), 0.0);
        assert_eq!(engine.rotation(), 0.0);
        assert!(engine.device().calls.is_empty());
    }

    #[test]
    fn test_toggle_retains_progress() {
        let mut engine = engine();
        engine.enqueue(vec![song("A")]);
        engine.tick(Duration::from_secs(3));
        engine.toggle();
        let paused_at = engine.progress();

        engine.tick(Duration::from_secs(3));
        assert_eq!(engine.state(), PlaybackState::Paused);
        assert_eq!(engine.progress(), paused_at);

        engine.toggle();
        assert!(engine.is_playing());
        assert_eq!(engine.progress(), paused_at);
        assert_eq!(engine.device().calls, vec!["start A.mp3", "pause", "resume"]);
    }

    #[test]
    fn test_previous_at_start_restarts_current() {
        let mut engine = engine();
        engine.enqueue(vec![song("A"), song("B")]);
        engine.tick(Duration::from_secs(5));

        engine.previous();
        assert_eq!(current_title(&engine).as_deref(), Some("A"));
        assert_eq!(engine.progress(), 0.0);
        assert_eq!(engine.device().calls, vec!["start A.mp3", "start A.mp3"]);

        engine.next();
        engine.toggle();
        engine.previous();
        assert_eq!(current_title(&engine).as_deref(), Some("A"));
        assert_eq!(engine.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_play_song_replaces_queue() {
        let mut engine = engine();
        engine.enqueue(vec![song("A"), song("B")]);
        engine.toggle();

        engine.play_song(song("Z"));

        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(engine.queue().len(), 1);
        assert_eq!(engine.queue().position(), Some(0));
        engine.next();
        assert_eq!(engine.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_enqueue_nothing_goes_idle() {
        let mut engine = engine();
        engine.enqueue(vec![song("A")]);
        engine.enqueue(Vec::new());
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(engine.device().calls.last().map(String::as_str), Some("stop"));
    }

    #[test]
    fn test_enqueue_nothing_keeps_rotation() {
        let mut engine = engine();
        engine.enqueue(vec![song("A")]);
        engine.tick(Duration::from_secs(2));
        assert!((engine.rotation() - 180.0).abs() < 1e-9);

        engine.enqueue(Vec::new());
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(engine.progress(), 0.0);
        assert!((engine.rotation() - 180.0).abs() < 1e-9);

        // Already idle: nothing to tell the device.
        let calls = engine.device().calls.len();
        engine.enqueue(Vec::new());
        assert_eq!(engine.device().calls.len(), calls);
    }

    #[test]
    fn test_clock_advances_through_queue() {
        let mut engine = engine();
        engine.enqueue(vec![song("A"), song("B")]);

        engine.tick(Duration::from_secs(4));
        assert!((engine.progress() - 0.4).abs() < 1e-9);

        engine.tick(Duration::from_secs(7));
        assert_eq!(current_title(&engine).as_deref(), Some("B"));
        assert_eq!(engine.progress(), 0.0);

        engine.tick(Duration::from_secs(10));
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(engine.current_song().is_none());
    }

    #[test]
    fn test_seek_to_end_finishes_on_next_tick() {
        let mut engine = engine();
        engine.enqueue(vec![song("A"), song("B")]);
        engine.seek_to_percentage(1.0);
        engine.tick(Duration::from_millis(50));
        assert_eq!(current_title(&engine).as_deref(), Some("B"));
    }

    #[test]
    fn test_fallback_length_for_songs_without_duration() {
        let settings = EngineSettings {
            fallback_song_length: Duration::from_secs(100),
            ..EngineSettings::default()
        };
        let mut engine = PlaybackEngine::new(RecordingDevice::default(), settings);
        engine.play_song(Song::new("Untimed"));
        engine.tick(Duration::from_secs(25));

        assert!((engine.progress() - 0.25).abs() < 1e-9);
        // No audio source: only the clock drives it.
        assert_eq!(engine.device().calls, vec!["stop"]);
    }

    #[test]
    fn test_repeat_all_wraps_and_repeat_one_restarts() {
        let mut engine = engine();
        engine.set_repeat(RepeatMode::All);
        engine.enqueue(vec![song("A"), song("B")]);
        engine.next();
        engine.next();
        assert_eq!(current_title(&engine).as_deref(), Some("A"));

        engine.set_repeat(RepeatMode::One);
        engine.tick(Duration::from_secs(10));
        assert_eq!(current_title(&engine).as_deref(), Some("A"));
        assert!(engine.is_playing());

        engine.next();
        assert_eq!(current_title(&engine).as_deref(), Some("B"));
    }

    fn finish_current<D: PlaybackDevice>(engine: &mut PlaybackEngine<D>) {
        if let Some(token) = engine.play_token() {
            engine.on_playback_finished(token);
        }
    }

    #[test]
    fn test_device_completion_advances() {
        let mut engine = engine();
        engine.enqueue(vec![song("A"), song("B")]);
        finish_current(&mut engine);
        assert_eq!(current_title(&engine).as_deref(), Some("B"));

        engine.toggle();
        finish_current(&mut engine);
        assert_eq!(current_title(&engine).as_deref(), Some("B"));

        engine.toggle();
        finish_current(&mut engine);
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(engine.play_token().is_none());
    }

    #[test]
    fn test_late_completion_does_not_skip_a_song() {
        let mut engine = engine();
        engine.enqueue(vec![song("A"), song("B"), song("C")]);
        let a = engine.play_token().unwrap();

        // The clock reaches the end of A before the device reports it.
        engine.tick(Duration::from_secs(10));
        assert_eq!(current_title(&engine).as_deref(), Some("B"));

        engine.on_playback_finished(a);
        assert_eq!(current_title(&engine).as_deref(), Some("B"));
        assert_eq!(engine.progress(), 0.0);
    }

    #[test]
    fn test_completion_for_restarted_song_is_stale() {
        let mut engine = engine();
        engine.set_repeat(RepeatMode::One);
        engine.enqueue(vec![song("A"), song("A")]);
        let first = engine.play_token().unwrap();

        engine.tick(Duration::from_secs(10));
        let second = engine.play_token().unwrap();
        assert_ne!(first, second);

        engine.tick(Duration::from_secs(4));
        engine.on_playback_finished(first);
        assert_eq!(engine.queue().position(), Some(0));
        assert!((engine.progress() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_rotation_accumulates_only_while_playing() {
        let mut engine = engine();
        engine.enqueue(vec![song("A"), song("B")]);
        engine.tick(Duration::from_secs(2));
        assert!((engine.rotation() - 180.0).abs() < 1e-9);

        engine.toggle();
        engine.tick(Duration::from_secs(2));
        assert!((engine.rotation() - 180.0).abs() < 1e-9);

        engine.toggle();
        engine.next();
        engine.tick(Duration::from_secs(1));
        assert!((engine.rotation() - 270.0).abs() < 1e-9);

        // Running off the end freezes the record instead of resetting it.
        engine.next();
        assert!((engine.rotation() - 270.0).abs() < 1e-9);

        engine.stop();
        assert_eq!(engine.rotation(), 0.0);
    }

    #[test]
    fn test_device_failures_do_not_break_transport() {
        let device = RecordingDevice {
            broken: true,
            ..RecordingDevice::default()
        };
        let mut engine = PlaybackEngine::new(device, EngineSettings::default());
        engine.enqueue(vec![song("A"), song("B")]);
        engine.toggle();
        engine.toggle();
        engine.next();

        assert!(engine.is_playing());
        assert_eq!(current_title(&engine).as_deref(), Some("B"));
    }

    #[test]
    fn test_queue_survives_library_deletion() {
        let mut store = LibraryStore::new();
        let artist = store.create_artist("A").unwrap();
        let s1 = store.add_song(artist, song("S1")).unwrap();
        store.add_song(artist, song("S2")).unwrap();
        let all = store.artist(artist).unwrap().all_songs().unwrap().id;

        let mut engine = engine();
        engine.enqueue(store.playlist_songs(all, artist).unwrap());
        store.delete_songs(&[s1], artist).unwrap();

        assert_eq!(engine.current_song().map(|s| s.id), Some(s1));
        engine.tick(Duration::from_secs(10));
        assert_eq!(current_title(&engine).as_deref(), Some("S2"));
    }

    #[test]
    fn test_transitions_are_published() {
        let mut engine = engine();
        let mut rx = engine.subscribe();

        engine.play_song(song("A"));
        engine.toggle();
        engine.next();

        assert!(matches!(rx.try_recv().unwrap(), PlayerEvent::SongStarted(s) if s.title == "A"));
        assert_eq!(rx.try_recv().unwrap(), PlayerEvent::Paused);
        assert_eq!(rx.try_recv().unwrap(), PlayerEvent::QueueFinished);
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut engine = engine();
        engine.enqueue(vec![song("A"), song("B")]);
        engine.next();
        let snapshot = engine.snapshot();

        assert_eq!(snapshot.state, PlaybackState::Playing);
        assert!(snapshot.is_playing);
        assert_eq!(snapshot.position, Some(1));
        assert_eq!(snapshot.queue_len, 2);
        assert_eq!(snapshot.current_song.map(|s| s.title), Some("B".to_string()));
    }
}
