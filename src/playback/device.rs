use anyhow::Result;
use tracing::debug;

use crate::library::AudioSource;

/// Identifies one start of one song.
///
/// Every `start` hands the device a fresh token. Completion reports carry it
/// back so a report that arrives after the engine has moved on is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayToken(pub(crate) u64);

/// The audio output the engine drives.
///
/// Buffering and decoding stay behind this trait. A device reports the end of
/// a song by having its owner call `PlaybackEngine::on_playback_finished`
/// with the token it was started with.
pub trait PlaybackDevice {
    fn start(&mut self, source: &AudioSource, token: PlayToken) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn resume(&mut self) -> Result<()>;
    /// Jump to a fraction of the current song, already clamped to [0, 1].
    fn seek(&mut self, fraction: f64) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
}

/// Silent device: accepts every command and only logs it.
#[derive(Debug, Default)]
pub struct NullDevice {
    active: Option<(AudioSource, PlayToken)>,
}

impl NullDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlaybackDevice for NullDevice {
    fn start(&mut self, source: &AudioSource, token: PlayToken) -> Result<()> {
        debug!("Null device starting {} ({:?})", source, token);
        self.active = Some((source.clone(), token));
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        debug!("Null device paused");
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        debug!("Null device resumed");
        Ok(())
    }

    fn seek(&mut self, fraction: f64) -> Result<()> {
        debug!("Null device seek to {:.3}", fraction);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some((source, token)) = self.active.take() {
            debug!("Null device stopped {} ({:?})", source, token);
        }
        Ok(())
    }
}
