use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use super::device::PlaybackDevice;
use super::engine::PlaybackEngine;

/// Engine handle shared between the UI and the clock task.
pub type SharedEngine<D> = Arc<Mutex<PlaybackEngine<D>>>;

pub fn shared<D: PlaybackDevice>(engine: PlaybackEngine<D>) -> SharedEngine<D> {
    Arc::new(Mutex::new(engine))
}

/// Owns the background ticker; dropping it stops the clock.
#[derive(Debug)]
pub struct ClockHandle {
    task: JoinHandle<()>,
}

impl ClockHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for ClockHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Tick the engine every `period` on the current tokio runtime.
///
/// Each tick takes the engine lock, the same lock every transport command
/// takes, so once a pause has returned no later tick can move progress.
/// Ticks credit the time measured since the previous one, so a stalled or
/// skipped tick does not leave progress behind the wall clock.
pub fn spawn_clock<D>(engine: SharedEngine<D>, period: Duration) -> ClockHandle
where
    D: PlaybackDevice + Send + 'static,
{
    let period = period.max(Duration::from_millis(1));
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        interval.tick().await;
        let mut last = Instant::now();
        debug!("Playback clock running every {:?}", period);
        loop {
            interval.tick().await;
            let mut guard = engine.lock().await;
            let now = Instant::now();
            guard.tick(now.duration_since(last));
            last = now;
        }
    });
    ClockHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Song;
    use crate::playback::device::NullDevice;
    use crate::playback::engine::{EngineSettings, PlaybackState};

    fn shared_engine() -> SharedEngine<NullDevice> {
        shared(PlaybackEngine::new(NullDevice::new(), EngineSettings::default()))
    }

    fn one_second_song(title: &str) -> Song {
        Song::new(title).with_duration(Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_advances_progress_while_playing() {
        let engine = shared_engine();
        engine.lock().await.play_song(one_second_song("A"));
        let _clock = spawn_clock(engine.clone(), Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(525)).await;

        let progress = engine.lock().await.progress();
        assert!((progress - 0.5).abs() < 0.051, "progress was {}", progress);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_clock_credits_elapsed_time() {
        let engine = shared_engine();
        let long = Song::new("Long").with_duration(Duration::from_secs(100));
        engine.lock().await.play_song(long);
        let _clock = spawn_clock(engine.clone(), Duration::from_millis(50));
        tokio::task::yield_now().await;

        {
            let _held = engine.lock().await;
            tokio::time::advance(Duration::from_secs(2)).await;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Two seconds of a 100 s song, however many ticks were skipped.
        let progress = engine.lock().await.progress();
        assert!((progress - 0.02).abs() < 0.002, "progress was {}", progress);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_tick_lands_after_pause() {
        let engine = shared_engine();
        engine.lock().await.play_song(one_second_song("A"));
        let _clock = spawn_clock(engine.clone(), Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(225)).await;

        let (paused_progress, paused_rotation) = {
            let mut guard = engine.lock().await;
            guard.toggle();
            (guard.progress(), guard.rotation())
        };
        tokio::time::sleep(Duration::from_millis(500)).await;

        let guard = engine.lock().await;
        assert_eq!(guard.state(), PlaybackState::Paused);
        assert_eq!(guard.progress(), paused_progress);
        assert_eq!(guard.rotation(), paused_rotation);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_finishes_the_queue() {
        let engine = shared_engine();
        engine
            .lock()
            .await
            .enqueue(vec![one_second_song("A"), one_second_song("B")]);
        let _clock = spawn_clock(engine.clone(), Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(2_500)).await;

        let guard = engine.lock().await;
        assert_eq!(guard.state(), PlaybackState::Idle);
        assert!(guard.current_song().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_clock_stops_ticking() {
        let engine = shared_engine();
        engine.lock().await.play_song(one_second_song("A"));
        let clock = spawn_clock(engine.clone(), Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(125)).await;

        clock.cancel();
        tokio::task::yield_now().await;
        let before = engine.lock().await.progress();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(engine.lock().await.progress(), before);
        assert!(!clock.is_running());
    }
}
