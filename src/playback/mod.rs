// Playback engine - transport state machine, play queue and progress clock
// Reads song copies handed to it by the UI, never the library itself

pub mod clock;  // background ticker driving progress + rotation
pub mod device; // opaque audio output the engine commands
pub mod engine; // idle / playing / paused state machine
pub mod queue;  // song copies + cursor

pub use clock::{shared, spawn_clock, ClockHandle, SharedEngine};
pub use device::{NullDevice, PlayToken, PlaybackDevice};
pub use engine::{EngineSettings, PlaybackEngine, PlaybackSnapshot, PlaybackState, PlayerEvent};
pub use queue::{PlayQueue, RepeatMode};
