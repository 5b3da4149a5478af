// Change notification shared by the library store and the playback engine.
// Each component owns one notifier; any number of consumers subscribe to it.

use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CAPACITY: usize = 64;

/// Fan-out of state-change events to every current subscriber.
///
/// Publishing never fails: with no subscribers the event is dropped, and a
/// subscriber that falls more than `capacity` events behind sees
/// `RecvError::Lagged` and should re-read the component state.
#[derive(Debug, Clone)]
pub struct Notifier<E: Clone> {
    tx: broadcast::Sender<E>,
}

impl<E: Clone> Notifier<E> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: E) {
        if let Ok(count) = self.tx.send(event) {
            trace!("Published event to {} subscribers", count);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<E: Clone> Default for Notifier<E> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
