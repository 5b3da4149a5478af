use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::StorageError;
use super::model::Artist;
use super::storage::LibraryStorage;

/// Quiet period after a change before the library is written out.
pub const AUTOSAVE_DELAY: Duration = Duration::from_millis(250);

/// Background writer for `SaveMode::Immediate`.
///
/// Commands hand over a snapshot and return at once. Only the newest snapshot
/// is kept, so a burst of commands costs a single write.
pub(crate) struct Autosave {
    pending: watch::Sender<Arc<Vec<Artist>>>,
    task: JoinHandle<()>,
}

impl Autosave {
    /// Start the writer on the current tokio runtime.
    pub(crate) fn spawn(
        storage: Arc<dyn LibraryStorage>,
        delay: Duration,
    ) -> Result<Self, StorageError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            StorageError::Unavailable("background saving needs a tokio runtime".into())
        })?;
        let (pending, rx) = watch::channel(Arc::new(Vec::new()));
        let task = runtime.spawn(write_loop(storage, rx, delay));
        Ok(Self { pending, task })
    }

    pub(crate) fn schedule(&self, artists: Vec<Artist>) {
        self.pending.send_replace(Arc::new(artists));
    }

    /// Stop taking snapshots and wait until the last one is written.
    pub(crate) async fn finish(self) {
        let Self { pending, task } = self;
        drop(pending);
        if let Err(e) = task.await {
            warn!("Autosave writer ended abnormally: {}", e);
        }
    }
}

async fn write_loop(
    storage: Arc<dyn LibraryStorage>,
    mut rx: watch::Receiver<Arc<Vec<Artist>>>,
    delay: Duration,
) {
    // Err only once the store is gone and its last snapshot was taken.
    while rx.changed().await.is_ok() {
        tokio::time::sleep(delay).await;
        let artists = Arc::clone(&rx.borrow_and_update());
        let storage = Arc::clone(&storage);

        match tokio::task::spawn_blocking(move || storage.save(&artists)).await {
            Ok(Ok(())) => debug!("Autosaved library"),
            Ok(Err(e)) => warn!("Failed to save library in the background: {}", e),
            Err(e) => warn!("Background save task failed: {}", e),
        }
    }
    debug!("Autosave writer stopped");
}
