//! Stop notification for the reconcile loop.

use tokio::sync::broadcast;

/// Fan-out stop signal.
///
/// The signal handler triggers it once; the reconcile loop selects on its
/// receiver so a pass in flight finishes before the process exits.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Ask every subscriber to stop. Sending with nobody listening is fine.
    pub fn trigger(&self) {
        if self.tx.send(()).is_err() {
            tracing::debug!("Stop requested with no running tasks");
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
