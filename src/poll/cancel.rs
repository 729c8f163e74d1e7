use std::sync::Arc;
use tokio::sync::watch;

/// Owner side of a cancellation flag. Cheap to clone; every clone cancels
/// the same loop.
#[derive(Debug, Clone)]
pub struct CancelSource {
    tx: Arc<watch::Sender<bool>>,
}

/// Listener side, handed to a poll loop or timer task.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal { rx: self.tx.subscribe() }
    }

    /// True when both handles cancel the same loop.
    pub fn same_as(&self, other: &CancelSource) -> bool {
        Arc::ptr_eq(&self.tx, &other.tx)
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. Also resolves when every source is gone,
    /// since nothing could cancel the loop afterwards.
    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|c| *c).await;
    }
}
