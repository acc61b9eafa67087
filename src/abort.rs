// Cooperative cancellation shared across one chain or sequence run.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::EngineError;

/// Clonable cancellation signal. One handle is created per run; the run loop
/// checks it at iteration boundaries and races it against in-flight calls.
#[derive(Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Signal cancellation. Idempotent.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `abort` has been called; immediately if it already was.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // All senders gone without an abort; never resolve.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Race `fut` against the abort signal. If the signal fires first the
/// in-flight future is dropped and `EngineError::Aborted` is returned; a
/// result that resolves before the abort is returned as-is.
pub async fn race_abort<T, Fut>(handle: &AbortHandle, fut: Fut) -> Result<T, EngineError>
where
    Fut: Future<Output = Result<T, EngineError>>,
{
    tokio::select! {
        _ = handle.cancelled() => Err(EngineError::Aborted),
        result = fut => result,
    }
}
