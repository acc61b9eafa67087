// In-flight operation registry.

use std::sync::Mutex;

use crate::models::schema::ActiveOperation;

/// Registry of live operations across all tabs. An entry's existence alone
/// signals "this node is busy" to the UI. Entries are removed unconditionally
/// when the owning run settles, whether it succeeded, failed or was aborted.
#[derive(Default)]
pub struct ActiveOperations {
    inner: Mutex<Vec<ActiveOperation>>,
}

impl ActiveOperations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation, replacing any stale entry for the same node.
    pub fn register(&self, op: ActiveOperation) {
        let mut ops = self.inner.lock().expect("operation registry poisoned");
        ops.retain(|existing| existing.id != op.id);
        ops.push(op);
    }

    pub fn unregister(&self, node_id: &str) {
        let mut ops = self.inner.lock().expect("operation registry poisoned");
        ops.retain(|existing| existing.id != node_id);
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.inner
            .lock()
            .expect("operation registry poisoned")
            .iter()
            .any(|op| op.id == node_id)
    }

    pub fn snapshot(&self) -> Vec<ActiveOperation> {
        self.inner
            .lock()
            .expect("operation registry poisoned")
            .clone()
    }
}
