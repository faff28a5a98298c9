use std::sync::atomic::{AtomicU64, Ordering};

/// Progress counters shared by every worker.
///
/// These are approximations meant only for the flush barrier: each one is
/// bumped independently, so a reader can observe `documents_indexed`
/// ahead of or behind the matching `indexing_requests` bump.
#[derive(Debug, Default)]
pub(crate) struct EngineStats {
    pub indexing_requests: AtomicU64,
    pub documents_indexed: AtomicU64,
    pub token_index_added: AtomicU64,
    pub documents_stored: AtomicU64,
}

impl EngineStats {
    /// True once every submitted document is indexed and, when storage is
    /// enabled, stored
    pub fn drained(&self, with_storage: bool) -> bool {
        let requests = self.indexing_requests.load(Ordering::SeqCst);
        if requests != self.documents_indexed.load(Ordering::SeqCst) {
            return false;
        }
        !with_storage || requests == self.documents_stored.load(Ordering::SeqCst)
    }
}
