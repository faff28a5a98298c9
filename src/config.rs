use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::rank::RankOptions;
use crate::segment::Segmenter;
use crate::store::StoragePipeline;

/// Default number of index/ranker shards
pub const DEFAULT_NUM_SHARDS: usize = 2;

/// Payload kept in every posting list, fixed at engine construction.
///
/// `Locations` is required for token-proximity data; `Frequencies` is
/// enough for BM25; `DocIdsOnly` supports bare boolean retrieval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndexKind {
    DocIdsOnly,
    Frequencies,
    Locations,
}

impl Default for IndexKind {
    fn default() -> Self {
        IndexKind::Frequencies
    }
}

/// Okapi BM25 parameters, see <http://en.wikipedia.org/wiki/Okapi_BM25>
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 2.0, b: 0.75 }
    }
}

/// Per-shard indexer configuration
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct IndexerOptions {
    pub kind: IndexKind,
    pub bm25: Bm25Params,
}

/// Engine construction options.
///
/// Thread and buffer knobs left at zero are replaced by host-derived
/// defaults when the engine is built.
pub struct EngineOptions<F = ()> {
    /// Word segmenter used for document content and query text
    pub segmenter: Arc<dyn Segmenter>,

    /// Newline-separated stop-token file; `None` means no stop list
    pub stop_token_file: Option<PathBuf>,

    /// Segmenter worker count (0 = cpu count)
    pub num_segmenter_threads: usize,

    /// Index/ranker shard count (0 = [`DEFAULT_NUM_SHARDS`])
    pub num_shards: usize,

    /// Capacity of each shard's add-document and lookup queues (0 = cpu count)
    pub indexer_buffer_length: usize,

    /// Lookup workers per shard (0 = cpu count)
    pub num_indexer_threads_per_shard: usize,

    /// Capacity of each shard's ranker queues (0 = cpu count)
    pub ranker_buffer_length: usize,

    /// Rank workers per shard (0 = cpu count)
    pub num_ranker_threads_per_shard: usize,

    pub indexer: IndexerOptions,

    /// Rank options applied when a request does not carry its own
    pub default_rank_options: RankOptions<F>,

    /// Persistence pipeline; `None` disables storage and recovery
    pub storage: Option<Arc<dyn StoragePipeline<F>>>,
}

impl<F> Clone for EngineOptions<F> {
    fn clone(&self) -> Self {
        Self {
            segmenter: Arc::clone(&self.segmenter),
            stop_token_file: self.stop_token_file.clone(),
            num_segmenter_threads: self.num_segmenter_threads,
            num_shards: self.num_shards,
            indexer_buffer_length: self.indexer_buffer_length,
            num_indexer_threads_per_shard: self.num_indexer_threads_per_shard,
            ranker_buffer_length: self.ranker_buffer_length,
            num_ranker_threads_per_shard: self.num_ranker_threads_per_shard,
            indexer: self.indexer,
            default_rank_options: self.default_rank_options.clone(),
            storage: self.storage.clone(),
        }
    }
}

impl<F: 'static> EngineOptions<F> {
    pub fn new(segmenter: Arc<dyn Segmenter>) -> Self {
        Self {
            segmenter,
            stop_token_file: None,
            num_segmenter_threads: 0,
            num_shards: 0,
            indexer_buffer_length: 0,
            num_indexer_threads_per_shard: 0,
            ranker_buffer_length: 0,
            num_ranker_threads_per_shard: 0,
            indexer: IndexerOptions::default(),
            default_rank_options: RankOptions::default(),
            storage: None,
        }
    }

    pub fn with_stop_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stop_token_file = Some(path.into());
        self
    }

    pub fn with_num_shards(mut self, num_shards: usize) -> Self {
        self.num_shards = num_shards;
        self
    }

    pub fn with_indexer(mut self, indexer: IndexerOptions) -> Self {
        self.indexer = indexer;
        self
    }

    pub fn with_index_kind(mut self, kind: IndexKind) -> Self {
        self.indexer.kind = kind;
        self
    }

    pub fn with_default_rank_options(mut self, options: RankOptions<F>) -> Self {
        self.default_rank_options = options;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn StoragePipeline<F>>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Replace zero-valued knobs with their defaults
    pub(crate) fn normalized(mut self) -> Self {
        let cpus = num_cpus::get().max(1);
        if self.num_segmenter_threads == 0 {
            self.num_segmenter_threads = cpus;
        }
        if self.num_shards == 0 {
            self.num_shards = DEFAULT_NUM_SHARDS;
        }
        if self.indexer_buffer_length == 0 {
            self.indexer_buffer_length = cpus;
        }
        if self.num_indexer_threads_per_shard == 0 {
            self.num_indexer_threads_per_shard = cpus;
        }
        if self.ranker_buffer_length == 0 {
            self.ranker_buffer_length = cpus;
        }
        if self.num_ranker_threads_per_shard == 0 {
            self.num_ranker_threads_per_shard = cpus;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::UnicodeSegmenter;

    #[test]
    fn test_index_kind_ordering() {
        assert!(IndexKind::DocIdsOnly < IndexKind::Frequencies);
        assert!(IndexKind::Frequencies < IndexKind::Locations);
        assert_eq!(IndexKind::default(), IndexKind::Frequencies);
    }

    #[test]
    fn test_bm25_defaults() {
        let params = Bm25Params::default();
        assert_eq!(params.k1, 2.0);
        assert_eq!(params.b, 0.75);
    }

    #[test]
    fn test_normalized_fills_zeros() {
        let options = EngineOptions::<()>::new(Arc::new(UnicodeSegmenter)).normalized();
        assert_eq!(options.num_shards, DEFAULT_NUM_SHARDS);
        assert!(options.num_segmenter_threads > 0);
        assert!(options.indexer_buffer_length > 0);
        assert!(options.num_indexer_threads_per_shard > 0);
        assert!(options.ranker_buffer_length > 0);
        assert!(options.num_ranker_threads_per_shard > 0);
    }

    #[test]
    fn test_explicit_knobs_survive_normalization() {
        let options = EngineOptions::<()>::new(Arc::new(UnicodeSegmenter))
            .with_num_shards(5)
            .with_index_kind(IndexKind::Locations)
            .normalized();
        assert_eq!(options.num_shards, 5);
        assert_eq!(options.indexer.kind, IndexKind::Locations);
    }
}
