//! The engine: shard dispatch, worker lifecycle, ingest, search, and the
//! flush barrier.

pub mod hash;
mod stats;
mod workers;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, RecvTimeoutError, Sender};
use tracing::info;

use crate::config::EngineOptions;
use crate::index::ShardIndexer;
use crate::models::{DocId, DocumentPayload, FieldData, ScoredDocument, SearchRequest, SearchResponse};
use crate::rank::Ranker;
use crate::segment::StopTokens;
use crate::store::StoragePipeline;
use crate::Result;

use hash::doc_id_hash;
use stats::EngineStats;
use workers::{
    add_document_worker, add_fields_worker, lookup_worker, rank_worker, remove_fields_worker,
    segment_worker, store_write_worker, LookupJob, RankReply, RemoveFieldsJob, SegmentContext,
    SegmentJob, StoreJob,
};

/// An embeddable sharded full-text search engine.
///
/// Ingest is asynchronous: `index_document` returns before the document
/// is searchable, and [`Engine::flush_index`] is the barrier. Searching
/// is thread-safe and may run concurrently with ingest.
pub struct Engine<F: FieldData = ()> {
    options: EngineOptions<F>,
    stats: Arc<EngineStats>,
    stop_tokens: Arc<StopTokens>,

    segment_tx: Option<Sender<SegmentJob<F>>>,
    lookup_txs: Vec<Sender<LookupJob<F>>>,
    remove_fields_txs: Vec<Sender<RemoveFieldsJob>>,
    store_txs: Vec<Sender<StoreJob<F>>>,

    segment_workers: Vec<JoinHandle<()>>,
    index_workers: Vec<JoinHandle<()>>,
    lookup_workers: Vec<JoinHandle<()>>,
    rank_workers: Vec<JoinHandle<()>>,
    remove_workers: Vec<JoinHandle<()>>,
    store_workers: Vec<JoinHandle<()>>,

    closed: bool,
}

impl<F: FieldData> Engine<F> {
    /// Build the engine: spawn every worker pool and, when a storage
    /// pipeline is configured, recover previously stored documents into
    /// the index before accepting new work.
    pub fn new(options: EngineOptions<F>) -> Result<Self> {
        let options = options.normalized();
        let stop_tokens = Arc::new(match &options.stop_token_file {
            Some(path) => StopTokens::from_file(path)?,
            None => StopTokens::default(),
        });
        let stats = Arc::new(EngineStats::default());
        let num_shards = options.num_shards;

        let mut add_document_txs = Vec::with_capacity(num_shards);
        let mut add_fields_txs = Vec::with_capacity(num_shards);
        let mut lookup_txs = Vec::with_capacity(num_shards);
        let mut remove_fields_txs = Vec::with_capacity(num_shards);

        let mut index_workers = Vec::new();
        let mut lookup_workers = Vec::new();
        let mut rank_workers = Vec::new();
        let mut remove_workers = Vec::new();

        for shard in 0..num_shards {
            let indexer = Arc::new(ShardIndexer::new(options.indexer));
            let ranker: Arc<Ranker<F>> = Arc::new(Ranker::new());

            // One writer per shard serializes index mutations
            let (add_doc_tx, add_doc_rx) = bounded(options.indexer_buffer_length);
            add_document_txs.push(add_doc_tx);
            {
                let indexer = Arc::clone(&indexer);
                let stats = Arc::clone(&stats);
                index_workers.push(
                    thread::Builder::new()
                        .name(format!("fathom-index-{shard}"))
                        .spawn(move || add_document_worker(add_doc_rx, indexer, stats))?,
                );
            }

            let (add_fields_tx, add_fields_rx) = bounded(options.ranker_buffer_length);
            add_fields_txs.push(add_fields_tx);
            {
                let ranker = Arc::clone(&ranker);
                index_workers.push(
                    thread::Builder::new()
                        .name(format!("fathom-fields-{shard}"))
                        .spawn(move || add_fields_worker(add_fields_rx, ranker))?,
                );
            }

            let (remove_tx, remove_rx) = bounded(options.ranker_buffer_length);
            remove_fields_txs.push(remove_tx);
            {
                let ranker = Arc::clone(&ranker);
                remove_workers.push(
                    thread::Builder::new()
                        .name(format!("fathom-remove-{shard}"))
                        .spawn(move || remove_fields_worker(remove_rx, ranker))?,
                );
            }

            let (rank_tx, rank_rx) = bounded(options.ranker_buffer_length);
            for i in 0..options.num_ranker_threads_per_shard {
                let rank_rx = rank_rx.clone();
                let ranker = Arc::clone(&ranker);
                rank_workers.push(
                    thread::Builder::new()
                        .name(format!("fathom-rank-{shard}-{i}"))
                        .spawn(move || rank_worker(rank_rx, ranker))?,
                );
            }

            let (lookup_tx, lookup_rx) = bounded(options.indexer_buffer_length);
            lookup_txs.push(lookup_tx);
            for i in 0..options.num_indexer_threads_per_shard {
                let lookup_rx = lookup_rx.clone();
                let indexer = Arc::clone(&indexer);
                let rank_tx = rank_tx.clone();
                lookup_workers.push(
                    thread::Builder::new()
                        .name(format!("fathom-lookup-{shard}-{i}"))
                        .spawn(move || lookup_worker(lookup_rx, indexer, rank_tx))?,
                );
            }
            // The lookup workers now hold the only rank senders, so rank
            // workers exit exactly when the lookup pool does
        }

        let (segment_tx, segment_rx) = bounded(options.num_segmenter_threads);
        let context = Arc::new(SegmentContext {
            segmenter: Arc::clone(&options.segmenter),
            stop_tokens: Arc::clone(&stop_tokens),
            num_shards,
            add_document_txs,
            add_fields_txs,
        });
        let mut segment_workers = Vec::with_capacity(options.num_segmenter_threads);
        for i in 0..options.num_segmenter_threads {
            let segment_rx = segment_rx.clone();
            let context = Arc::clone(&context);
            segment_workers.push(
                thread::Builder::new()
                    .name(format!("fathom-segment-{i}"))
                    .spawn(move || segment_worker(segment_rx, context))?,
            );
        }

        let mut engine = Engine {
            options,
            stats,
            stop_tokens,
            segment_tx: Some(segment_tx),
            lookup_txs,
            remove_fields_txs,
            store_txs: Vec::new(),
            segment_workers,
            index_workers,
            lookup_workers,
            rank_workers,
            remove_workers,
            store_workers: Vec::new(),
            closed: false,
        };

        if let Some(pipeline) = engine.options.storage.clone() {
            if let Err(err) = engine.start_storage(&pipeline) {
                engine.shutdown();
                return Err(err);
            }
        }

        info!(
            num_shards,
            kind = ?engine.options.indexer.kind,
            storage = engine.options.storage.is_some(),
            "fathom engine started"
        );
        Ok(engine)
    }

    /// Open the pipeline, replay every stored document through the
    /// regular ingest path, then start the steady-state write workers.
    fn start_storage(&mut self, pipeline: &Arc<dyn StoragePipeline<F>>) -> Result<()> {
        pipeline.init()?;
        let storage_shards = pipeline.storage_shards();
        let segment_tx = match &self.segment_tx {
            Some(tx) => tx.clone(),
            None => return Ok(()),
        };

        let (done_tx, done_rx) = bounded::<Result<()>>(storage_shards);
        let mut recovery_workers = Vec::with_capacity(storage_shards);
        for shard in 0..storage_shards {
            let pipeline = Arc::clone(pipeline);
            let stats = Arc::clone(&self.stats);
            let segment_tx = segment_tx.clone();
            let done_tx = done_tx.clone();
            recovery_workers.push(
                thread::Builder::new()
                    .name(format!("fathom-recover-{shard}"))
                    .spawn(move || {
                        let result = pipeline.recover(shard, &mut |doc_id, payload| {
                            stats.indexing_requests.fetch_add(1, Ordering::SeqCst);
                            let _ = segment_tx.send(SegmentJob {
                                doc_id,
                                hash: doc_id_hash(doc_id),
                                payload,
                            });
                        });
                        let _ = done_tx.send(result);
                    })?,
            );
        }
        drop(done_tx);

        let mut first_err = None;
        for _ in 0..storage_shards {
            match done_rx.recv() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
                Err(_) => break,
            }
        }
        for worker in recovery_workers {
            let _ = worker.join();
        }
        if let Some(err) = first_err {
            return Err(err);
        }

        // Recovered documents must be indexed before runtime traffic
        while self.stats.indexing_requests.load(Ordering::SeqCst)
            != self.stats.documents_indexed.load(Ordering::SeqCst)
        {
            thread::yield_now();
        }

        // Release recovery-time handles before steady-state writes
        for shard in 0..storage_shards {
            pipeline.close_shard(shard)?;
            pipeline.conn(shard)?;
        }

        // Recovered documents are already on disk; credit them so a
        // flush right after startup returns immediately
        let recovered = self.stats.indexing_requests.load(Ordering::SeqCst);
        self.stats
            .documents_stored
            .fetch_add(recovered, Ordering::SeqCst);

        for shard in 0..storage_shards {
            let (store_tx, store_rx) = bounded(0);
            let pipeline = Arc::clone(pipeline);
            let stats = Arc::clone(&self.stats);
            self.store_workers.push(
                thread::Builder::new()
                    .name(format!("fathom-store-{shard}"))
                    .spawn(move || store_write_worker(store_rx, shard, pipeline, stats))?,
            );
            self.store_txs.push(store_tx);
        }

        info!(storage_shards, recovered, "storage recovery complete");
        Ok(())
    }

    /// Queue a document for indexing (and persistence, when enabled).
    ///
    /// Asynchronous: the document may not be searchable when this
    /// returns. Call [`Engine::flush_index`] to wait. Re-using a doc id
    /// re-indexes that document.
    pub fn index_document(&self, doc_id: DocId, payload: DocumentPayload<F>) {
        let hash = doc_id_hash(doc_id);
        if self.store_txs.is_empty() {
            self.submit(doc_id, hash, payload);
        } else {
            let store_shard = hash as usize % self.store_txs.len();
            let job = StoreJob {
                doc_id,
                payload: payload.clone(),
            };
            self.submit(doc_id, hash, payload);
            let _ = self.store_txs[store_shard].send(job);
        }
    }

    fn submit(&self, doc_id: DocId, hash: u32, payload: DocumentPayload<F>) {
        self.stats.indexing_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(tx) = &self.segment_tx {
            let _ = tx.send(SegmentJob {
                doc_id,
                hash,
                payload,
            });
        }
    }

    /// Drop a document's scoring fields and its persisted record.
    ///
    /// Posting lists are untouched: the document keeps matching queries,
    /// and criteria that require fields are how it disappears from
    /// results.
    pub fn remove_document(&self, doc_id: DocId) {
        for tx in &self.remove_fields_txs {
            let _ = tx.send(RemoveFieldsJob { doc_id });
        }
        if let Some(pipeline) = &self.options.storage {
            let shard = doc_id_hash(doc_id) as usize % pipeline.storage_shards();
            let key = crate::store::varint::encode_u64(doc_id);
            if let Err(err) = pipeline.delete(shard, &key) {
                tracing::warn!(doc_id, shard, %err, "failed to delete stored document");
            }
        }
    }

    /// Block until every previously submitted document is indexed and,
    /// when storage is enabled, stored
    pub fn flush_index(&self) {
        let with_storage = !self.store_txs.is_empty();
        while !self.stats.drained(with_storage) {
            thread::yield_now();
        }
    }

    /// Run a query across every shard and merge the ranked results.
    ///
    /// Thread-safe. With a positive `timeout_ms`, shards that miss the
    /// deadline are abandoned and the response carries `timeout = true`
    /// together with whatever arrived in time.
    pub fn search(&self, request: &SearchRequest<F>) -> SearchResponse {
        let rank_options = request
            .rank_options
            .clone()
            .unwrap_or_else(|| self.options.default_rank_options.clone());

        let mut tokens = Vec::new();
        if !request.text.is_empty() {
            for segment in self.options.segmenter.cut(&request.text, true) {
                if !self.stop_tokens.contains(&segment.text) {
                    tokens.push(segment.text);
                }
            }
        } else {
            tokens.extend(request.tokens.iter().cloned());
        }

        let num_shards = self.options.num_shards;
        let (reply_tx, reply_rx) = bounded::<RankReply>(num_shards);
        for tx in &self.lookup_txs {
            let _ = tx.send(LookupJob {
                tokens: tokens.clone(),
                labels: request.labels.clone(),
                doc_ids: request.doc_ids.clone(),
                options: rank_options.clone(),
                reply: reply_tx.clone(),
            });
        }
        drop(reply_tx);

        let mut merged: Vec<ScoredDocument> = Vec::new();
        let mut timed_out = false;
        if request.timeout_ms <= 0 {
            for _ in 0..num_shards {
                match reply_rx.recv() {
                    Ok(reply) => merged.extend(reply.docs),
                    Err(_) => break,
                }
            }
        } else {
            let deadline = Instant::now() + Duration::from_millis(request.timeout_ms as u64);
            for _ in 0..num_shards {
                match reply_rx.recv_deadline(deadline) {
                    Ok(reply) => merged.extend(reply.docs),
                    Err(RecvTimeoutError::Timeout) => {
                        timed_out = true;
                        break;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        }

        if rank_options.reverse_order {
            merged.sort_by(|a, b| crate::models::score_vec_cmp(&a.scores, &b.scores));
        } else {
            merged.sort_by(|a, b| crate::models::score_vec_cmp(&b.scores, &a.scores));
        }

        let start = rank_options.output_offset.min(merged.len());
        let end = if rank_options.max_outputs == 0 {
            merged.len()
        } else {
            (start + rank_options.max_outputs).min(merged.len())
        };
        merged.drain(..start);
        merged.truncate(end - start);

        SearchResponse {
            tokens,
            docs: merged,
            timeout: timed_out,
        }
    }

    /// Total posting entries added across all shards
    pub fn num_token_index_added(&self) -> u64 {
        self.stats.token_index_added.load(Ordering::SeqCst)
    }

    /// Total documents merged into the index
    pub fn num_documents_indexed(&self) -> u64 {
        self.stats.documents_indexed.load(Ordering::SeqCst)
    }

    /// Flush, stop every worker, and close the storage shards
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.flush_index();

        // Dropping senders in dependency order lets each pool drain and
        // exit before the pool it feeds loses its senders
        self.segment_tx = None;
        for worker in self.segment_workers.drain(..) {
            let _ = worker.join();
        }
        for worker in self.index_workers.drain(..) {
            let _ = worker.join();
        }

        self.lookup_txs.clear();
        for worker in self.lookup_workers.drain(..) {
            let _ = worker.join();
        }
        for worker in self.rank_workers.drain(..) {
            let _ = worker.join();
        }

        self.remove_fields_txs.clear();
        for worker in self.remove_workers.drain(..) {
            let _ = worker.join();
        }

        self.store_txs.clear();
        for worker in self.store_workers.drain(..) {
            let _ = worker.join();
        }
        if let Some(pipeline) = &self.options.storage {
            for shard in 0..pipeline.storage_shards() {
                if let Err(err) = pipeline.close_shard(shard) {
                    tracing::warn!(shard, %err, "failed to close storage shard");
                }
            }
        }
    }
}

impl<F: FieldData> Drop for Engine<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
