//! Worker loops behind the engine's bounded queues.
//!
//! Every loop runs on its own thread and exits when the sending side of
//! its queue disconnects, which is how the engine tears itself down:
//! senders are dropped in dependency order and each pool is joined before
//! the next set of senders goes away.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender};
use tracing::warn;

use crate::engine::stats::EngineStats;
use crate::index::ShardIndexer;
use crate::models::{DocId, DocumentPayload, DocumentTerms, FieldData, MatchedDocument, ScoredDocument, TermEntry};
use crate::rank::{RankOptions, Ranker};
use crate::segment::{Segmenter, StopTokens};
use crate::store::{varint, StoragePipeline};

pub(crate) struct SegmentJob<F> {
    pub doc_id: DocId,
    pub hash: u32,
    pub payload: DocumentPayload<F>,
}

pub(crate) struct AddDocumentJob {
    pub document: DocumentTerms,
}

pub(crate) struct LookupJob<F> {
    pub tokens: Vec<String>,
    pub labels: Vec<String>,
    pub doc_ids: Vec<DocId>,
    pub options: RankOptions<F>,
    pub reply: Sender<RankReply>,
}

pub(crate) struct AddFieldsJob<F> {
    pub doc_id: DocId,
    pub fields: Option<F>,
}

pub(crate) struct RemoveFieldsJob {
    pub doc_id: DocId,
}

pub(crate) struct RankJob<F> {
    pub docs: Vec<MatchedDocument>,
    pub options: RankOptions<F>,
    pub reply: Sender<RankReply>,
}

#[derive(Default)]
pub(crate) struct RankReply {
    pub docs: Vec<ScoredDocument>,
}

pub(crate) struct StoreJob<F> {
    pub doc_id: DocId,
    pub payload: DocumentPayload<F>,
}

/// Shared context of the segmenter pool
pub(crate) struct SegmentContext<F> {
    pub segmenter: Arc<dyn Segmenter>,
    pub stop_tokens: Arc<StopTokens>,
    pub num_shards: usize,
    pub add_document_txs: Vec<Sender<AddDocumentJob>>,
    pub add_fields_txs: Vec<Sender<AddFieldsJob<F>>>,
}

/// Segment one document's content (or adopt its caller-supplied tokens),
/// strip stop tokens, fold in labels, and hand the result to the target
/// shard's indexer and ranker queues.
pub(crate) fn segment_worker<F: FieldData>(rx: Receiver<SegmentJob<F>>, ctx: Arc<SegmentContext<F>>) {
    while let Ok(job) = rx.recv() {
        let shard = job.hash as usize % ctx.num_shards;
        let payload = job.payload;

        let mut positions_by_token: HashMap<String, Vec<usize>> = HashMap::new();
        let num_tokens;
        if !payload.content.is_empty() {
            let segments = ctx.segmenter.cut(&payload.content, true);
            num_tokens = segments.len();
            for segment in segments {
                if !ctx.stop_tokens.contains(&segment.text) {
                    positions_by_token
                        .entry(segment.text)
                        .or_default()
                        .push(segment.start);
                }
            }
        } else {
            num_tokens = payload.tokens.len();
            for token in payload.tokens {
                if !ctx.stop_tokens.contains(&token.text) {
                    positions_by_token.insert(token.text, token.locations);
                }
            }
        }

        // Labels overwrite colliding tokens with an empty payload; they
        // are search keys, never scorable body text
        for label in payload.labels {
            if !ctx.stop_tokens.contains(&label) {
                positions_by_token.insert(label, Vec::new());
            }
        }

        let terms: Vec<TermEntry> = positions_by_token
            .into_iter()
            .map(|(text, starts)| TermEntry {
                frequency: starts.len() as f32,
                text,
                starts,
            })
            .collect();

        let document = DocumentTerms {
            doc_id: job.doc_id,
            token_length: num_tokens as f32,
            terms,
        };
        let _ = ctx.add_document_txs[shard].send(AddDocumentJob { document });
        let _ = ctx.add_fields_txs[shard].send(AddFieldsJob {
            doc_id: job.doc_id,
            fields: payload.fields,
        });
    }
}

/// The single writer of one shard's inverted index
pub(crate) fn add_document_worker(
    rx: Receiver<AddDocumentJob>,
    indexer: Arc<ShardIndexer>,
    stats: Arc<EngineStats>,
) {
    while let Ok(job) = rx.recv() {
        indexer.add_document(&job.document);
        stats
            .token_index_added
            .fetch_add(job.document.terms.len() as u64, Ordering::SeqCst);
        stats.documents_indexed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Run one shard's share of a query and either answer directly (no hits)
/// or forward to the shard's rank queue
pub(crate) fn lookup_worker<F: FieldData>(
    rx: Receiver<LookupJob<F>>,
    indexer: Arc<ShardIndexer>,
    rank_tx: Sender<RankJob<F>>,
) {
    while let Ok(job) = rx.recv() {
        let range = match job.doc_ids.len() {
            0 => None,
            2 => Some((job.doc_ids[0], job.doc_ids[1])),
            n => {
                warn!(len = n, "doc_ids restriction must be empty or [lo, hi]; skipping lookup");
                let _ = job.reply.send(RankReply::default());
                continue;
            }
        };

        let docs = indexer.lookup(&job.tokens, &job.labels, range);
        if docs.is_empty() {
            let _ = job.reply.send(RankReply::default());
            continue;
        }

        let _ = rank_tx.send(RankJob {
            docs,
            options: job.options,
            reply: job.reply,
        });
    }
}

pub(crate) fn add_fields_worker<F: FieldData>(rx: Receiver<AddFieldsJob<F>>, ranker: Arc<Ranker<F>>) {
    while let Ok(job) = rx.recv() {
        ranker.add_scoring_fields(job.doc_id, job.fields);
    }
}

pub(crate) fn remove_fields_worker<F: FieldData>(
    rx: Receiver<RemoveFieldsJob>,
    ranker: Arc<Ranker<F>>,
) {
    while let Ok(job) = rx.recv() {
        ranker.remove_scoring_fields(job.doc_id);
    }
}

/// Rank one shard's hits. The shard keeps `offset + max` results so the
/// caller's global pagination still has enough candidates after merging.
pub(crate) fn rank_worker<F: FieldData>(rx: Receiver<RankJob<F>>, ranker: Arc<Ranker<F>>) {
    while let Ok(mut job) = rx.recv() {
        if job.options.max_outputs != 0 {
            job.options.max_outputs += job.options.output_offset;
        }
        job.options.output_offset = 0;
        let docs = ranker.rank(job.docs, &job.options);
        let _ = job.reply.send(RankReply { docs });
    }
}

/// Persist raw document payloads for one storage shard. A payload that
/// fails to serialize is dropped, but the stored counter is still bumped
/// so the flush barrier can complete.
pub(crate) fn store_write_worker<F: FieldData>(
    rx: Receiver<StoreJob<F>>,
    shard: usize,
    pipeline: Arc<dyn StoragePipeline<F>>,
    stats: Arc<EngineStats>,
) {
    while let Ok(job) = rx.recv() {
        let key = varint::encode_u64(job.doc_id);
        match bincode::serialize(&job.payload) {
            Ok(value) => {
                if let Err(err) = pipeline.set(shard, &key, &value) {
                    warn!(doc_id = job.doc_id, shard, %err, "failed to persist document");
                }
            }
            Err(err) => {
                warn!(doc_id = job.doc_id, shard, %err, "failed to encode document");
            }
        }
        stats.documents_stored.fetch_add(1, Ordering::SeqCst);
    }
}
