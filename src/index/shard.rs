use std::collections::hash_map::Entry;
use std::collections::HashMap;

use parking_lot::RwLock;

use crate::config::{IndexerOptions, IndexKind};
use crate::index::bm25::bm25_contribution;
use crate::index::postings::PostingList;
use crate::index::proximity::optimal_token_spans;
use crate::models::{DocId, DocumentTerms, MatchedDocument};

/// Everything a shard owns, guarded by one lock so a lookup always sees a
/// consistent snapshot of postings and document lengths together.
#[derive(Default)]
struct ShardState {
    table: HashMap<String, PostingList>,
    doc_token_lengths: HashMap<DocId, f32>,
    /// Approximate count of distinct documents in this shard: a document
    /// re-indexed with entirely new keys is counted again, one re-indexed
    /// with any overlapping key is not
    num_documents: u64,
    total_token_length: f32,
}

/// One shard of the inverted index
pub struct ShardIndexer {
    options: IndexerOptions,
    state: RwLock<ShardState>,
}

impl ShardIndexer {
    pub fn new(options: IndexerOptions) -> Self {
        Self {
            options,
            state: RwLock::new(ShardState::default()),
        }
    }

    /// Merge a segmented document into the shard.
    ///
    /// Re-adding a doc id replaces the payload of every key it already
    /// sits under; posting entries are never removed.
    pub fn add_document(&self, document: &DocumentTerms) {
        let mut state = self.state.write();

        if document.token_length != 0.0 {
            let previous = state
                .doc_token_lengths
                .insert(document.doc_id, document.token_length);
            state.total_token_length += document.token_length - previous.unwrap_or(0.0);
        }

        let mut doc_id_is_new = true;
        for term in &document.terms {
            match state.table.entry(term.text.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(PostingList::seeded(self.options.kind, document.doc_id, term));
                }
                Entry::Occupied(mut slot) => {
                    if slot.get_mut().upsert(self.options.kind, document.doc_id, term) {
                        doc_id_is_new = false;
                    }
                }
            }
        }

        if doc_id_is_new {
            state.num_documents += 1;
        }
    }

    /// Documents containing every key in `tokens` and `labels` (AND
    /// semantics), optionally restricted to an inclusive doc-id range.
    ///
    /// Only the token keys participate in scoring; labels intersect but
    /// contribute neither BM25 nor proximity. Results come back in
    /// descending doc-id order.
    pub fn lookup(
        &self,
        tokens: &[String],
        labels: &[String],
        range: Option<(DocId, DocId)>,
    ) -> Vec<MatchedDocument> {
        let state = self.state.read();
        if state.num_documents == 0 {
            return Vec::new();
        }

        let keys: Vec<&str> = tokens
            .iter()
            .chain(labels.iter())
            .map(String::as_str)
            .collect();
        if keys.is_empty() {
            return Vec::new();
        }

        let mut table: Vec<&PostingList> = Vec::with_capacity(keys.len());
        for key in &keys {
            match state.table.get(*key) {
                Some(list) => table.push(list),
                // A key with no postings empties the whole intersection
                None => return Vec::new(),
            }
        }
        if table.iter().any(|list| list.is_empty()) {
            return Vec::new();
        }

        let avg_doc_length = state.total_token_length / state.num_documents as f32;
        let token_bytes: Vec<usize> = tokens.iter().map(String::len).collect();

        let mut cursors: Vec<usize> = table.iter().map(|list| list.len() - 1).collect();
        let mut docs = Vec::new();

        // Drive on the first key's list from the largest doc id downward;
        // the other cursors only ever move left, so each binary search is
        // bounded by the previous match position.
        let mut p0 = table[0].len();
        'driving: while p0 > 0 {
            p0 -= 1;
            cursors[0] = p0;
            let base = table[0].doc_id(p0);

            if let Some((lo, hi)) = range {
                if base < lo || base > hi {
                    continue;
                }
            }

            let mut matched = true;
            for i in 1..table.len() {
                let (pos, found) = table[i].search_upto(cursors[i] + 1, base);
                if found {
                    cursors[i] = pos;
                } else if pos == 0 {
                    // Every remaining id in this key's list exceeds every
                    // remaining driving candidate; nothing more can match
                    break 'driving;
                } else {
                    cursors[i] = pos - 1;
                    matched = false;
                    break;
                }
            }
            if !matched {
                continue;
            }

            let mut doc = MatchedDocument {
                doc_id: base,
                ..Default::default()
            };

            if self.options.kind == IndexKind::Locations && !tokens.is_empty() {
                let token_lists: Vec<&[usize]> = (0..tokens.len())
                    .map(|i| table[i].locations(cursors[i]))
                    .collect();

                // A token key holding an empty positions payload (a label
                // colliding with a token) cannot be proximity-scored;
                // emit the bare hit and stop the scan
                if token_lists.iter().any(|list| list.is_empty()) {
                    docs.push(MatchedDocument {
                        doc_id: base,
                        ..Default::default()
                    });
                    break 'driving;
                }

                if let Some((proximity, spans)) =
                    optimal_token_spans(&token_lists, &token_bytes)
                {
                    doc.token_proximity = proximity;
                    doc.token_snippet_locations = spans;
                }
                doc.token_locations = token_lists.iter().map(|list| list.to_vec()).collect();
            }

            if self.options.kind >= IndexKind::Frequencies {
                let doc_length = state.doc_token_lengths.get(&base).copied().unwrap_or(0.0);
                let mut score = 0.0;
                for i in 0..tokens.len() {
                    let frequency = match self.options.kind {
                        IndexKind::Locations => table[i].locations(cursors[i]).len() as f32,
                        _ => table[i].frequency(cursors[i]),
                    };
                    score += bm25_contribution(
                        self.options.bm25,
                        state.num_documents,
                        table[i].len(),
                        frequency,
                        doc_length,
                        avg_doc_length,
                    );
                }
                doc.bm25 = score;
            }

            docs.push(doc);
        }

        docs
    }

    /// Approximate distinct-document count, used by the flush invariants
    pub fn num_documents(&self) -> u64 {
        self.state.read().num_documents
    }
}
