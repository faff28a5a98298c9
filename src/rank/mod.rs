//! Scoring criteria and the per-shard ranker.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::models::{score_vec_cmp, DocId, MatchedDocument, ScoredDocument};

/// A scoring rule over matched documents.
///
/// `fields` is the value registered for the document via
/// `index_document`, absent when none was ever registered or the
/// document was removed. Returning an empty vector drops the document
/// from the result set, which is how removed documents are suppressed:
/// posting entries outlive removal, scoring fields do not.
pub trait ScoringCriteria<F>: Send + Sync {
    fn score(&self, doc: &MatchedDocument, fields: Option<&F>) -> Vec<f32>;
}

/// The default criterion: a document's score is its BM25
#[derive(Clone, Copy, Debug, Default)]
pub struct RankByBm25;

impl<F> ScoringCriteria<F> for RankByBm25 {
    fn score(&self, doc: &MatchedDocument, _fields: Option<&F>) -> Vec<f32> {
        vec![doc.bm25]
    }
}

/// How to score, order, and paginate one query's results
pub struct RankOptions<F = ()> {
    pub criteria: Arc<dyn ScoringCriteria<F>>,

    /// Sort ascending instead of the default descending
    pub reverse_order: bool,

    /// Results before this rank are dropped
    pub output_offset: usize,

    /// Result cap after the offset; 0 means unlimited
    pub max_outputs: usize,
}

impl<F> Clone for RankOptions<F> {
    fn clone(&self) -> Self {
        Self {
            criteria: Arc::clone(&self.criteria),
            reverse_order: self.reverse_order,
            output_offset: self.output_offset,
            max_outputs: self.max_outputs,
        }
    }
}

impl<F: 'static> Default for RankOptions<F> {
    fn default() -> Self {
        Self {
            criteria: Arc::new(RankByBm25),
            reverse_order: false,
            output_offset: 0,
            max_outputs: 0,
        }
    }
}

impl<F: 'static> RankOptions<F> {
    pub fn with_criteria(criteria: Arc<dyn ScoringCriteria<F>>) -> Self {
        Self {
            criteria,
            ..Default::default()
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reverse_order = true;
        self
    }

    pub fn with_output_offset(mut self, offset: usize) -> Self {
        self.output_offset = offset;
        self
    }

    pub fn with_max_outputs(mut self, max: usize) -> Self {
        self.max_outputs = max;
        self
    }
}

/// One shard's ranker: the scoring-fields side-table plus the rank step
pub struct Ranker<F> {
    fields: RwLock<HashMap<DocId, F>>,
}

impl<F> Default for Ranker<F> {
    fn default() -> Self {
        Self {
            fields: RwLock::new(HashMap::new()),
        }
    }
}

impl<F> Ranker<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or clear, with `None`) a document's scoring fields
    pub fn add_scoring_fields(&self, doc_id: DocId, fields: Option<F>) {
        let mut table = self.fields.write();
        match fields {
            Some(fields) => {
                table.insert(doc_id, fields);
            }
            None => {
                table.remove(&doc_id);
            }
        }
    }

    /// Forget a document's scoring fields; unknown ids are a no-op
    pub fn remove_scoring_fields(&self, doc_id: DocId) {
        self.fields.write().remove(&doc_id);
    }

    /// Score, order, and paginate matched documents
    pub fn rank(
        &self,
        docs: Vec<MatchedDocument>,
        options: &RankOptions<F>,
    ) -> Vec<ScoredDocument> {
        let mut output = Vec::with_capacity(docs.len());
        {
            let fields = self.fields.read();
            for doc in docs {
                let scores = options.criteria.score(&doc, fields.get(&doc.doc_id));
                if scores.is_empty() {
                    continue;
                }
                output.push(ScoredDocument {
                    doc_id: doc.doc_id,
                    scores,
                    token_snippet_locations: doc.token_snippet_locations,
                    token_locations: doc.token_locations,
                });
            }
        }

        if options.reverse_order {
            output.sort_by(|a, b| score_vec_cmp(&a.scores, &b.scores));
        } else {
            output.sort_by(|a, b| score_vec_cmp(&b.scores, &a.scores));
        }

        let start = options.output_offset.min(output.len());
        let end = if options.max_outputs == 0 {
            output.len()
        } else {
            (start + options.max_outputs).min(output.len())
        };
        output.drain(..start);
        output.truncate(end - start);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched(doc_id: DocId, bm25: f32) -> MatchedDocument {
        MatchedDocument {
            doc_id,
            bm25,
            ..Default::default()
        }
    }

    #[test]
    fn test_rank_by_bm25_descending() {
        let ranker: Ranker<()> = Ranker::new();
        let docs = vec![matched(1, 0.5), matched(2, 2.0), matched(3, 1.0)];
        let ranked = ranker.rank(docs, &RankOptions::default());
        let ids: Vec<DocId> = ranked.iter().map(|d| d.doc_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_reverse_order() {
        let ranker: Ranker<()> = Ranker::new();
        let docs = vec![matched(1, 0.5), matched(2, 2.0)];
        let options = RankOptions::default().reversed();
        let ranked = ranker.rank(docs, &options);
        let ids: Vec<DocId> = ranked.iter().map(|d| d.doc_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_pagination() {
        let ranker: Ranker<()> = Ranker::new();
        let docs: Vec<MatchedDocument> =
            (1..=5).map(|i| matched(i, i as f32)).collect();

        let page = ranker.rank(
            docs.clone(),
            &RankOptions::default().with_output_offset(1).with_max_outputs(2),
        );
        let ids: Vec<DocId> = page.iter().map(|d| d.doc_id).collect();
        assert_eq!(ids, vec![4, 3]);

        // max_outputs == 0 means everything from the offset on
        let rest = ranker.rank(docs.clone(), &RankOptions::default().with_output_offset(3));
        assert_eq!(rest.len(), 2);

        // Offset past the end yields nothing
        let none = ranker.rank(docs, &RankOptions::default().with_output_offset(99));
        assert!(none.is_empty());
    }

    #[test]
    fn test_empty_scores_drop_document() {
        struct RequireFields;
        impl ScoringCriteria<u32> for RequireFields {
            fn score(&self, doc: &MatchedDocument, fields: Option<&u32>) -> Vec<f32> {
                match fields {
                    Some(weight) => vec![doc.bm25 * *weight as f32],
                    None => Vec::new(),
                }
            }
        }

        let ranker: Ranker<u32> = Ranker::new();
        ranker.add_scoring_fields(1, Some(3));
        let options = RankOptions::<u32>::with_criteria(Arc::new(RequireFields));
        let ranked = ranker.rank(vec![matched(1, 1.0), matched(2, 5.0)], &options);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].doc_id, 1);
        assert_eq!(ranked[0].scores, vec![3.0]);
    }

    #[test]
    fn test_remove_scoring_fields() {
        let ranker: Ranker<u32> = Ranker::new();
        ranker.add_scoring_fields(1, Some(9));
        ranker.remove_scoring_fields(1);
        ranker.remove_scoring_fields(42); // unknown id: no-op

        struct SeesFields;
        impl ScoringCriteria<u32> for SeesFields {
            fn score(&self, _doc: &MatchedDocument, fields: Option<&u32>) -> Vec<f32> {
                vec![if fields.is_some() { 1.0 } else { 0.0 }]
            }
        }
        let options = RankOptions::<u32>::with_criteria(Arc::new(SeesFields));
        let ranked = ranker.rank(vec![matched(1, 1.0)], &options);
        assert_eq!(ranked[0].scores, vec![0.0]);
    }

    #[test]
    fn test_multi_score_tie_break() {
        struct TwoScores;
        impl ScoringCriteria<()> for TwoScores {
            fn score(&self, doc: &MatchedDocument, _fields: Option<&()>) -> Vec<f32> {
                vec![1.0, -(doc.token_proximity as f32)]
            }
        }

        let mut near = matched(1, 1.0);
        near.token_proximity = 1;
        let mut far = matched(2, 1.0);
        far.token_proximity = 9;

        let ranker: Ranker<()> = Ranker::new();
        let options = RankOptions::<()>::with_criteria(Arc::new(TwoScores));
        let ranked = ranker.rank(vec![far, near], &options);
        let ids: Vec<DocId> = ranked.iter().map(|d| d.doc_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
