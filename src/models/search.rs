use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::document::DocId;
use crate::rank::RankOptions;

/// One document matched by a shard lookup, before ranking.
///
/// `bm25` is meaningful for the `Frequencies` and `Locations` index kinds;
/// the proximity fields only for `Locations`.
#[derive(Clone, Debug, Default)]
pub struct MatchedDocument {
    pub doc_id: DocId,

    /// Okapi BM25 over the query's token keys
    pub bm25: f32,

    /// Minimum summed gap between adjacent matched tokens, in bytes
    pub token_proximity: i32,

    /// The byte position chosen for each query token by the proximity
    /// optimizer, one entry per token, suitable for snippet extraction
    pub token_snippet_locations: Vec<usize>,

    /// All byte positions of each query token in the document
    pub token_locations: Vec<Vec<usize>>,
}

/// A scored, rankable search hit
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub doc_id: DocId,

    /// Score vector produced by the scoring criterion; compared
    /// lexicographically, see [`score_vec_cmp`]
    pub scores: Vec<f32>,

    pub token_snippet_locations: Vec<usize>,
    pub token_locations: Vec<Vec<usize>>,
}

/// A search query against the engine
pub struct SearchRequest<F = ()> {
    /// Free-text phrase; segmented when nonempty, taking priority over `tokens`
    pub text: String,

    /// Pre-tokenized search keys, used only when `text` is empty
    pub tokens: Vec<String>,

    /// Label keys; they intersect like tokens but never participate in scoring
    pub labels: Vec<String>,

    /// Either empty (no restriction) or exactly two elements `[lo, hi]`
    /// interpreted as an inclusive doc-id range. Any other length makes
    /// every shard answer empty.
    pub doc_ids: Vec<DocId>,

    /// Per-request override of the engine's default rank options
    pub rank_options: Option<RankOptions<F>>,

    /// Milliseconds; a value of zero or below never times out
    pub timeout_ms: i64,
}

impl<F> Default for SearchRequest<F> {
    fn default() -> Self {
        Self {
            text: String::new(),
            tokens: Vec::new(),
            labels: Vec::new(),
            doc_ids: Vec::new(),
            rank_options: None,
            timeout_ms: 0,
        }
    }
}

impl<F> SearchRequest<F> {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_doc_id_range(mut self, lo: DocId, hi: DocId) -> Self {
        self.doc_ids = vec![lo, hi];
        self
    }

    pub fn with_rank_options(mut self, options: RankOptions<F>) -> Self {
        self.rank_options = Some(options);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: i64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// The engine's answer to a [`SearchRequest`]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    /// The search keys actually used, after segmentation and stop-token removal
    pub tokens: Vec<String>,

    /// Matched documents, ranked
    pub docs: Vec<ScoredDocument>,

    /// True when the deadline fired before every shard answered; `docs`
    /// then holds whatever arrived in time
    pub timeout: bool,
}

/// Lexicographic comparison of score vectors: element-wise up to the
/// shorter length, and when that prefix ties, the longer vector wins.
/// `Greater` means `a` ranks higher.
pub fn score_vec_cmp(a: &[f32], b: &[f32]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.partial_cmp(y).unwrap_or(Ordering::Equal) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_vec_cmp_elementwise() {
        assert_eq!(score_vec_cmp(&[2.0], &[1.0]), Ordering::Greater);
        assert_eq!(score_vec_cmp(&[1.0, 5.0], &[1.0, 7.0]), Ordering::Less);
        assert_eq!(score_vec_cmp(&[1.0, 2.0], &[1.0, 2.0]), Ordering::Equal);
    }

    #[test]
    fn test_score_vec_cmp_longer_wins_on_tied_prefix() {
        assert_eq!(score_vec_cmp(&[1.0, 0.0], &[1.0]), Ordering::Greater);
        assert_eq!(score_vec_cmp(&[1.0], &[1.0, -3.0]), Ordering::Less);
    }

    #[test]
    fn test_score_vec_cmp_first_element_dominates() {
        // A huge second score never outweighs a smaller first score
        assert_eq!(
            score_vec_cmp(&[1.0, 1000.0], &[2.0, 0.0]),
            Ordering::Less
        );
    }

    #[test]
    fn test_request_builders() {
        let req = SearchRequest::<()>::from_tokens(["a", "b"])
            .with_labels(["news"])
            .with_doc_id_range(3, 7)
            .with_timeout_ms(50);
        assert_eq!(req.tokens, vec!["a", "b"]);
        assert_eq!(req.labels, vec!["news"]);
        assert_eq!(req.doc_ids, vec![3, 7]);
        assert_eq!(req.timeout_ms, 50);
        assert!(req.text.is_empty());
    }
}
