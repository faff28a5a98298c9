use crate::config::Bm25Params;

/// BM25 contribution of a single term to a document's score.
///
/// Uses the smoothed base-2 IDF `log2(N / df + 1)` rather than the
/// probabilistic `log((N - df + 0.5) / (df + 0.5))` form, so scores stay
/// positive for terms that appear in most documents. Terms with no
/// postings, zero frequency in this document, or an index whose average
/// document length is still zero contribute nothing.
pub fn bm25_contribution(
    params: Bm25Params,
    num_documents: u64,
    doc_frequency: usize,
    term_frequency: f32,
    doc_length: f32,
    avg_doc_length: f32,
) -> f32 {
    if doc_frequency == 0 || term_frequency <= 0.0 || avg_doc_length == 0.0 {
        return 0.0;
    }
    let idf = (num_documents as f32 / doc_frequency as f32 + 1.0).log2();
    let Bm25Params { k1, b } = params;
    idf * term_frequency * (k1 + 1.0)
        / (term_frequency + k1 * (1.0 - b + b * doc_length / avg_doc_length))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_value_at_average_length() {
        // N=2, df=1, f=1, dl=avgdl: idf = log2(3), norm factor cancels,
        // contribution = log2(3) * 1 * 3 / (1 + 2) = log2(3)
        let got = bm25_contribution(Bm25Params::default(), 2, 1, 1.0, 4.0, 4.0);
        let want = 3.0f32.log2();
        assert!((got - want).abs() < 1e-6, "got {got}, want {want}");
    }

    #[test]
    fn test_rarer_term_scores_higher() {
        let params = Bm25Params::default();
        let rare = bm25_contribution(params, 1000, 10, 2.0, 50.0, 50.0);
        let common = bm25_contribution(params, 1000, 500, 2.0, 50.0, 50.0);
        assert!(rare > common);
    }

    #[test]
    fn test_higher_frequency_scores_higher() {
        let params = Bm25Params::default();
        let once = bm25_contribution(params, 1000, 10, 1.0, 50.0, 50.0);
        let thrice = bm25_contribution(params, 1000, 10, 3.0, 50.0, 50.0);
        assert!(thrice > once);
    }

    #[test]
    fn test_longer_document_is_penalized() {
        let params = Bm25Params::default();
        let short = bm25_contribution(params, 1000, 10, 2.0, 25.0, 50.0);
        let long = bm25_contribution(params, 1000, 10, 2.0, 100.0, 50.0);
        assert!(short > long);
    }

    #[test]
    fn test_guards_return_zero() {
        let params = Bm25Params::default();
        assert_eq!(bm25_contribution(params, 10, 0, 1.0, 5.0, 5.0), 0.0);
        assert_eq!(bm25_contribution(params, 10, 3, 0.0, 5.0, 5.0), 0.0);
        assert_eq!(bm25_contribution(params, 10, 3, 1.0, 5.0, 0.0), 0.0);
    }

    #[test]
    fn test_deterministic() {
        let params = Bm25Params::default();
        let a = bm25_contribution(params, 123, 7, 2.5, 31.0, 28.5);
        let b = bm25_contribution(params, 123, 7, 2.5, 31.0, 28.5);
        assert_eq!(a, b);
    }
}
