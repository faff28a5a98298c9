pub mod document;
pub mod search;

pub use document::{DocId, DocumentPayload, DocumentTerms, FieldData, TermEntry, TokenData};
pub use search::{score_vec_cmp, MatchedDocument, ScoredDocument, SearchRequest, SearchResponse};
