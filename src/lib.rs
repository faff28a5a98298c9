//! fathom is an embeddable, sharded full-text search engine.
//!
//! Documents are indexed under caller-supplied numeric ids and queried
//! by free-text phrase or pre-tokenized keywords, optionally restricted
//! by labels or a doc-id range. Results are ranked with Okapi BM25 and,
//! when the `Locations` index kind is enabled, by how close together the
//! matched keywords sit in each document.
//!
//! ```no_run
//! use std::sync::Arc;
//! use fathom::{DocumentPayload, Engine, EngineOptions, SearchRequest, UnicodeSegmenter};
//!
//! let engine: Engine = Engine::new(EngineOptions::new(Arc::new(UnicodeSegmenter)))?;
//! engine.index_document(1, DocumentPayload::from_content("the quick brown fox"));
//! engine.flush_index();
//!
//! let response = engine.search(&SearchRequest::from_text("quick fox"));
//! for doc in &response.docs {
//!     println!("{} scored {:?}", doc.doc_id, doc.scores);
//! }
//! engine.close();
//! # Ok::<(), fathom::FathomError>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod models;
pub mod rank;
pub mod segment;
pub mod store;

pub use config::{Bm25Params, EngineOptions, IndexKind, IndexerOptions};
pub use engine::Engine;
pub use error::{FathomError, Result};
pub use models::{
    DocId, DocumentPayload, FieldData, MatchedDocument, ScoredDocument, SearchRequest,
    SearchResponse, TokenData,
};
pub use rank::{RankByBm25, RankOptions, Ranker, ScoringCriteria};
pub use segment::{Segment, Segmenter, StopTokens, UnicodeSegmenter};
pub use store::{KvPipeline, StoragePipeline};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
