//! Word segmentation boundary and stop-token handling.
//!
//! The engine treats segmentation as an external concern: anything that
//! can split UTF-8 text into tokens with byte offsets plugs in through
//! the [`Segmenter`] trait. [`UnicodeSegmenter`] is the bundled
//! implementation, splitting on Unicode word boundaries.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use unicode_segmentation::UnicodeSegmentation;

use crate::Result;

/// One token produced by segmentation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    /// Byte offset of the token's first byte in the input text
    pub start: usize,
    /// UTF-8 token text
    pub text: String,
}

/// A word segmenter.
///
/// `search_mode` asks for the finer-grained segmentation some dictionary
/// segmenters produce for queries; the engine always passes `true`.
/// Implementations must be safe to call from many threads at once.
pub trait Segmenter: Send + Sync {
    fn cut(&self, text: &str, search_mode: bool) -> Vec<Segment>;
}

/// Segmenter over Unicode word boundaries (UAX #29), reporting byte offsets
#[derive(Clone, Copy, Debug, Default)]
pub struct UnicodeSegmenter;

impl Segmenter for UnicodeSegmenter {
    fn cut(&self, text: &str, _search_mode: bool) -> Vec<Segment> {
        text.unicode_word_indices()
            .map(|(start, word)| Segment {
                start,
                text: word.to_string(),
            })
            .collect()
    }
}

/// Stop tokens skipped during indexing and query segmentation
#[derive(Debug, Default)]
pub struct StopTokens {
    tokens: HashSet<String>,
}

impl StopTokens {
    /// Load stop tokens from a newline-separated file, one token per line.
    /// Blank lines are ignored.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);
        let mut tokens = HashSet::new();
        for line in reader.lines() {
            let line = line?;
            let token = line.trim_end_matches('\r');
            if !token.is_empty() {
                tokens.insert(token.to_string());
            }
        }
        Ok(Self { tokens })
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
