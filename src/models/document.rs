use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Unique document identifier, supplied by the caller
pub type DocId = u64;

/// Bound alias for caller-supplied scoring fields.
///
/// The engine never inspects the fields; they travel from `index_document`
/// through the ranker side-table into scoring criteria, and round-trip
/// through persistent storage when that is enabled.
pub trait FieldData:
    Clone + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

impl<T> FieldData for T where T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}

/// One caller-supplied token, for callers that run their own segmentation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenData {
    /// UTF-8 token text
    pub text: String,
    /// Byte offsets of the token's first byte within the document, ascending
    pub locations: Vec<usize>,
}

impl TokenData {
    pub fn new(text: impl Into<String>, locations: Vec<usize>) -> Self {
        Self {
            text: text.into(),
            locations,
        }
    }
}

/// Everything the caller hands over for one document.
///
/// When `content` is nonempty it is segmented by the engine and `tokens`
/// is ignored; otherwise `tokens` is taken as-is. Labels are search keys
/// that never occur in the body text (a category, a channel, ...) and
/// carry no positional payload. This struct is also the record persisted
/// by the storage pipeline, which is why it is fully serializable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentPayload<F = ()> {
    pub content: String,
    pub tokens: Vec<TokenData>,
    pub labels: Vec<String>,
    pub fields: Option<F>,
}

impl<F> Default for DocumentPayload<F> {
    fn default() -> Self {
        Self {
            content: String::new(),
            tokens: Vec::new(),
            labels: Vec::new(),
            fields: None,
        }
    }
}

impl<F> DocumentPayload<F> {
    /// Payload whose keywords come from segmenting `content`
    pub fn from_content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Payload whose keywords are supplied pre-tokenized
    pub fn from_tokens(tokens: Vec<TokenData>) -> Self {
        Self {
            tokens,
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

    pub fn with_fields(mut self, fields: F) -> Self {
        self.fields = Some(fields);
        self
    }
}

/// One (search key, document) pair produced by segmentation
#[derive(Clone, Debug)]
pub struct TermEntry {
    /// UTF-8 text of the search key
    pub text: String,
    /// Term frequency; 0 for labels, which carry no positions
    pub frequency: f32,
    /// Byte offsets of the key within the document, ascending
    pub starts: Vec<usize>,
}

/// A segmented document ready for the shard indexer
#[derive(Clone, Debug)]
pub struct DocumentTerms {
    pub doc_id: DocId,
    /// Token count of the document body, used for BM25 length normalization
    pub token_length: f32,
    pub terms: Vec<TermEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_builders() {
        let payload: DocumentPayload = DocumentPayload::from_content("hello world")
            .with_labels(["news", "tech"]);
        assert_eq!(payload.content, "hello world");
        assert_eq!(payload.labels, vec!["news", "tech"]);
        assert!(payload.tokens.is_empty());
        assert!(payload.fields.is_none());
    }

    #[test]
    fn test_payload_with_fields() {
        let payload = DocumentPayload::<u32>::from_content("x").with_fields(7);
        assert_eq!(payload.fields, Some(7));
    }

    #[test]
    fn test_payload_roundtrip() {
        let payload = DocumentPayload::<i64>::from_tokens(vec![TokenData::new("abc", vec![0, 9])])
            .with_labels(["label"])
            .with_fields(-3);
        let bytes = bincode::serialize(&payload).unwrap();
        let back: DocumentPayload<i64> = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.tokens[0].text, "abc");
        assert_eq!(back.tokens[0].locations, vec![0, 9]);
        assert_eq!(back.labels, vec!["label"]);
        assert_eq!(back.fields, Some(-3));
    }
}
