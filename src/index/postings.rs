use crate::config::IndexKind;
use crate::models::{DocId, TermEntry};

/// Posting list for one search key: the documents containing it, sorted
/// ascending by doc id, plus the per-document payload the index kind asks
/// for. The three vectors are parallel; `frequencies` is populated only
/// under `IndexKind::Frequencies` and `locations` only under
/// `IndexKind::Locations`.
#[derive(Clone, Debug, Default)]
pub struct PostingList {
    doc_ids: Vec<DocId>,
    frequencies: Vec<f32>,
    locations: Vec<Vec<usize>>,
}

impl PostingList {
    /// List seeded with a single posting, for a key seen for the first time
    pub fn seeded(kind: IndexKind, doc_id: DocId, entry: &TermEntry) -> Self {
        let mut list = PostingList::default();
        list.push_payload(kind, entry);
        list.doc_ids.push(doc_id);
        list
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    pub fn doc_id(&self, i: usize) -> DocId {
        self.doc_ids[i]
    }

    pub fn frequency(&self, i: usize) -> f32 {
        self.frequencies[i]
    }

    pub fn locations(&self, i: usize) -> &[usize] {
        &self.locations[i]
    }

    /// Binary search for `doc_id` among the first `end` postings.
    /// Returns the position when found, or the insertion index keeping
    /// the list sorted when not.
    pub fn search_upto(&self, end: usize, doc_id: DocId) -> (usize, bool) {
        match self.doc_ids[..end].binary_search(&doc_id) {
            Ok(pos) => (pos, true),
            Err(pos) => (pos, false),
        }
    }

    /// Insert a posting or replace the payload of an existing one.
    /// Returns true when `doc_id` was already present.
    pub fn upsert(&mut self, kind: IndexKind, doc_id: DocId, entry: &TermEntry) -> bool {
        match self.doc_ids.binary_search(&doc_id) {
            Ok(pos) => {
                match kind {
                    IndexKind::Locations => self.locations[pos] = entry.starts.clone(),
                    IndexKind::Frequencies => self.frequencies[pos] = entry.frequency,
                    IndexKind::DocIdsOnly => {}
                }
                true
            }
            Err(pos) => {
                self.doc_ids.insert(pos, doc_id);
                match kind {
                    IndexKind::Locations => self.locations.insert(pos, entry.starts.clone()),
                    IndexKind::Frequencies => self.frequencies.insert(pos, entry.frequency),
                    IndexKind::DocIdsOnly => {}
                }
                false
            }
        }
    }

    fn push_payload(&mut self, kind: IndexKind, entry: &TermEntry) {
        match kind {
            IndexKind::Locations => self.locations.push(entry.starts.clone()),
            IndexKind::Frequencies => self.frequencies.push(entry.frequency),
            IndexKind::DocIdsOnly => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(frequency: f32, starts: Vec<usize>) -> TermEntry {
        TermEntry {
            text: "t".to_string(),
            frequency,
            starts,
        }
    }

    fn assert_sorted(list: &PostingList) {
        for i in 1..list.len() {
            assert!(list.doc_id(i - 1) < list.doc_id(i));
        }
    }

    #[test]
    fn test_upsert_keeps_doc_ids_sorted() {
        let mut list = PostingList::seeded(IndexKind::Frequencies, 10, &entry(1.0, vec![]));
        for doc_id in [5u64, 30, 1, 20, 15] {
            assert!(!list.upsert(IndexKind::Frequencies, doc_id, &entry(2.0, vec![])));
        }
        assert_eq!(list.len(), 6);
        assert_sorted(&list);
    }

    #[test]
    fn test_upsert_replaces_payload_in_place() {
        let mut list = PostingList::seeded(IndexKind::Frequencies, 7, &entry(1.0, vec![]));
        assert!(list.upsert(IndexKind::Frequencies, 7, &entry(4.0, vec![])));
        assert_eq!(list.len(), 1);
        assert_eq!(list.frequency(0), 4.0);
    }

    #[test]
    fn test_locations_payload_stays_parallel() {
        let mut list = PostingList::seeded(IndexKind::Locations, 3, &entry(1.0, vec![8]));
        list.upsert(IndexKind::Locations, 1, &entry(2.0, vec![0, 4]));
        list.upsert(IndexKind::Locations, 2, &entry(1.0, vec![12]));
        assert_sorted(&list);
        assert_eq!(list.locations(0), &[0, 4]);
        assert_eq!(list.locations(1), &[12]);
        assert_eq!(list.locations(2), &[8]);
    }

    #[test]
    fn test_search_upto_bounds() {
        let mut list = PostingList::seeded(IndexKind::DocIdsOnly, 2, &entry(0.0, vec![]));
        list.upsert(IndexKind::DocIdsOnly, 4, &entry(0.0, vec![]));
        list.upsert(IndexKind::DocIdsOnly, 6, &entry(0.0, vec![]));

        assert_eq!(list.search_upto(3, 4), (1, true));
        // Not visible within the bound
        assert_eq!(list.search_upto(1, 4), (1, false));
        // Smaller than everything: insertion index 0
        assert_eq!(list.search_upto(3, 1), (0, false));
        // Larger than everything: insertion index == end
        assert_eq!(list.search_upto(3, 9), (3, false));
        // Empty prefix
        assert_eq!(list.search_upto(0, 2), (0, false));
    }
}
