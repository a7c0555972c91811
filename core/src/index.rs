use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub type DocumentId = String;

/// Occurrences of one term inside one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingEntry {
    #[serde(skip)]
    pub doc_id: DocumentId,
    pub positions: Vec<usize>,
    pub frequency: usize,
}

impl PostingEntry {
    fn new(doc_id: DocumentId) -> Self {
        Self { doc_id, positions: Vec::new(), frequency: 0 }
    }
}

/// Entries for one term, in first-occurrence order. Serialized as
/// `{doc_id: {"positions": [..], "frequency": n}}` in that same order.
#[derive(Debug, Clone, Default)]
pub struct PostingList {
    entries: Vec<PostingEntry>,
    slots: HashMap<DocumentId, usize>,
}

impl PostingList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `position` for `doc_id`, creating the entry on first sight.
    pub fn record(&mut self, doc_id: &str, position: usize) {
        let slot = match self.slots.get(doc_id) {
            Some(&slot) => slot,
            None => {
                self.entries.push(PostingEntry::new(doc_id.to_string()));
                let slot = self.entries.len() - 1;
                self.slots.insert(doc_id.to_string(), slot);
                slot
            }
        };
        let entry = &mut self.entries[slot];
        entry.positions.push(position);
        entry.frequency += 1;
    }

    pub fn get(&self, doc_id: &str) -> Option<&PostingEntry> {
        self.slots.get(doc_id).map(|&slot| &self.entries[slot])
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.slots.contains_key(doc_id)
    }

    pub fn entries(&self) -> &[PostingEntry] {
        &self.entries
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.doc_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push_entry(&mut self, entry: PostingEntry) -> bool {
        if self.slots.contains_key(&entry.doc_id) {
            return false;
        }
        self.slots.insert(entry.doc_id.clone(), self.entries.len());
        self.entries.push(entry);
        true
    }
}

impl PartialEq for PostingList {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for PostingList {}

impl Serialize for PostingList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.doc_id, entry)?;
        }
        map.end()
    }
}

struct PostingListVisitor;

impl<'de> Visitor<'de> for PostingListVisitor {
    type Value = PostingList;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of document id to {positions, frequency}")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<PostingList, A::Error> {
        let mut list = PostingList::new();
        while let Some((doc_id, mut entry)) = access.next_entry::<DocumentId, PostingEntry>()? {
            if entry.frequency != entry.positions.len() {
                return Err(de::Error::custom(format!(
                    "document '{doc_id}': frequency {} does not match {} positions",
                    entry.frequency,
                    entry.positions.len()
                )));
            }
            if entry.positions.windows(2).any(|w| w[0] >= w[1]) {
                return Err(de::Error::custom(format!("document '{doc_id}': positions not strictly increasing")));
            }
            entry.doc_id = doc_id.clone();
            if !list.push_entry(entry) {
                return Err(de::Error::custom(format!("duplicate document '{doc_id}'")));
            }
        }
        Ok(list)
    }
}

impl<'de> Deserialize<'de> for PostingList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PostingListVisitor)
    }
}

/// term -> posting list, terms kept sorted so serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvertedIndex {
    terms: BTreeMap<String, PostingList>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, term: &str, doc_id: &str, position: usize) {
        match self.terms.get_mut(term) {
            Some(list) => list.record(doc_id, position),
            None => {
                let mut list = PostingList::new();
                list.record(doc_id, position);
                self.terms.insert(term.to_string(), list);
            }
        }
    }

    pub fn get(&self, term: &str) -> Option<&PostingList> {
        self.terms.get(term)
    }

    pub fn contains_term(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }

    pub fn terms(&self) -> impl Iterator<Item = (&str, &PostingList)> {
        self.terms.iter().map(|(t, l)| (t.as_str(), l))
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Total number of (term, document) pairs.
    pub fn posting_count(&self) -> usize {
        self.terms.values().map(PostingList::len).sum()
    }

    /// Copy of the index restricted to `wanted` terms.
    pub fn subset<'a>(&self, wanted: impl IntoIterator<Item = &'a String>) -> InvertedIndex {
        let mut out = InvertedIndex::new();
        for term in wanted {
            if let Some(list) = self.terms.get(term) {
                out.terms.insert(term.clone(), list.clone());
            }
        }
        out
    }

    /// Move `other`'s terms into this index, replacing lists for terms present in both.
    pub fn absorb(&mut self, other: InvertedIndex) {
        self.terms.extend(other.terms);
    }

    pub(crate) fn insert(&mut self, term: String, list: PostingList) {
        self.terms.insert(term, list);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_appends_in_first_occurrence_order() {
        let mut list = PostingList::new();
        list.record("b.txt", 3);
        list.record("a.txt", 1);
        list.record("b.txt", 9);
        let ids: Vec<_> = list.doc_ids().collect();
        assert_eq!(ids, vec!["b.txt", "a.txt"]);
        let b = list.get("b.txt").unwrap();
        assert_eq!(b.positions, vec![3, 9]);
        assert_eq!(b.frequency, 2);
    }

    #[test]
    fn serializes_in_entry_order() {
        let mut idx = InvertedIndex::new();
        idx.record("whale", "z", 4);
        idx.record("whale", "a", 0);
        let json = serde_json::to_string(&idx).unwrap();
        assert_eq!(
            json,
            r#"{"whale":{"z":{"positions":[4],"frequency":1},"a":{"positions":[0],"frequency":1}}}"#
        );
        let back: InvertedIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(back, idx);
        assert_eq!(back.get("whale").unwrap().doc_ids().collect::<Vec<_>>(), vec!["z", "a"]);
    }

    #[test]
    fn rejects_inconsistent_frequency() {
        let json = r#"{"whale":{"a":{"positions":[1,2],"frequency":3}}}"#;
        let err = serde_json::from_str::<InvertedIndex>(json).unwrap_err();
        assert!(err.to_string().contains("frequency 3"));
    }

    #[test]
    fn rejects_unordered_positions() {
        let json = r#"{"whale":{"a":{"positions":[5,2],"frequency":2}}}"#;
        assert!(serde_json::from_str::<InvertedIndex>(json).is_err());
    }

    #[test]
    fn subset_keeps_only_requested() {
        let mut idx = InvertedIndex::new();
        idx.record("car", "1", 1);
        idx.record("nice", "1", 3);
        let sub = idx.subset(&["car".to_string(), "zzz".to_string()]);
        assert_eq!(sub.len(), 1);
        assert!(sub.contains_term("car"));
    }
}
