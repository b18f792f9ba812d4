use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub type DocId = u32;

/// One occurrence record: `weight` is the (boosted) raw term frequency
/// before the tf-idf pass and the tf-idf score after it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub weight: f64,
}

impl Posting {
    pub fn new(doc_id: DocId, weight: f64) -> Self {
        Self { doc_id, weight }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocMeta {
    pub url: String,
    pub title: Option<String>,
    /// Set when the document was rejected as a near-duplicate.
    #[serde(default)]
    pub duplicate: bool,
}

pub type DocumentMap = HashMap<DocId, DocMeta>;

/// In-memory accumulator of postings between two flushes.
///
/// Terms are kept sorted so that flushing writes new terms in a stable order.
#[derive(Debug, Default, Clone)]
pub struct BatchIndex {
    postings: BTreeMap<String, Vec<Posting>>,
}

impl BatchIndex {
    pub fn new() -> Self { Self::default() }

    pub fn add(&mut self, term: &str, doc_id: DocId, weight: f64) {
        match self.postings.get_mut(term) {
            Some(list) => list.push(Posting::new(doc_id, weight)),
            None => {
                self.postings.insert(term.to_string(), vec![Posting::new(doc_id, weight)]);
            }
        }
    }

    pub fn insert(&mut self, term: impl Into<String>, postings: Vec<Posting>) {
        self.postings.entry(term.into()).or_default().extend(postings);
    }

    pub fn get(&self, term: &str) -> &[Posting] {
        self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize { self.postings.len() }

    pub fn is_empty(&self) -> bool { self.postings.is_empty() }

    pub(crate) fn remove(&mut self, term: &str) -> Option<Vec<Posting>> {
        self.postings.remove(term)
    }

    pub(crate) fn into_sorted(self) -> impl Iterator<Item = (String, Vec<Posting>)> {
        self.postings.into_iter()
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<Posting>)> for BatchIndex {
    fn from_iter<I: IntoIterator<Item = (S, Vec<Posting>)>>(iter: I) -> Self {
        let mut batch = BatchIndex::new();
        for (term, postings) in iter {
            batch.insert(term, postings);
        }
        batch
    }
}
