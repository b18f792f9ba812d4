//! Ranked retrieval over a built index.
//!
//! Scoring is a weighted OR: a document's score is the sum of its tf-idf
//! weights over the distinct query terms that occur in it. Terms missing
//! from the index contribute nothing.

use crate::builder::IndexBuilder;
use crate::error::{Error, Result};
use crate::index::DocId;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::debug;

const DEADLINE_CHECK_INTERVAL: usize = 4096;

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    /// Maximum number of hits returned; `None` returns all of them.
    pub limit: Option<usize>,
    /// Budget for merging posting lists.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults {
    /// Matching documents before `limit` was applied.
    pub total_hits: usize,
    pub hits: Vec<SearchHit>,
}

pub struct QueryEngine<'a> {
    index: &'a IndexBuilder,
}

impl<'a> QueryEngine<'a> {
    pub fn new(index: &'a IndexBuilder) -> Self {
        Self { index }
    }

    /// URLs of every matching document, most relevant first.
    pub fn search(&self, query: &str) -> Result<Vec<String>> {
        let results = self.search_hits(query, &SearchOptions::default())?;
        Ok(results.hits.into_iter().map(|hit| hit.url).collect())
    }

    pub fn search_hits(&self, query: &str, options: &SearchOptions) -> Result<SearchResults> {
        let ranked = self.rank(query, options)?;
        let total_hits = ranked.len();
        let limit = options.limit.unwrap_or(total_hits);
        let hits = ranked
            .into_iter()
            .take(limit)
            .map(|(doc_id, score)| -> Result<SearchHit> {
                let url = self.index.get_doc(doc_id)?.to_string();
                Ok(SearchHit { doc_id, score, url })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(SearchResults { total_hits, hits })
    }

    /// `(doc_id, score)` pairs sorted by descending score. Equal scores keep
    /// the order in which documents were first encountered.
    pub fn rank(&self, query: &str, options: &SearchOptions) -> Result<Vec<(DocId, f64)>> {
        let deadline = options.timeout.map(|t| Instant::now() + t);
        let terms = unique_terms(self.index.analyzer().analyze(query)?);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut slots: HashMap<DocId, usize> = HashMap::new();
        let mut scored: Vec<(DocId, f64)> = Vec::new();
        for term in &terms {
            check_deadline(deadline)?;
            let postings = self.index.get_postings(term)?;
            for (i, p) in postings.into_iter().enumerate() {
                if i > 0 && i % DEADLINE_CHECK_INTERVAL == 0 {
                    check_deadline(deadline)?;
                }
                match slots.entry(p.doc_id) {
                    Entry::Occupied(slot) => scored[*slot.get()].1 += p.weight,
                    Entry::Vacant(slot) => {
                        slot.insert(scored.len());
                        scored.push((p.doc_id, p.weight));
                    }
                }
            }
        }
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        debug!(terms = terms.len(), hits = scored.len(), "ranked query");
        Ok(scored)
    }
}

fn unique_terms(terms: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    terms.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

fn check_deadline(deadline: Option<Instant>) -> Result<()> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Err(Error::DeadlineExceeded),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_terms_keeps_first_occurrence() {
        let terms = vec!["cat".to_string(), "dog".to_string(), "cat".to_string()];
        assert_eq!(unique_terms(terms), vec!["cat", "dog"]);
    }

    #[test]
    fn zero_budget_expires_immediately() {
        let deadline = Some(Instant::now());
        assert!(matches!(check_deadline(deadline), Err(Error::DeadlineExceeded)));
        assert!(check_deadline(None).is_ok());
    }
}
