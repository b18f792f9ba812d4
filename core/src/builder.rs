use crate::config::BuilderConfig;
use crate::error::{Error, Result};
use crate::extract::{Extractor, HtmlExtractor, RawDocument};
use crate::fingerprint::{fingerprint, FingerprintTable};
use crate::index::{BatchIndex, DocId, DocMeta, DocumentMap, Posting};
use crate::persist::{self, IndexPaths};
use crate::stats::IndexStats;
use crate::storage::StorageEngine;
use crate::tokenizer::Analyzer;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Documents seen, including duplicates and failures.
    pub documents: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub terms: usize,
}

/// A document after extraction and analysis.
struct AnalyzedDocument {
    terms: Vec<String>,
    bold: Vec<String>,
    title_terms: Vec<String>,
    header_terms: Vec<String>,
    title: Option<String>,
}

impl AnalyzedDocument {
    /// Term counts with every emphasized occurrence adding `weight - 1`.
    fn weighted_counts(&self, config: &BuilderConfig) -> HashMap<&str, f64> {
        let mut counts: HashMap<&str, f64> = HashMap::new();
        for term in &self.terms {
            *counts.entry(term).or_insert(0.0) += 1.0;
        }
        for (terms, weight) in [
            (&self.bold, config.bold_weight),
            (&self.title_terms, config.title_weight),
            (&self.header_terms, config.header_weight),
        ] {
            for term in terms {
                *counts.entry(term).or_insert(0.0) += weight - 1.0;
            }
        }
        counts
    }
}

/// Owns the storage engine and the document map of one index directory.
pub struct IndexBuilder {
    paths: IndexPaths,
    config: BuilderConfig,
    analyzer: Analyzer,
    extractor: Arc<dyn Extractor>,
    storage: StorageEngine,
    documents: DocumentMap,
    built: bool,
}

impl IndexBuilder {
    /// Opens the index at `paths` with the default HTML/English collaborators.
    pub fn open(paths: IndexPaths, config: BuilderConfig, restart: bool) -> Result<Self> {
        let analyzer = Analyzer::english(config.remove_stopwords);
        Self::with_collaborators(paths, config, Arc::new(HtmlExtractor), analyzer, restart)
    }

    /// Opens an index that must already be built, with the configuration it
    /// was built with. Nothing is reset.
    pub fn load(paths: IndexPaths) -> Result<Self> {
        if !paths.documents().exists() {
            return Err(Error::NotBuilt(paths.root.clone()));
        }
        let config = if paths.config().exists() {
            BuilderConfig::from_json_file(paths.config())?
        } else {
            BuilderConfig::default()
        };
        Self::open(paths, config, false)
    }

    pub fn with_collaborators(
        paths: IndexPaths,
        config: BuilderConfig,
        extractor: Arc<dyn Extractor>,
        analyzer: Analyzer,
        restart: bool,
    ) -> Result<Self> {
        config.validate()?;
        if restart {
            persist::remove_if_exists(&paths.documents())?;
            persist::remove_if_exists(&paths.config())?;
        }
        let mut storage = StorageEngine::new(paths.clone());
        storage.open(restart)?;

        let (documents, built) = if paths.documents().exists() {
            let documents = persist::load_documents(&paths)?;
            info!(documents = documents.len(), terms = storage.len()?, "loaded existing index");
            (documents, true)
        } else {
            if !storage.is_empty()? || storage.tf_idf_applied()? {
                warn!(root = %paths.root.display(), "postings file without a document map, resetting index");
                storage.open(true)?;
            }
            (DocumentMap::new(), false)
        };

        Ok(Self { paths, config, analyzer, extractor, storage, documents, built })
    }

    pub fn is_built(&self) -> bool { self.built }

    pub fn paths(&self) -> &IndexPaths { &self.paths }

    pub fn config(&self) -> &BuilderConfig { &self.config }

    pub fn analyzer(&self) -> &Analyzer { &self.analyzer }

    pub fn storage(&self) -> &StorageEngine { &self.storage }

    /// Ingests `source` in iteration order, applies tf-idf weighting and
    /// persists the document map.
    pub fn build<I>(&mut self, source: I) -> Result<BuildSummary>
    where
        I: IntoIterator<Item = RawDocument>,
    {
        if self.built {
            return Err(Error::AlreadyBuilt);
        }
        let leftover = !self.documents.is_empty()
            || !self.storage.is_open()
            || !self.storage.is_empty()?
            || self.storage.tf_idf_applied()?;
        if leftover {
            warn!(root = %self.paths.root.display(), "discarding output of an unfinished build");
            self.storage.open(true)?;
            self.documents.clear();
        }
        let started = Instant::now();
        let threshold = self.config.simhash_threshold;
        let mut fingerprints = FingerprintTable::new(self.config.fingerprint_bits);
        let mut batch = BatchIndex::new();
        let mut summary = BuildSummary::default();
        let mut next_id: DocId = 0;

        for raw in source {
            let doc_id = next_id;
            next_id += 1;
            if doc_id > 0 && doc_id as usize % self.config.batch_size == 0 {
                self.flush(&mut batch)?;
            }

            let analyzed = match self.analyze_document(&raw) {
                Ok(analyzed) => analyzed,
                Err(e) => {
                    warn!(doc_id, url = %raw.url, error = %e, "skipping document");
                    summary.failed += 1;
                    self.documents.insert(doc_id, DocMeta { url: raw.url, title: None, duplicate: false });
                    continue;
                }
            };

            let fp = fingerprint(&analyzed.terms, fingerprints.bits());
            let duplicate_of = fingerprints.find_duplicate(fp, threshold);
            fingerprints.insert(doc_id, fp);
            match duplicate_of {
                Some(original) => {
                    debug!(doc_id, original, url = %raw.url, "near-duplicate, terms not indexed");
                    summary.duplicates += 1;
                }
                None => {
                    for (term, weight) in analyzed.weighted_counts(&self.config) {
                        if weight > 0.0 {
                            batch.add(term, doc_id, weight);
                        }
                    }
                }
            }
            self.documents.insert(
                doc_id,
                DocMeta { url: raw.url, title: analyzed.title, duplicate: duplicate_of.is_some() },
            );
        }

        self.flush(&mut batch)?;
        let total = next_id as usize;
        self.storage.convert_to_tf_idf(total)?;
        self.config.save_json_file(self.paths.config())?;
        persist::save_documents(&self.paths, &self.documents)?;
        self.built = true;

        summary.documents = total;
        summary.terms = self.storage.len()?;
        info!(
            documents = summary.documents,
            duplicates = summary.duplicates,
            failed = summary.failed,
            terms = summary.terms,
            elapsed_s = started.elapsed().as_secs_f64(),
            "index build complete"
        );
        Ok(summary)
    }

    fn analyze_document(&self, raw: &RawDocument) -> Result<AnalyzedDocument> {
        let extracted = self.extractor.extract(raw)?;
        Ok(AnalyzedDocument {
            terms: self.analyzer.analyze(&extracted.plain_text)?,
            bold: self.analyzer.analyze(&extracted.bold.join(" "))?,
            title_terms: self.analyzer.analyze(&extracted.title.join(" "))?,
            header_terms: self.analyzer.analyze(&extracted.headers.join(" "))?,
            title: extracted.title.first().map(|t| t.trim().to_string()),
        })
    }

    fn flush(&mut self, batch: &mut BatchIndex) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(batch);
        debug!(terms = batch.len(), "flushing batch index");
        self.storage.set(batch)
    }

    pub fn get_postings(&self, term: &str) -> Result<Vec<Posting>> {
        self.storage.get(term)
    }

    pub fn get_doc(&self, doc_id: DocId) -> Result<&str> {
        Ok(&self.document(doc_id)?.url)
    }

    pub fn document(&self, doc_id: DocId) -> Result<&DocMeta> {
        self.documents.get(&doc_id).ok_or(Error::UnknownDocument(doc_id))
    }

    pub fn num_docs(&self) -> usize { self.documents.len() }

    pub fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            documents: self.documents.len(),
            duplicates: self.documents.values().filter(|d| d.duplicate).count(),
            unique_terms: self.storage.len()?,
            postings_bytes: self.storage.file_size()?,
        })
    }

    /// Closes the storage engine, writing its offset snapshot.
    pub fn close(mut self) -> Result<()> {
        self.storage.close()
    }
}
