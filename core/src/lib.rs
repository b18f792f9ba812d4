//! Core of the seekr search engine: the on-disk inverted index, the
//! indexing pipeline and ranked retrieval.

pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod index;
pub mod persist;
pub mod search;
pub mod stats;
pub mod storage;
pub mod tokenizer;

pub use builder::{BuildSummary, IndexBuilder};
pub use config::BuilderConfig;
pub use error::{Error, Result};
pub use index::{BatchIndex, DocId, DocMeta, Posting};
pub use persist::IndexPaths;
pub use search::{QueryEngine, SearchHit, SearchOptions, SearchResults};
pub use storage::StorageEngine;
