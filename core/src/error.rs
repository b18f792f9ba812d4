use crate::codec::CodecError;
use crate::index::DocId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the index, the pipeline and the query engine.
#[derive(Debug, Error)]
pub enum Error {
    /// An operation touched the storage engine while it was closed.
    #[error("storage engine is not open")]
    NotOpen,
    /// A line of the postings file could not be decoded.
    #[error("corrupt record at byte {offset}: {source}")]
    CorruptRecord {
        offset: u64,
        #[source]
        source: CodecError,
    },
    /// A document id has no entry in the document map.
    #[error("unknown document id {0}")]
    UnknownDocument(DocId),
    /// Extraction, tokenization or stemming failed for one document.
    #[error("collaborator failed: {0}")]
    Collaborator(String),
    #[error("tf-idf weighting has already been applied to this index")]
    TfIdfAlreadyApplied,
    #[error("index has already been built")]
    AlreadyBuilt,
    #[error("no built index found at {}", .0.display())]
    NotBuilt(PathBuf),
    #[error("document frequency {df} exceeds total document count {total}")]
    InvalidDocumentCount { total: usize, df: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("search deadline exceeded")]
    DeadlineExceeded,
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding: {0}")]
    Snapshot(#[from] bincode::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn corrupt(offset: u64, source: CodecError) -> Self {
        Error::CorruptRecord { offset, source }
    }
}
