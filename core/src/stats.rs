use crate::error::Result;
use crate::persist::write_atomic;
use serde::Serialize;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub documents: usize,
    pub duplicates: usize,
    pub unique_terms: usize,
    pub postings_bytes: u64,
}

impl IndexStats {
    pub fn write_to(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.to_string().as_bytes())
    }
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<30} {:>10}", "Number of documents", self.documents)?;
        writeln!(f, "{:<30} {:>10}", "Duplicate documents", self.duplicates)?;
        writeln!(f, "{:<30} {:>10}", "Number of unique words", self.unique_terms)?;
        write!(f, "{:<30} {:>10}", "Index size (in bytes)", self.postings_bytes)
    }
}
