use crate::error::Result;
use crate::index::DocumentMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub updated_at: String,
    pub num_terms: usize,
    #[serde(default)]
    pub tf_idf_applied: bool,
    /// Set while a tf-idf rewrite sits in the temp file waiting for its
    /// rename. Whether the rename happened is decided on the next open by
    /// whether the temp file is still there.
    #[serde(default)]
    pub tf_idf_pending: bool,
}

impl MetaFile {
    pub fn new(num_terms: usize, tf_idf_applied: bool) -> Self {
        let updated_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        Self { version: FORMAT_VERSION, updated_at, num_terms, tf_idf_applied, tf_idf_pending: false }
    }

    pub fn pending_tf_idf(num_terms: usize) -> Self {
        Self { tf_idf_pending: true, ..Self::new(num_terms, false) }
    }
}

/// Offset-index snapshot. `postings_len` is the postings file length the
/// offsets were computed against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OffsetSnapshot {
    pub postings_len: u64,
    pub offsets: HashMap<String, u64>,
}

/// File layout of one index directory.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn postings(&self) -> PathBuf { self.root.join("postings.db") }
    pub fn postings_tmp(&self) -> PathBuf { self.root.join("postings.db.tmp") }
    pub fn offsets(&self) -> PathBuf { self.root.join("postings.idx") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn documents(&self) -> PathBuf { self.root.join("documents.bin") }
    pub fn config(&self) -> PathBuf { self.root.join("config.json") }
    pub fn statistics(&self) -> PathBuf { self.root.join("statistics.txt") }
}

/// Writes `bytes` to a sibling temp file and renames it over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        create_dir_all(dir)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    {
        let mut f = BufWriter::new(File::create(&tmp)?);
        f.write_all(bytes)?;
        f.flush()?;
        f.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Removes `path`, treating a missing file as success.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub fn save_offsets(paths: &IndexPaths, snapshot: &OffsetSnapshot) -> Result<()> {
    let bytes = bincode::serialize(snapshot)?;
    write_atomic(&paths.offsets(), &bytes)
}

pub fn load_offsets(paths: &IndexPaths) -> Result<OffsetSnapshot> {
    let buf = fs::read(paths.offsets())?;
    Ok(bincode::deserialize(&buf)?)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    let json = serde_json::to_string_pretty(meta)?;
    write_atomic(&paths.meta(), json.as_bytes())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let buf = fs::read(paths.meta())?;
    Ok(serde_json::from_slice(&buf)?)
}

pub fn save_documents(paths: &IndexPaths, docs: &DocumentMap) -> Result<()> {
    let bytes = bincode::serialize(docs)?;
    write_atomic(&paths.documents(), &bytes)
}

pub fn load_documents(paths: &IndexPaths) -> Result<DocumentMap> {
    let buf = fs::read(paths.documents())?;
    Ok(bincode::deserialize(&buf)?)
}
