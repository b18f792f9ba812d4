//! Line-oriented postings file with an in-memory term → byte offset index.
//!
//! Every write path rewrites the whole file into `postings.db.tmp` and then
//! renames it over `postings.db`. The rename is the only step that changes
//! on-disk state; a failure or crash before it leaves the previous file in
//! place. The offset snapshot is deleted right before the rename, so a crash
//! after it forces a rebuild-by-scan on the next open. A tf-idf rewrite is
//! marked pending in `meta.json` before its rename; the next open settles the
//! flag by whether the temp file survived.

use crate::codec::{self, CodecError};
use crate::error::{Error, Result};
use crate::index::{BatchIndex, Posting};
use crate::persist::{self, IndexPaths, MetaFile, OffsetSnapshot};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// `(1 + log10(tf)) * log10(total / df)`; non-positive frequencies score 0.
pub fn tf_idf(tf: f64, df: usize, total: usize) -> f64 {
    if tf <= 0.0 || df == 0 {
        return 0.0;
    }
    (1.0 + tf.log10()) * (total as f64 / df as f64).log10()
}

struct OpenState {
    file: Mutex<File>,
    offsets: HashMap<String, u64>,
    tf_idf_applied: bool,
}

/// The inverted-index database.
///
/// `get` only needs `&self`; `set` and `convert_to_tf_idf` replace the file
/// and need `&mut self`.
pub struct StorageEngine {
    paths: IndexPaths,
    state: Option<OpenState>,
}

impl StorageEngine {
    pub fn new(paths: IndexPaths) -> Self {
        Self { paths, state: None }
    }

    pub fn paths(&self) -> &IndexPaths { &self.paths }

    pub fn is_open(&self) -> bool { self.state.is_some() }

    /// Opens the postings file. With `restart`, every file the engine owns
    /// is deleted first.
    pub fn open(&mut self, restart: bool) -> Result<()> {
        if self.is_open() {
            self.close()?;
        }
        fs::create_dir_all(&self.paths.root)?;
        if restart {
            for path in [self.paths.postings(), self.paths.offsets(), self.paths.meta()] {
                persist::remove_if_exists(&path)?;
            }
            info!(root = %self.paths.root.display(), "starting from an empty postings file");
        }
        let tmp = self.paths.postings_tmp();
        let unfinished = tmp.exists();
        let tf_idf_applied = if restart { false } else { self.resolve_tf_idf_flag(unfinished)? };
        if unfinished {
            warn!(path = %tmp.display(), "discarding unfinished compaction output");
            persist::remove_if_exists(&tmp)?;
        }

        let mut file = open_postings(&self.paths.postings())?;
        let offsets = if restart {
            HashMap::new()
        } else {
            let file_len = file.metadata()?.len();
            self.load_or_scan(&mut file, file_len)?
        };
        debug!(terms = offsets.len(), tf_idf_applied, "storage engine open");
        self.state = Some(OpenState { file: Mutex::new(file), offsets, tf_idf_applied });
        Ok(())
    }

    fn load_or_scan(&self, file: &mut File, file_len: u64) -> Result<HashMap<String, u64>> {
        if !self.paths.offsets().exists() {
            return scan_offsets(file);
        }
        match persist::load_offsets(&self.paths) {
            Ok(snapshot) if snapshot.postings_len == file_len => Ok(snapshot.offsets),
            Ok(snapshot) => {
                warn!(
                    snapshot_len = snapshot.postings_len,
                    file_len, "offset snapshot does not match postings file, rebuilding"
                );
                scan_offsets(file)
            }
            Err(e) => {
                warn!(error = %e, "unreadable offset snapshot, rebuilding");
                scan_offsets(file)
            }
        }
    }

    /// Reads the tf-idf flag from the meta file. A rewrite left pending by a
    /// crash counts as applied only if its temp file was renamed away; the
    /// resolved flag is written back before the temp file is removed.
    fn resolve_tf_idf_flag(&self, unfinished: bool) -> Result<bool> {
        if !self.paths.meta().exists() {
            return Ok(false);
        }
        let meta = match persist::load_meta(&self.paths) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(error = %e, "unreadable meta file");
                return Ok(false);
            }
        };
        if !meta.tf_idf_pending {
            return Ok(meta.tf_idf_applied);
        }
        let applied = !unfinished;
        warn!(applied, "resolving interrupted tf-idf rewrite");
        persist::save_meta(&self.paths, &MetaFile::new(meta.num_terms, applied))?;
        Ok(applied)
    }

    /// Persists the offset snapshot and metadata, then releases the file.
    pub fn close(&mut self) -> Result<()> {
        let state = self.state.take().ok_or(Error::NotOpen)?;
        let file = state.file.into_inner();
        let postings_len = file.metadata()?.len();
        drop(file);
        let num_terms = state.offsets.len();
        persist::save_offsets(&self.paths, &OffsetSnapshot { postings_len, offsets: state.offsets })?;
        persist::save_meta(&self.paths, &MetaFile::new(num_terms, state.tf_idf_applied))?;
        debug!(num_terms, postings_len, "storage engine closed");
        Ok(())
    }

    fn state(&self) -> Result<&OpenState> {
        self.state.as_ref().ok_or(Error::NotOpen)
    }

    /// Posting list of `term`, empty if the term is not indexed.
    pub fn get(&self, term: &str) -> Result<Vec<Posting>> {
        let state = self.state()?;
        let Some(&offset) = state.offsets.get(term) else {
            return Ok(Vec::new());
        };
        let mut file = state.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        let mut line = String::new();
        BufReader::new(&mut *file).read_line(&mut line)?;
        let (found, postings) = codec::decode_line(&line).map_err(|e| Error::corrupt(offset, e))?;
        if found != term {
            return Err(Error::corrupt(
                offset,
                CodecError::TermMismatch { expected: term.to_string(), found: found.to_string() },
            ));
        }
        Ok(postings)
    }

    /// Merges `batch` into the file. Postings for an existing term are
    /// appended after the ones already stored.
    pub fn set(&mut self, batch: BatchIndex) -> Result<()> {
        self.state()?;
        if batch.is_empty() {
            return Ok(());
        }
        let batch_terms = batch.len();
        let lines = self.compact(&mut MergeBatch(batch))?;
        info!(batch_terms, total_terms = lines, "merged batch into postings file");
        Ok(())
    }

    /// Rewrites every weight as its tf-idf score against `total_documents`.
    /// Only allowed once per index.
    pub fn convert_to_tf_idf(&mut self, total_documents: usize) -> Result<()> {
        if self.state()?.tf_idf_applied {
            return Err(Error::TfIdfAlreadyApplied);
        }
        let lines = self.compact(&mut TfIdf { total: total_documents })?;
        if let Some(state) = self.state.as_mut() {
            state.tf_idf_applied = true;
        }
        persist::save_meta(&self.paths, &MetaFile::new(lines, true))?;
        info!(terms = lines, total_documents, "applied tf-idf weighting");
        Ok(())
    }

    pub fn tf_idf_applied(&self) -> Result<bool> {
        Ok(self.state()?.tf_idf_applied)
    }

    /// Number of distinct terms.
    pub fn len(&self) -> Result<usize> {
        Ok(self.state()?.offsets.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn term_offsets(&self) -> Result<&HashMap<String, u64>> {
        Ok(&self.state()?.offsets)
    }

    pub fn file_size(&self) -> Result<u64> {
        Ok(self.state()?.file.lock().metadata()?.len())
    }

    fn compact<R: Rewrite>(&mut self, rewrite: &mut R) -> Result<usize> {
        let tmp_path = self.paths.postings_tmp();
        let state = self.state.as_mut().ok_or(Error::NotOpen)?;
        let tf_idf_applied = state.tf_idf_applied;
        let lines = match write_compacted(state.file.get_mut(), &tmp_path, rewrite) {
            Ok(lines) => lines,
            Err(e) => {
                if let Err(cleanup) = persist::remove_if_exists(&tmp_path) {
                    warn!(error = %cleanup, "failed to remove compaction output");
                }
                return Err(e);
            }
        };

        // Release the old handle before replacing the file under it.
        self.state = None;
        let pending = rewrite.marks_tf_idf().then_some(lines);
        if let Err(e) = self.commit(&tmp_path, pending) {
            if let Err(cleanup) = persist::remove_if_exists(&tmp_path) {
                warn!(error = %cleanup, "failed to remove compaction output");
            }
            self.reopen(tf_idf_applied)?;
            if pending.is_some() {
                persist::save_meta(&self.paths, &MetaFile::new(self.len()?, tf_idf_applied))?;
            }
            return Err(e);
        }
        self.reopen(tf_idf_applied)?;
        debug!(lines, "postings file replaced");
        Ok(lines)
    }

    /// Replaces the postings file with `tmp`. With `pending_tf_idf`, the meta
    /// file records the rewrite before the rename so the flag cannot be lost
    /// between the rename and the final meta update.
    fn commit(&self, tmp: &Path, pending_tf_idf: Option<usize>) -> Result<()> {
        if let Some(num_terms) = pending_tf_idf {
            persist::save_meta(&self.paths, &MetaFile::pending_tf_idf(num_terms))?;
        }
        persist::remove_if_exists(&self.paths.offsets())?;
        fs::rename(tmp, self.paths.postings())?;
        Ok(())
    }

    fn reopen(&mut self, tf_idf_applied: bool) -> Result<()> {
        let mut file = open_postings(&self.paths.postings())?;
        let offsets = scan_offsets(&mut file)?;
        self.state = Some(OpenState { file: Mutex::new(file), offsets, tf_idf_applied });
        Ok(())
    }
}

impl Drop for StorageEngine {
    fn drop(&mut self) {
        if self.is_open() {
            if let Err(e) = self.close() {
                warn!(error = %e, "failed to close storage engine");
            }
        }
    }
}

fn open_postings(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().read(true).append(true).create(true).open(path)?)
}

/// Maps every term in the file to the byte offset of its line.
fn scan_offsets(file: &mut File) -> Result<HashMap<String, u64>> {
    file.seek(SeekFrom::Start(0))?;
    let mut reader = BufReader::new(file);
    let mut offsets = HashMap::new();
    let mut offset = 0u64;
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            break;
        }
        let (term, _) = codec::split_term(&line).map_err(|e| Error::corrupt(offset, e))?;
        if offsets.insert(term.to_string(), offset).is_some() {
            return Err(Error::corrupt(offset, CodecError::DuplicateTerm(term.to_string())));
        }
        offset += n as u64;
    }
    Ok(offsets)
}

/// How a compaction transforms each stored line.
trait Rewrite {
    fn rewrite(&mut self, term: &str, postings: Vec<Posting>) -> Result<Vec<Posting>>;

    /// Lines for terms not present in the old file.
    fn trailing(&mut self) -> Vec<(String, Vec<Posting>)> {
        Vec::new()
    }

    /// Whether the rewritten file carries tf-idf weights.
    fn marks_tf_idf(&self) -> bool {
        false
    }
}

struct MergeBatch(BatchIndex);

impl Rewrite for MergeBatch {
    fn rewrite(&mut self, term: &str, mut postings: Vec<Posting>) -> Result<Vec<Posting>> {
        if let Some(extra) = self.0.remove(term) {
            postings.extend(extra);
        }
        Ok(postings)
    }

    fn trailing(&mut self) -> Vec<(String, Vec<Posting>)> {
        std::mem::take(&mut self.0).into_sorted().collect()
    }
}

struct TfIdf {
    total: usize,
}

impl Rewrite for TfIdf {
    fn rewrite(&mut self, _term: &str, mut postings: Vec<Posting>) -> Result<Vec<Posting>> {
        let df = postings.len();
        if df > self.total {
            return Err(Error::InvalidDocumentCount { total: self.total, df });
        }
        for p in postings.iter_mut() {
            p.weight = tf_idf(p.weight, df, self.total);
        }
        Ok(postings)
    }

    fn marks_tf_idf(&self) -> bool {
        true
    }
}

/// Streams the old file through `rewrite` into `tmp`. Returns the number of
/// lines written.
fn write_compacted<R: Rewrite>(old: &mut File, tmp: &Path, rewrite: &mut R) -> Result<usize> {
    old.seek(SeekFrom::Start(0))?;
    let mut reader = BufReader::new(old);
    let mut out = BufWriter::new(File::create(tmp)?);
    let mut seen: HashSet<String> = HashSet::new();
    let mut offset = 0u64;
    let mut lines = 0usize;
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            break;
        }
        let (term, postings) = codec::decode_line(&line).map_err(|e| Error::corrupt(offset, e))?;
        if !seen.insert(term.to_string()) {
            return Err(Error::corrupt(offset, CodecError::DuplicateTerm(term.to_string())));
        }
        let postings = rewrite.rewrite(term, postings)?;
        if write_line(&mut out, term, &postings)? {
            lines += 1;
        }
        offset += n as u64;
    }
    for (term, postings) in rewrite.trailing() {
        if write_line(&mut out, &term, &postings)? {
            lines += 1;
        }
    }
    out.flush()?;
    out.get_ref().sync_all()?;
    Ok(lines)
}

fn write_line<W: Write>(out: &mut W, term: &str, postings: &[Posting]) -> Result<bool> {
    if postings.is_empty() {
        return Ok(false);
    }
    let encoded = codec::encode_line(term, postings)?;
    out.write_all(encoded.as_bytes())?;
    out.write_all(b"\n")?;
    Ok(true)
}
