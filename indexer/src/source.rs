//! Streams crawled documents out of `.json` and `.jsonl` files.
//!
//! A `.json` file holds one `{url, content}` object or an array of them; a
//! `.jsonl` file holds one object per line. Directories are walked in file
//! name order so document ids are reproducible between runs.

use anyhow::{bail, Result};
use seekr_core::extract::RawDocument;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Deserialize)]
struct InputDoc {
    url: String,
    #[serde(alias = "body")]
    content: String,
}

impl From<InputDoc> for RawDocument {
    fn from(doc: InputDoc) -> Self {
        RawDocument::new(doc.url, doc.content)
    }
}

enum Current {
    Lines { path: PathBuf, lines: Lines<BufReader<File>>, line_no: usize },
    Docs(std::vec::IntoIter<RawDocument>),
}

pub struct JsonDocumentSource {
    files: std::vec::IntoIter<PathBuf>,
    current: Option<Current>,
    skipped: usize,
}

impl JsonDocumentSource {
    /// Collects the input files under `input`, which may be a single file or
    /// a directory.
    pub fn discover(input: &Path) -> Result<Self> {
        let mut files = Vec::new();
        if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
                let p = entry.path();
                if p.is_file() && is_input_file(p) {
                    files.push(p.to_path_buf());
                }
            }
        } else if input.is_file() {
            files.push(input.to_path_buf());
        } else {
            bail!("input path {} does not exist", input.display());
        }
        debug!(files = files.len(), input = %input.display(), "discovered input files");
        Ok(Self { files: files.into_iter(), current: None, skipped: 0 })
    }

    /// Malformed records and unreadable files seen so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

fn is_input_file(path: &Path) -> bool {
    matches!(path.extension().and_then(|s| s.to_str()), Some("json" | "jsonl"))
}

/// Opens `path`, returning the reader state and the number of records
/// rejected up front.
fn open_file(path: &Path) -> Result<(Current, usize)> {
    let f = File::open(path)?;
    let reader = BufReader::new(f);
    if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        return Ok((Current::Lines { path: path.to_path_buf(), lines: reader.lines(), line_no: 0 }, 0));
    }

    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let values = match json {
        serde_json::Value::Array(arr) => arr,
        obj @ serde_json::Value::Object(_) => vec![obj],
        _ => {
            warn!(path = %path.display(), "expected a JSON object or array");
            return Ok((Current::Docs(Vec::new().into_iter()), 1));
        }
    };
    let mut docs = Vec::with_capacity(values.len());
    let mut rejected = 0;
    for (i, v) in values.into_iter().enumerate() {
        match serde_json::from_value::<InputDoc>(v) {
            Ok(doc) => docs.push(doc.into()),
            Err(e) => {
                warn!(path = %path.display(), index = i, error = %e, "skipping malformed document");
                rejected += 1;
            }
        }
    }
    Ok((Current::Docs(docs.into_iter()), rejected))
}

impl Iterator for JsonDocumentSource {
    type Item = RawDocument;

    fn next(&mut self) -> Option<RawDocument> {
        loop {
            match &mut self.current {
                Some(Current::Docs(docs)) => {
                    if let Some(doc) = docs.next() {
                        return Some(doc);
                    }
                    self.current = None;
                }
                Some(Current::Lines { path, lines, line_no }) => match lines.next() {
                    None => self.current = None,
                    Some(Err(e)) => {
                        warn!(path = %path.display(), error = %e, "read failed, skipping rest of file");
                        self.skipped += 1;
                        self.current = None;
                    }
                    Some(Ok(line)) => {
                        *line_no += 1;
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<InputDoc>(&line) {
                            Ok(doc) => return Some(doc.into()),
                            Err(e) => {
                                warn!(path = %path.display(), line = *line_no, error = %e, "skipping malformed document");
                                self.skipped += 1;
                            }
                        }
                    }
                },
                None => {
                    let path = self.files.next()?;
                    match open_file(&path) {
                        Ok((current, rejected)) => {
                            self.skipped += rejected;
                            self.current = Some(current);
                        }
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "skipping unreadable file");
                            self.skipped += 1;
                        }
                    }
                }
            }
        }
    }
}
