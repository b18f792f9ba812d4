//! Indexing configuration.
//!
//! Loaded from JSON; every field is optional:
//!
//! ```json
//! { "bold_weight": 2.0, "title_weight": 3.0, "header_weight": 1.5, "simhash_threshold": 0.95 }
//! ```

use crate::error::{Error, Result};
use crate::fingerprint::MAX_BITS;
use crate::persist::write_atomic;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const DEFAULT_BATCH_SIZE: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Boost for tokens inside `<b>`/`<strong>`; 1.0 means no boost.
    pub bold_weight: f64,
    pub title_weight: f64,
    pub header_weight: f64,
    /// Similarity at or above which a document is rejected as a duplicate.
    pub simhash_threshold: f64,
    pub fingerprint_bits: u32,
    /// Documents accumulated in memory between two flushes.
    pub batch_size: usize,
    pub remove_stopwords: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            bold_weight: 1.0,
            title_weight: 1.0,
            header_weight: 1.0,
            simhash_threshold: 0.95,
            fingerprint_bits: MAX_BITS,
            batch_size: DEFAULT_BATCH_SIZE,
            remove_stopwords: false,
        }
    }
}

impl BuilderConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: BuilderConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path.as_ref(), json.as_bytes())
    }

    pub fn validate(&self) -> Result<()> {
        for (name, weight) in [
            ("bold_weight", self.bold_weight),
            ("title_weight", self.title_weight),
            ("header_weight", self.header_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::InvalidConfig(format!("{name} must be a non-negative number, got {weight}")));
            }
        }
        if !(0.0..=1.0).contains(&self.simhash_threshold) {
            return Err(Error::InvalidConfig(format!(
                "simhash_threshold must be within [0, 1], got {}",
                self.simhash_threshold
            )));
        }
        if self.fingerprint_bits == 0 || self.fingerprint_bits > MAX_BITS {
            return Err(Error::InvalidConfig(format!(
                "fingerprint_bits must be within 1..={MAX_BITS}, got {}",
                self.fingerprint_bits
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be positive".into()));
        }
        Ok(())
    }
}
