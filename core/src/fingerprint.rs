//! Simhash fingerprints for near-duplicate detection.
//!
//! A fingerprint is a per-bit majority vote over the hashes of a token
//! stream. Repeating a token in the input gives it more votes.

use crate::index::DocId;
use sha1::{Digest, Sha1};

pub const MAX_BITS: u32 = 128;

pub type Fingerprint = u128;

/// 128-bit hash of a token: the leading 16 bytes of its SHA-1 digest.
pub fn hash_token(token: &str) -> u128 {
    let digest = Sha1::digest(token.as_bytes());
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&digest[..16]);
    u128::from_be_bytes(buf)
}

/// Computes the simhash of `tokens` over the low `bits` bits.
pub fn fingerprint<I, S>(tokens: I, bits: u32) -> Fingerprint
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let bits = bits.clamp(1, MAX_BITS) as usize;
    let mut votes = vec![0i64; bits];
    for token in tokens {
        let hash = hash_token(token.as_ref());
        for (i, vote) in votes.iter_mut().enumerate() {
            if hash & (1u128 << i) != 0 {
                *vote += 1;
            } else {
                *vote -= 1;
            }
        }
    }
    votes
        .iter()
        .enumerate()
        .filter(|(_, vote)| **vote >= 0)
        .fold(0u128, |fp, (i, _)| fp | (1u128 << i))
}

/// Fraction of matching bits in `[0, 1]`.
pub fn similarity(a: Fingerprint, b: Fingerprint, bits: u32) -> f64 {
    if a == b {
        return 1.0;
    }
    let bits = bits.clamp(1, MAX_BITS);
    let differing = (a ^ b).count_ones().min(bits);
    1.0 - f64::from(differing) / f64::from(bits)
}

/// Fingerprints seen so far in one indexing run.
///
/// Lookups scan every entry, so a full build is quadratic in the number of
/// documents. The table has to fit in memory.
#[derive(Debug, Clone)]
pub struct FingerprintTable {
    bits: u32,
    entries: Vec<(DocId, Fingerprint)>,
}

impl FingerprintTable {
    pub fn new(bits: u32) -> Self {
        Self { bits: bits.clamp(1, MAX_BITS), entries: Vec::new() }
    }

    pub fn bits(&self) -> u32 { self.bits }

    pub fn insert(&mut self, doc_id: DocId, fp: Fingerprint) {
        self.entries.push((doc_id, fp));
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Returns the first prior document whose similarity reaches `threshold`.
    pub fn find_duplicate(&self, candidate: Fingerprint, threshold: f64) -> Option<DocId> {
        self.entries
            .iter()
            .find(|(_, seen)| similarity(candidate, *seen, self.bits) >= threshold)
            .map(|(doc_id, _)| *doc_id)
    }

    pub fn is_duplicate_of_any(&self, candidate: Fingerprint, threshold: f64) -> bool {
        self.find_duplicate(candidate, threshold).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<&str> {
        text.split_whitespace().collect()
    }

    #[test]
    fn hash_is_deterministic_and_wide() {
        assert_eq!(hash_token("rust"), hash_token("rust"));
        assert_ne!(hash_token("rust"), hash_token("Rust"));
        // sha1("") starts with da39a3ee5e6b4b0d3255bfef95601890
        assert_eq!(hash_token(""), 0xda39a3ee5e6b4b0d3255bfef95601890);
    }

    #[test]
    fn fingerprint_is_stable() {
        let tokens = words("the quick brown fox jumps over the lazy dog");
        assert_eq!(fingerprint(&tokens, 128), fingerprint(&tokens, 128));
    }

    #[test]
    fn single_token_fingerprint_is_its_hash() {
        assert_eq!(fingerprint(["fox"], 128), hash_token("fox"));
        assert_eq!(fingerprint(["fox"], 64), hash_token("fox") & u128::from(u64::MAX));
    }

    #[test]
    fn repeated_tokens_outvote_single_ones() {
        let fp = fingerprint(["fox", "fox", "fox", "dog"], 128);
        assert_eq!(fp, hash_token("fox"));
    }

    #[test]
    fn empty_input_sets_every_bit() {
        assert_eq!(fingerprint(Vec::<String>::new(), 128), u128::MAX);
        assert_eq!(fingerprint(Vec::<String>::new(), 8), 0xff);
    }

    #[test]
    fn similarity_counts_matching_bits() {
        assert_eq!(similarity(42, 42, 128), 1.0);
        assert_eq!(similarity(0, u128::MAX, 128), 0.0);
        assert_eq!(similarity(0b1111, 0b0000, 8), 0.5);
        assert_eq!(similarity(0b1, 0b0, 128), 1.0 - 1.0 / 128.0);
    }

    #[test]
    fn near_duplicates_score_higher_than_unrelated_text() {
        let a = fingerprint(words("rust is a systems programming language with a strong type system and fearless concurrency"), 128);
        let b = fingerprint(words("rust is a systems programming language with a strong type system and fearless concurrency today"), 128);
        let c = fingerprint(words("bake the bread at two hundred degrees until the crust turns golden"), 128);
        assert!(similarity(a, b, 128) > similarity(a, c, 128));
    }

    #[test]
    fn table_detects_duplicates_against_any_prior_entry() {
        let mut table = FingerprintTable::new(128);
        assert!(!table.is_duplicate_of_any(7, 0.9));
        table.insert(0, u128::MAX);
        table.insert(1, 7);
        assert!(table.is_duplicate_of_any(7, 1.0));
        assert_eq!(table.find_duplicate(7, 1.0), Some(1));
        assert!(!table.is_duplicate_of_any(0, 0.99));
        assert!(table.is_duplicate_of_any(0, 0.0));
        assert_eq!(table.len(), 2);
    }
}
