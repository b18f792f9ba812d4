use crate::codec::sanitize_term;
use crate::error::Result;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer as Snowball};
use std::collections::HashSet;
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*|\p{N}+").expect("valid regex");
    static ref ENGLISH: Snowball = Snowball::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

pub fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Splits text into words, in order.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<Vec<String>>;
}

/// Reduces a word to its root form. Must be deterministic.
pub trait Stemmer: Send + Sync {
    fn stem(&self, word: &str) -> Result<String>;
}

/// NFKC-normalized, lowercased words and numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer {
    pub remove_stopwords: bool,
}

impl WordTokenizer {
    pub fn new(remove_stopwords: bool) -> Self { Self { remove_stopwords } }
}

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        Ok(RE
            .find_iter(&normalized)
            .map(|m| m.as_str())
            .filter(|token| !(self.remove_stopwords && is_stopword(token)))
            .map(str::to_string)
            .collect())
    }
}

/// English Snowball stemmer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnowballStemmer;

impl Stemmer for SnowballStemmer {
    fn stem(&self, word: &str) -> Result<String> {
        Ok(ENGLISH.stem(word).into_owned())
    }
}

/// Tokenizer followed by stemmer, producing index-safe terms.
#[derive(Clone)]
pub struct Analyzer {
    tokenizer: Arc<dyn Tokenizer>,
    stemmer: Arc<dyn Stemmer>,
}

impl Analyzer {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, stemmer: Arc<dyn Stemmer>) -> Self {
        Self { tokenizer, stemmer }
    }

    pub fn english(remove_stopwords: bool) -> Self {
        Self::new(Arc::new(WordTokenizer::new(remove_stopwords)), Arc::new(SnowballStemmer))
    }

    /// Stemmed terms of `text` in order; tokens that sanitize to nothing are
    /// dropped.
    pub fn analyze(&self, text: &str) -> Result<Vec<String>> {
        let mut terms = Vec::new();
        for token in self.tokenizer.tokenize(text)? {
            let stemmed = self.stemmer.stem(&token)?;
            let term = sanitize_term(&stemmed);
            if !term.is_empty() {
                terms.push(term.into_owned());
            }
        }
        Ok(terms)
    }
}

impl Default for Analyzer {
    fn default() -> Self { Self::english(false) }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = Analyzer::default().analyze("Running, runner's run!").unwrap();
        assert!(t.iter().any(|w| w == "run"));
    }

    #[test]
    fn keeps_numbers_and_order() {
        let t = WordTokenizer::default().tokenize("Route 66 is OPEN").unwrap();
        assert_eq!(t, vec!["route", "66", "is", "open"]);
    }
}
