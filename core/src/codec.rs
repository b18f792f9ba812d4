//! Line codec for the postings file.
//!
//! Every line holds one term's posting list:
//!
//! ```text
//! term<>doc_id,weight|doc_id,weight|...
//! ```
//!
//! Weights are always parsed as `f64`; raw counts written as `3` and tf-idf
//! scores written as `0.47712125471966244` decode the same way.

use crate::index::{DocId, Posting};
use std::borrow::Cow;
use std::fmt::Write as _;
use thiserror::Error;

pub const DELIMITER: &str = "<>";
const POSTING_SEPARATOR: char = '|';
const FIELD_SEPARATOR: char = ',';

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error("line has no `<>` delimiter")]
    MissingDelimiter,
    #[error("posting `{0}` does not have exactly two fields")]
    MalformedPosting(String),
    #[error("invalid document id `{0}`")]
    InvalidDocId(String),
    #[error("invalid weight `{0}`")]
    InvalidWeight(String),
    #[error("term {0:?} is empty or contains a reserved sequence")]
    InvalidTerm(String),
    #[error("expected term {expected:?}, found {found:?}")]
    TermMismatch { expected: String, found: String },
    #[error("term {0:?} appears more than once")]
    DuplicateTerm(String),
}

pub fn is_valid_term(term: &str) -> bool {
    !term.is_empty() && !term.contains(DELIMITER) && !term.contains(['\n', '\r'])
}

/// Strips everything from `term` that would break the line format.
pub fn sanitize_term(term: &str) -> Cow<'_, str> {
    if is_valid_term(term) || term.is_empty() {
        return Cow::Borrowed(term);
    }
    let mut cleaned: String = term.chars().filter(|c| *c != '\n' && *c != '\r').collect();
    while cleaned.contains(DELIMITER) {
        cleaned = cleaned.replace(DELIMITER, "");
    }
    Cow::Owned(cleaned)
}

/// Encodes one line, without the trailing newline.
pub fn encode_line(term: &str, postings: &[Posting]) -> Result<String, CodecError> {
    if !is_valid_term(term) {
        return Err(CodecError::InvalidTerm(term.to_string()));
    }
    let mut line = String::with_capacity(term.len() + DELIMITER.len() + postings.len() * 12);
    line.push_str(term);
    line.push_str(DELIMITER);
    for (i, p) in postings.iter().enumerate() {
        if i > 0 {
            line.push(POSTING_SEPARATOR);
        }
        // Writing into a String cannot fail.
        let _ = write!(line, "{}{}{}", p.doc_id, FIELD_SEPARATOR, p.weight);
    }
    Ok(line)
}

/// Returns the term of a line without decoding its postings.
pub fn split_term(line: &str) -> Result<(&str, &str), CodecError> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.split_once(DELIMITER).ok_or(CodecError::MissingDelimiter)
}

/// Decodes one line (a trailing newline is tolerated).
pub fn decode_line(line: &str) -> Result<(&str, Vec<Posting>), CodecError> {
    let (term, payload) = split_term(line)?;
    Ok((term, decode_postings(payload)?))
}

pub fn decode_postings(payload: &str) -> Result<Vec<Posting>, CodecError> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    payload.split(POSTING_SEPARATOR).map(decode_posting).collect()
}

fn decode_posting(segment: &str) -> Result<Posting, CodecError> {
    let mut fields = segment.split(FIELD_SEPARATOR);
    let (doc, weight) = match (fields.next(), fields.next(), fields.next()) {
        (Some(doc), Some(weight), None) => (doc, weight),
        _ => return Err(CodecError::MalformedPosting(segment.to_string())),
    };
    let doc_id: DocId = doc.parse().map_err(|_| CodecError::InvalidDocId(doc.to_string()))?;
    let weight: f64 = weight.parse().map_err(|_| CodecError::InvalidWeight(weight.to_string()))?;
    Ok(Posting { doc_id, weight })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_raw_and_scored_weights() {
        let postings = vec![
            Posting::new(0, 3.0),
            Posting::new(17, 0.47712125471966244),
            Posting::new(4, 1.5),
        ];
        let line = encode_line("cat", &postings).unwrap();
        assert_eq!(line, "cat<>0,3|17,0.47712125471966244|4,1.5");
        let (term, decoded) = decode_line(&line).unwrap();
        assert_eq!(term, "cat");
        assert_eq!(decoded, postings);
    }

    #[test]
    fn integer_and_float_weights_parse_alike() {
        let (_, a) = decode_line("x<>1,2\n").unwrap();
        let (_, b) = decode_line("x<>1,2.0").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_payload_is_empty_list() {
        assert!(decode_line("x<>").unwrap().1.is_empty());
        assert_eq!(encode_line("x", &[]).unwrap(), "x<>");
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(decode_line("cat 1,2").unwrap_err(), CodecError::MissingDelimiter);
        assert!(matches!(decode_line("cat<>1,2,3"), Err(CodecError::MalformedPosting(_))));
        assert!(matches!(decode_line("cat<>1"), Err(CodecError::MalformedPosting(_))));
        assert!(matches!(decode_line("cat<>a,2"), Err(CodecError::InvalidDocId(_))));
        assert!(matches!(decode_line("cat<>1,x"), Err(CodecError::InvalidWeight(_))));
    }

    #[test]
    fn term_containing_delimiter_is_rejected_and_sanitized() {
        assert!(matches!(encode_line("a<>b", &[]), Err(CodecError::InvalidTerm(_))));
        assert!(matches!(encode_line("", &[]), Err(CodecError::InvalidTerm(_))));
        assert_eq!(sanitize_term("a<>b"), "ab");
        assert_eq!(sanitize_term("a<<>>b"), "ab");
        assert_eq!(sanitize_term("li\nne"), "line");
        assert!(matches!(sanitize_term("plain"), Cow::Borrowed("plain")));
    }
}
