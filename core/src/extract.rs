use crate::error::Result;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref SEL_BOLD: Selector = Selector::parse("b, strong").expect("valid selector");
    static ref SEL_TITLE: Selector = Selector::parse("title").expect("valid selector");
    static ref SEL_HEADER: Selector = Selector::parse("h1, h2, h3, h4, h5").expect("valid selector");
}

/// A document as it arrives from the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub url: String,
    pub content: String,
}

impl RawDocument {
    pub fn new(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self { url: url.into(), content: content.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedDocument {
    pub url: String,
    pub plain_text: String,
    pub bold: Vec<String>,
    pub title: Vec<String>,
    pub headers: Vec<String>,
}

pub trait Extractor: Send + Sync {
    fn extract(&self, raw: &RawDocument) -> Result<ExtractedDocument>;
}

/// Pulls visible text and emphasized fragments out of HTML.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl Extractor for HtmlExtractor {
    fn extract(&self, raw: &RawDocument) -> Result<ExtractedDocument> {
        let doc = Html::parse_document(&raw.content);
        let collect = |sel: &Selector| -> Vec<String> {
            doc.select(sel)
                .map(|n| n.text().collect::<String>())
                .filter(|s| !s.trim().is_empty())
                .collect()
        };
        let plain_text = doc
            .root_element()
            .text()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(ExtractedDocument {
            url: raw.url.clone(),
            plain_text,
            bold: collect(&SEL_BOLD),
            title: collect(&SEL_TITLE),
            headers: collect(&SEL_HEADER),
        })
    }
}
