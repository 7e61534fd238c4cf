use scraper::{ElementRef, Html};
use url::Url;

use super::helpers::{dedup_by_key, element_text, selector};
use super::{Extraction, Extractor};
use crate::error::ScrapeResult;
use crate::logging::{LogContext, RequestIdGenerator};
use crate::scraper::{FetchOptions, PageDocument, PageRequest};

/// Shortest text accepted as a headline, after trimming
pub const MIN_HEADLINE_CHARS: usize = 15;

/// Navigation words that disqualify a candidate
const STOPWORDS: &[&str] = &["home", "about", "contact", "login", "register"];

/// Class fragments marking a link as a story link
const HEADLINE_CLASS_HINTS: &[&str] = &["excerpt", "title", "headline"];

impl Extractor {
    /// Headline texts from a page. Static fetch only.
    pub async fn extract_headlines(&self, url: &Url, options: &FetchOptions) -> Extraction<Vec<String>> {
        let context = LogContext::new("extract", "headlines")
            .with_request_id(RequestIdGenerator::generate())
            .with_url(url.as_str());

        let request = PageRequest::new(url.clone(), options.clone());
        let document = match self.fetch_static(&request).await {
            Ok(document) => document,
            Err(e) => {
                let context = context.with_error_category(e.category());
                crate::log_error!(context, e, "Failed to fetch headlines");
                return Extraction::NotFound;
            }
        };

        match parse_headlines(&document) {
            Ok(headlines) => Extraction::from_items(headlines),
            Err(e) => {
                let context = context.with_error_category(e.category());
                crate::log_error!(context, e, "Failed to parse headlines");
                Extraction::NotFound
            }
        }
    }
}

pub fn parse_headlines(document: &PageDocument) -> ScrapeResult<Vec<String>> {
    let html = document.parse();

    let candidates: Vec<String> = candidate_pool(&html)?
        .iter()
        .map(element_text)
        .filter(|text| is_valid_headline(text))
        .collect();

    Ok(dedup_by_key(candidates, |text| text.clone()))
}

/// The first non-empty tier: headings, then story-classed links, then all
/// links. A tier wins on having elements at all, valid or not.
fn candidate_pool(html: &Html) -> ScrapeResult<Vec<ElementRef<'_>>> {
    let headings: Vec<_> = html.select(&selector("h1, h2, h3")?).collect();
    if !headings.is_empty() {
        return Ok(headings);
    }

    let links: Vec<_> = html.select(&selector("a")?).collect();
    let story_links: Vec<_> = links
        .iter()
        .copied()
        .filter(|link| {
            link.value()
                .attr("class")
                .map(|class| class.to_lowercase())
                .map_or(false, |class| HEADLINE_CLASS_HINTS.iter().any(|hint| class.contains(hint)))
        })
        .collect();

    if !story_links.is_empty() {
        Ok(story_links)
    } else {
        Ok(links)
    }
}

pub fn is_valid_headline(text: &str) -> bool {
    if text.chars().count() < MIN_HEADLINE_CHARS {
        return false;
    }
    let lowered = text.to_lowercase();
    !STOPWORDS.iter().any(|word| lowered.contains(word))
}
