use serde::{Deserialize, Serialize};
use url::Url;

use super::helpers::{dedup_by_key, has_http_scheme, selector};
use super::{Extraction, Extractor, FetchFailure};
use crate::error::ScrapeResult;
use crate::logging::{LogContext, RequestIdGenerator};
use crate::scraper::{FetchOptions, PageDocument, PageRequest};

/// Button texts worth clicking to reveal document lists
const REVEAL_BUTTONS: &[&str] = &["Documents", "Resources", "Show More"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLink {
    pub url: String,
    pub name: String,
}

impl DocumentLink {
    fn from_href(url: String) -> Self {
        let name = display_name(&url);
        Self { url, name }
    }
}

impl Extractor {
    /// PDF links on a page, unique by URL.
    ///
    /// The static pass only trusts absolute links. The rendered pass also
    /// accepts relative ones and is tried on a failed or empty static pass.
    pub async fn extract_document_links(&self, url: &Url, options: &FetchOptions) -> Extraction<Vec<DocumentLink>> {
        let context = LogContext::new("extract", "document_links")
            .with_request_id(RequestIdGenerator::generate())
            .with_url(url.as_str());

        let static_request = PageRequest::new(url.clone(), options.clone());
        let rendered_request = PageRequest::new(url.clone(), options.clone())
            .click_first_of(REVEAL_BUTTONS)
            .wait_for("a", self.timeouts().documents);

        self.with_fallback(
            context,
            &static_request,
            &rendered_request,
            FetchFailure::Render,
            parse_absolute_links,
            parse_rendered_links,
        )
        .await
    }
}

/// Absolute http(s) links ending in `.pdf`
pub fn parse_absolute_links(document: &PageDocument) -> ScrapeResult<Vec<DocumentLink>> {
    let links = pdf_hrefs(document)?
        .into_iter()
        .filter(|href| has_http_scheme(href))
        .map(DocumentLink::from_href)
        .collect();

    Ok(dedup_by_key(links, |link: &DocumentLink| link.url.clone()))
}

/// Links ending in `.pdf`; relative ones are appended to the parent path
/// of the page URL
pub fn parse_rendered_links(document: &PageDocument) -> ScrapeResult<Vec<DocumentLink>> {
    let page = document.url().as_str();
    let base = page.rsplit_once('/').map_or(page, |(parent, _)| parent);

    let links = pdf_hrefs(document)?
        .into_iter()
        .map(|href| {
            if has_http_scheme(&href) {
                href
            } else {
                format!("{}/{}", base, href.trim_start_matches('/'))
            }
        })
        .map(DocumentLink::from_href)
        .collect();

    Ok(dedup_by_key(links, |link: &DocumentLink| link.url.clone()))
}

fn pdf_hrefs(document: &PageDocument) -> ScrapeResult<Vec<String>> {
    let html = document.parse();
    let anchors = selector("a[href]")?;

    Ok(html
        .select(&anchors)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter(|href| href.to_lowercase().ends_with(".pdf"))
        .map(String::from)
        .collect())
}

/// Last path segment with any query string removed
pub fn display_name(url: &str) -> String {
    let segment = url.rsplit('/').next().unwrap_or_default();
    segment.split('?').next().unwrap_or_default().to_string()
}
