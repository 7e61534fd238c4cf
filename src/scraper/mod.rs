//! Page sources: the plain HTTP fetcher and the scripted-browser fetcher.
//!
//! Both implement [`PageSource`], so each extractor can try them as a fixed
//! fallback chain without knowing how a page was obtained.

use async_trait::async_trait;
use scraper::Html;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

pub mod browser;
pub mod http_client;

use crate::error::ScrapeResult;

pub use browser::BrowserClient;
pub use http_client::HttpClient;

/// Header set and timeout for a single fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub headers: HashMap<String, String>,
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Which tier produced a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Static,
    Rendered,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Static => write!(f, "static"),
            SourceKind::Rendered => write!(f, "rendered"),
        }
    }
}

/// Everything either source may need to produce a page.
///
/// The static fetcher reads `options`; the rendered fetcher reads
/// `wait_for`, `click_candidates` and `wait_timeout`.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub url: Url,
    pub options: FetchOptions,
    pub wait_for: Option<String>,
    pub click_candidates: Vec<String>,
    pub wait_timeout: Duration,
}

impl PageRequest {
    pub fn new(url: Url, options: FetchOptions) -> Self {
        Self {
            url,
            options,
            wait_for: None,
            click_candidates: Vec::new(),
            wait_timeout: Duration::from_secs(10),
        }
    }

    pub fn wait_for(mut self, selector: impl Into<String>, timeout: Duration) -> Self {
        self.wait_for = Some(selector.into());
        self.wait_timeout = timeout;
        self
    }

    pub fn click_first_of(mut self, candidates: &[&str]) -> Self {
        self.click_candidates = candidates.iter().map(|c| c.to_string()).collect();
        self
    }
}

/// Markup of one fetched page together with the URL it was fetched from.
///
/// The parsed tree (`scraper::Html`) is not `Send`, so documents carry the
/// raw markup and are parsed inside the synchronous extraction step.
#[derive(Debug, Clone)]
pub struct PageDocument {
    url: Url,
    markup: String,
}

impl PageDocument {
    pub fn new(url: Url, markup: impl Into<String>) -> Self {
        Self {
            url,
            markup: markup.into(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn parse(&self) -> Html {
        Html::parse_document(&self.markup)
    }
}

/// A way of turning a URL into a page document
#[async_trait]
pub trait PageSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn fetch_page(&self, request: &PageRequest) -> ScrapeResult<PageDocument>;
}
