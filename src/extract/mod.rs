//! Per-data-kind extraction.
//!
//! Every public operation on [`Extractor`] returns a populated result, an
//! explicit [`Extraction::NotFound`], or an error-shaped record. Failures are
//! logged here and never propagated to the caller.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub mod books;
pub mod documents;
pub mod headlines;
pub mod helpers;
pub mod images;
pub mod movies;
pub mod products;
pub mod tables;
pub mod text;
pub mod videos;

use crate::config::ScrapingConfig;
use crate::error::{ScrapeError, ScrapeResult};
use crate::logging::LogContext;
use crate::scraper::{PageDocument, PageRequest, PageSource};

pub use books::BookDetails;
pub use documents::DocumentLink;
pub use movies::MovieDetails;
pub use products::Product;
pub use tables::Table;

/// Sentinel for a field whose element is structurally absent
pub const NOT_AVAILABLE: &str = "N/A";

/// Outcome of a list- or text-producing extraction
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction<T> {
    Found(T),
    NotFound,
}

impl<T> Extraction<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Extraction::Found(value) => Some(value),
            Extraction::NotFound => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Extraction<U> {
        match self {
            Extraction::Found(value) => Extraction::Found(f(value)),
            Extraction::NotFound => Extraction::NotFound,
        }
    }
}

impl<T> Extraction<Vec<T>> {
    /// Empty lists are "not found"
    pub fn from_items(items: Vec<T>) -> Self {
        if items.is_empty() {
            Extraction::NotFound
        } else {
            Extraction::Found(items)
        }
    }
}

/// A detail record or a single-key error record; never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailRecord<T> {
    Found(T),
    Error { error: String },
}

impl<T> DetailRecord<T> {
    pub fn error(message: impl Into<String>) -> Self {
        DetailRecord::Error { error: message.into() }
    }

    pub fn details(&self) -> Option<&T> {
        match self {
            DetailRecord::Found(details) => Some(details),
            DetailRecord::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            DetailRecord::Found(_) => None,
            DetailRecord::Error { error } => Some(error),
        }
    }
}

/// Named fields of a detail record, in presentation order
pub trait DetailFields {
    fn fields(&self) -> Vec<(&'static str, &str)>;
}

impl DetailFields for MovieDetails {
    fn fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("name", self.name.as_str()),
            ("poster_url", self.poster_url.as_str()),
            ("year", self.year.as_str()),
            ("rating", self.rating.as_str()),
            ("plot", self.plot.as_str()),
            ("genre", self.genre.as_str()),
            ("movie_link", self.movie_link.as_str()),
        ]
    }
}

impl DetailFields for BookDetails {
    fn fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("name", self.name.as_str()),
            ("cover_url", self.cover_url.as_str()),
            ("author", self.author.as_str()),
            ("year", self.year.as_str()),
            ("rating", self.rating.as_str()),
            ("description", self.description.as_str()),
            ("book_link", self.book_link.as_str()),
        ]
    }
}

/// Error record for a failed detail lookup: transport failures are
/// "Network error", anything else is "Unexpected error"
pub(crate) fn failure_record<T>(error: &ScrapeError) -> DetailRecord<T> {
    match error {
        ScrapeError::Network { message } => DetailRecord::error(format!("Network error: {}", message)),
        e if e.is_network() => DetailRecord::error(format!("Network error: {}", e)),
        e => DetailRecord::error(format!("Unexpected error: {}", e)),
    }
}

/// Result of one extraction call, tagged by data kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ExtractionResult {
    Images(Vec<String>),
    Text(String),
    Tables(Vec<Table>),
    Movie(DetailRecord<MovieDetails>),
    Book(DetailRecord<BookDetails>),
    Videos(Vec<String>),
    Products(Vec<Product>),
    Headlines(Vec<String>),
    DocumentLinks(Vec<DocumentLink>),
}

impl ExtractionResult {
    /// Number of items, for status messages
    pub fn item_count(&self) -> usize {
        match self {
            ExtractionResult::Images(urls) | ExtractionResult::Videos(urls) => urls.len(),
            ExtractionResult::Text(text) => usize::from(!text.is_empty()),
            ExtractionResult::Tables(tables) => tables.len(),
            ExtractionResult::Movie(record) => usize::from(record.details().is_some()),
            ExtractionResult::Book(record) => usize::from(record.details().is_some()),
            ExtractionResult::Products(products) => products.len(),
            ExtractionResult::Headlines(headlines) => headlines.len(),
            ExtractionResult::DocumentLinks(links) => links.len(),
        }
    }

    /// Error message of a movie or book error record
    pub fn error_message(&self) -> Option<&str> {
        match self {
            ExtractionResult::Movie(record) => record.error_message(),
            ExtractionResult::Book(record) => record.error_message(),
            _ => None,
        }
    }
}

/// Timeouts used by the rendered tier
#[derive(Debug, Clone, Copy)]
pub struct RenderTimeouts {
    /// Bound for waiting on the element a page is expected to contain
    pub element: Duration,
    /// Bound for waiting on links after the document-link click attempt
    pub documents: Duration,
}

impl Default for RenderTimeouts {
    fn default() -> Self {
        Self {
            element: Duration::from_secs(10),
            documents: Duration::from_secs(15),
        }
    }
}

impl From<&ScrapingConfig> for RenderTimeouts {
    fn from(config: &ScrapingConfig) -> Self {
        Self {
            element: config.browser_timeout(),
            documents: config.document_wait_timeout(),
        }
    }
}

/// Whether a failed static fetch still goes on to the rendered tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FetchFailure {
    GiveUp,
    Render,
}

/// Runs extractions against a static and a rendered page source
#[derive(Clone)]
pub struct Extractor {
    fetcher: Arc<dyn PageSource>,
    renderer: Arc<dyn PageSource>,
    timeouts: RenderTimeouts,
}

impl Extractor {
    pub fn new(fetcher: Arc<dyn PageSource>, renderer: Arc<dyn PageSource>, timeouts: RenderTimeouts) -> Self {
        Self {
            fetcher,
            renderer,
            timeouts,
        }
    }

    pub(crate) fn timeouts(&self) -> RenderTimeouts {
        self.timeouts
    }

    /// Fetch through the static tier only
    pub(crate) async fn fetch_static(&self, request: &PageRequest) -> ScrapeResult<PageDocument> {
        self.fetcher.fetch_page(request).await
    }

    /// Fetch through the rendered tier only
    pub(crate) async fn fetch_rendered(&self, request: &PageRequest) -> ScrapeResult<PageDocument> {
        self.renderer.fetch_page(request).await
    }

    /// Static pass first, rendered pass when the static pass finds nothing.
    ///
    /// `parse_static` and `parse_rendered` are separate so a kind may apply
    /// different rules per tier.
    pub(crate) async fn with_fallback<T>(
        &self,
        context: LogContext,
        static_request: &PageRequest,
        rendered_request: &PageRequest,
        on_fetch_failure: FetchFailure,
        parse_static: impl Fn(&PageDocument) -> ScrapeResult<Vec<T>>,
        parse_rendered: impl Fn(&PageDocument) -> ScrapeResult<Vec<T>>,
    ) -> Extraction<Vec<T>> {
        match self.fetcher.fetch_page(static_request).await {
            Ok(document) => match parse_static(&document) {
                Ok(items) if !items.is_empty() => {
                    debug!(count = items.len(), tier = %self.fetcher.kind(), "Static pass found items");
                    return Extraction::Found(items);
                }
                Ok(_) => {
                    info!(operation = %context.operation, url = %static_request.url, "Nothing found in static pass, trying rendered page");
                }
                Err(e) => {
                    let context = context.with_error_category(e.category());
                    crate::log_error!(context, e, "Static pass failed while parsing");
                    return Extraction::NotFound;
                }
            },
            Err(e) => {
                let failed = context
                    .clone()
                    .with_error_category(e.category())
                    .with_string_field("error", e.to_string());
                crate::log_warn!(failed, "Static fetch failed");
                if on_fetch_failure == FetchFailure::GiveUp {
                    return Extraction::NotFound;
                }
            }
        }

        self.rendered_pass(context, rendered_request, parse_rendered).await
    }

    /// Rendered tier only, logging failures and mapping them to not-found
    pub(crate) async fn rendered_pass<T>(
        &self,
        context: LogContext,
        request: &PageRequest,
        parse: impl Fn(&PageDocument) -> ScrapeResult<Vec<T>>,
    ) -> Extraction<Vec<T>> {
        let document = match self.renderer.fetch_page(request).await {
            Ok(document) => document,
            Err(e) => {
                warn!(url = %request.url, category = e.category(), "Rendered fetch failed: {}", e);
                return Extraction::NotFound;
            }
        };

        match parse(&document) {
            Ok(items) => {
                debug!(count = items.len(), tier = %self.renderer.kind(), "Rendered pass finished");
                Extraction::from_items(items)
            }
            Err(e) => {
                let context = context.with_error_category(e.category());
                crate::log_error!(context, e, "Rendered pass failed while parsing");
                Extraction::NotFound
            }
        }
    }
}
