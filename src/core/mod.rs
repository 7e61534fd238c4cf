//! Session controller: runs one extraction at a time on a background task
//! and reports to a presentation observer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;

pub mod downloads;
pub mod kinds;

use crate::config::{AppConfig, ScrapingConfig};
use crate::error::{ScrapeError, ScrapeResult};
use crate::extract::{ExtractionResult, Extractor, RenderTimeouts};
use crate::logging::{LogContext, PerformanceLogger, RequestIdGenerator};
use crate::scraper::{BrowserClient, FetchOptions, HttpClient};

pub use downloads::{download_document, download_images, ImagePayload};
pub use kinds::{normalize_input, DataKind};

/// Interval between progress reports while an extraction runs
const PROGRESS_TICK: Duration = Duration::from_millis(100);
const PROGRESS_STEP: f32 = 0.05;
const PROGRESS_CEILING: f32 = 0.95;

/// How a status message should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Presentation boundary. Implementations must be cheap; they are called
/// from the background task.
pub trait SessionObserver: Send + Sync {
    fn notify_result(&self, outcome: &SessionOutcome);
    fn notify_progress(&self, fraction: f32);
    fn notify_status(&self, message: &str, severity: Severity);
}

/// Result of one completed extraction
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Found(ExtractionResult),
    NotFound(DataKind),
}

impl SessionOutcome {
    pub fn result(&self) -> Option<&ExtractionResult> {
        match self {
            SessionOutcome::Found(result) => Some(result),
            SessionOutcome::NotFound(_) => None,
        }
    }

    /// Status line for the outcome. Error records count as nothing found.
    pub fn status(&self, kind: DataKind) -> (String, Severity) {
        match self {
            SessionOutcome::Found(result) => match result.error_message() {
                Some(reason) => (format!("No {} found: {}", kind, reason), Severity::Error),
                None => (format!("Found {} {}", result.item_count(), kind), Severity::Success),
            },
            SessionOutcome::NotFound(kind) => (format!("No {} found", kind), Severity::Error),
        }
    }
}

/// Clears the busy flag when the worker ends, however it ends
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One user session. At most one extraction is in flight at a time.
pub struct ScrapeSession {
    config: Arc<AppConfig>,
    extractor: Extractor,
    http: HttpClient,
    observer: Arc<dyn SessionObserver>,
    busy: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
    outcome: Arc<RwLock<Option<SessionOutcome>>>,
}

impl ScrapeSession {
    /// Build a session with the HTTP fetcher and the browser fetcher
    pub fn new(config: AppConfig, observer: Arc<dyn SessionObserver>) -> ScrapeResult<Self> {
        let http = HttpClient::new()?;
        let browser = BrowserClient::new(config.scraping.user_agent.clone(), config.scraping.page_load_timeout());
        let extractor = Extractor::new(
            Arc::new(http.clone()),
            Arc::new(browser),
            RenderTimeouts::from(&config.scraping),
        );

        Ok(Self::with_extractor(config, extractor, http, observer))
    }

    pub fn with_extractor(
        config: AppConfig,
        extractor: Extractor,
        http: HttpClient,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            extractor,
            http,
            observer,
            busy: Arc::new(AtomicBool::new(false)),
            cancelled: Arc::new(AtomicBool::new(false)),
            outcome: Arc::new(RwLock::new(None)),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Validate the input and start an extraction on a background task.
    ///
    /// The previously held outcome is discarded.
    pub async fn start(&self, kind: DataKind, raw_input: &str) -> ScrapeResult<JoinHandle<()>> {
        let input = match normalize_input(kind, raw_input) {
            Ok(input) => input,
            Err(e) => {
                self.observer.notify_status(&e.to_string(), Severity::Error);
                return Err(e);
            }
        };

        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Refusing to start {} extraction while another is running", kind);
            return Err(ScrapeError::SessionBusy);
        }

        let guard = BusyGuard(self.busy.clone());
        self.cancelled.store(false, Ordering::SeqCst);
        *self.outcome.write().await = None;

        self.observer.notify_progress(0.0);
        self.observer.notify_status("Scraping started", Severity::Info);

        let worker = Worker {
            extractor: self.extractor.clone(),
            config: self.config.clone(),
            observer: self.observer.clone(),
            cancelled: self.cancelled.clone(),
            outcome: self.outcome.clone(),
        };

        Ok(tokio::spawn(async move {
            let _guard = guard;
            worker.run(kind, input).await;
        }))
    }

    /// Ask the running extraction to be discarded. The extraction itself
    /// still runs to completion or to its own timeout.
    pub fn cancel(&self) -> bool {
        if !self.is_busy() {
            return false;
        }
        self.cancelled.store(true, Ordering::SeqCst);
        self.observer.notify_status("Scraping cancelled", Severity::Warning);
        true
    }

    /// The outcome of the last completed, non-cancelled extraction
    pub async fn result(&self) -> Option<SessionOutcome> {
        self.outcome.read().await.clone()
    }

    /// Download image bytes through the bounded pool
    pub async fn download_images(&self, urls: &[String]) -> Vec<ImagePayload> {
        let scraping = &self.config.scraping;
        let options = FetchOptions {
            timeout: scraping.image_download_timeout(),
            ..scraping.fetch_options()
        };
        download_images(&self.http, urls, &options, scraping.image_download_concurrency).await
    }

    /// Save a document link into the configured output directory
    pub async fn download_document(&self, link: &crate::extract::DocumentLink) -> ScrapeResult<std::path::PathBuf> {
        let directory = self.config.export.output_directory.clone();
        let result = download_document(&self.http, link, &directory, &self.config.scraping.fetch_options()).await;

        match &result {
            Ok(_) => self.observer.notify_status(&format!("PDF downloaded: {}", link.name), Severity::Success),
            Err(e) => self
                .observer
                .notify_status(&format!("Failed to download PDF: {}", e), Severity::Error),
        }
        result
    }
}

struct Worker {
    extractor: Extractor,
    config: Arc<AppConfig>,
    observer: Arc<dyn SessionObserver>,
    cancelled: Arc<AtomicBool>,
    outcome: Arc<RwLock<Option<SessionOutcome>>>,
}

impl Worker {
    async fn run(self, kind: DataKind, input: String) {
        let context = LogContext::new("session", "extract")
            .with_request_id(RequestIdGenerator::generate())
            .with_string_field("kind", kind.to_string());
        let perf = PerformanceLogger::new(context);

        let extraction = run_extraction(&self.extractor, &self.config.scraping, kind, &input);
        tokio::pin!(extraction);

        let mut ticker = tokio::time::interval(PROGRESS_TICK);
        let mut progress = 0.0;

        let outcome = loop {
            tokio::select! {
                outcome = &mut extraction => break outcome,
                _ = ticker.tick() => {
                    progress = next_progress(progress);
                    self.observer.notify_progress(progress);
                }
            }
        };

        if self.cancelled.load(Ordering::SeqCst) {
            info!("Discarding {} result after cancellation", kind);
            perf.finish_with_status("Extraction finished after cancel", "cancelled");
            return;
        }

        let (message, severity) = outcome.status(kind);
        *self.outcome.write().await = Some(outcome.clone());

        self.observer.notify_progress(1.0);
        self.observer.notify_result(&outcome);
        self.observer.notify_status(&message, severity);

        let status = if outcome.result().is_some() { "found" } else { "not_found" };
        perf.finish_with_status("Extraction finished", status);
    }
}

/// Progress after one more tick, never reaching completion on its own
pub fn next_progress(current: f32) -> f32 {
    (current + PROGRESS_STEP).min(PROGRESS_CEILING)
}

/// Run the extractor for one data kind against already-normalized input
pub async fn run_extraction(extractor: &Extractor, config: &ScrapingConfig, kind: DataKind, input: &str) -> SessionOutcome {
    let options = config.fetch_options();

    if !kind.takes_url() {
        return match kind {
            DataKind::MovieDetails => {
                SessionOutcome::Found(ExtractionResult::Movie(extractor.extract_movie_details(input, &options).await))
            }
            DataKind::BookDetails => {
                SessionOutcome::Found(ExtractionResult::Book(extractor.extract_book_details(input, &options).await))
            }
            _ => into_outcome(kind, extractor.extract_products(input, &options).await.map(ExtractionResult::Products)),
        };
    }

    let url = match Url::parse(input) {
        Ok(url) => url,
        Err(e) => {
            warn!("Cannot extract {} from '{}': {}", kind, input, e);
            return SessionOutcome::NotFound(kind);
        }
    };

    let extraction = match kind {
        DataKind::Images => extractor
            .extract_images(&url, config.image_format, &options)
            .await
            .map(ExtractionResult::Images),
        DataKind::Text => extractor.extract_text(&url, &options).await.map(ExtractionResult::Text),
        DataKind::Tables => extractor
            .extract_tables(&url, options.timeout)
            .await
            .map(ExtractionResult::Tables),
        DataKind::Videos => extractor
            .extract_videos(&url, config.video_format, &options)
            .await
            .map(ExtractionResult::Videos),
        DataKind::Headlines => extractor
            .extract_headlines(&url, &options)
            .await
            .map(ExtractionResult::Headlines),
        _ => extractor
            .extract_document_links(&url, &options)
            .await
            .map(ExtractionResult::DocumentLinks),
    };

    into_outcome(kind, extraction)
}

fn into_outcome(kind: DataKind, extraction: crate::extract::Extraction<ExtractionResult>) -> SessionOutcome {
    match extraction.into_option() {
        Some(result) => SessionOutcome::Found(result),
        None => SessionOutcome::NotFound(kind),
    }
}

/// The first `limit` items, or all of them when unbounded
pub fn apply_display_limit<T>(items: &[T], limit: Option<usize>) -> &[T] {
    match limit {
        Some(limit) => &items[..limit.min(items.len())],
        None => items,
    }
}
