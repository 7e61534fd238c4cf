//! webharvest - single-page web data harvesting
//!
//! The library provides:
//! - Plain HTTP and scripted-browser page fetching behind one `PageSource` seam
//! - Extractors for images, text, tables, videos, headlines and document links
//! - Movie, book and marketplace lookups by search term
//! - A session controller that runs one extraction at a time in the background
//! - CSV, JSON and image archive export

pub mod config;
pub mod core;
pub mod error;
pub mod export;
pub mod extract;
pub mod logging;
pub mod scraper;

// Re-export main types for convenience
pub use crate::config::AppConfig;
pub use crate::core::{DataKind, ScrapeSession, SessionObserver, SessionOutcome, Severity};
pub use crate::error::{ScrapeError, ScrapeResult};
pub use crate::export::{ExportFormat, ExportManager};
pub use crate::extract::{ExtractionResult, Extractor};
