use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use webharvest::config::ConfigOverrides;
use webharvest::core::apply_display_limit;
use webharvest::extract::documents::display_name;
use webharvest::extract::{DetailFields, DetailRecord, DocumentLink};
use webharvest::logging::{LogContext, RequestIdGenerator};
use webharvest::{
    AppConfig, DataKind, ExportFormat, ExportManager, ExtractionResult, ScrapeSession, SessionObserver,
    SessionOutcome, Severity,
};

#[derive(Parser)]
#[command(name = "webharvest")]
#[command(about = "Harvest images, text, tables, media, listings, headlines and document links from a page")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    verbose: bool,

    #[arg(short, long, global = true, help = "Configuration file path")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract one kind of data from a URL or search term
    Scrape {
        #[arg(help = "Data kind, e.g. images, tables, movie-details, pdf-links")]
        kind: DataKind,

        #[arg(help = "Page URL, or a search term for movie, book and product lookups")]
        input: String,

        #[arg(short, long, help = "Image or video format filter")]
        format: Option<String>,

        #[arg(short, long, help = "Maximum number of items to print, non-positive for all")]
        limit: Option<i64>,

        #[arg(short, long, help = "Export format: csv, json or archive")]
        export: Option<ExportFormat>,

        #[arg(short, long, help = "Export file path")]
        output: Option<PathBuf>,
    },

    /// Download one document link
    Download {
        #[arg(help = "Document URL")]
        url: String,

        #[arg(short, long, help = "Directory to save into")]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path).await?,
        None => AppConfig::load().await?,
    };
    ConfigOverrides::apply(&mut config);
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    webharvest::logging::init_logging(&config.logging)?;

    let context = LogContext::new("main", "startup")
        .with_request_id(RequestIdGenerator::generate())
        .with_string_field("version", env!("CARGO_PKG_VERSION"));
    webharvest::log_info!(context, "webharvest starting up");

    match cli.command {
        Commands::Scrape {
            kind,
            input,
            format,
            limit,
            export,
            output,
        } => {
            if let Some(format) = format {
                apply_format_filter(&mut config, kind, &format)?;
            }
            if limit.is_some() {
                config.display.limit = limit;
            }
            run_scrape(config, kind, &input, export, output).await
        }
        Commands::Download { url, output } => {
            if let Some(directory) = output {
                config.export.output_directory = directory;
            }
            run_download(config, &url).await
        }
    }
}

fn apply_format_filter(config: &mut AppConfig, kind: DataKind, format: &str) -> Result<()> {
    match kind {
        DataKind::Images => config.scraping.image_format = format.parse()?,
        DataKind::Videos => config.scraping.video_format = format.parse()?,
        _ => warn!("--format only applies to images and videos, ignoring {}", format),
    }
    Ok(())
}

async fn run_scrape(
    config: AppConfig,
    kind: DataKind,
    input: &str,
    export: Option<ExportFormat>,
    output: Option<PathBuf>,
) -> Result<()> {
    let observer = Arc::new(ConsoleObserver {
        limit: config.display.effective_limit(),
    });
    let session = ScrapeSession::new(config, observer)?;

    let handle = session.start(kind, input).await?;
    wait_for_extraction(handle, tokio::signal::ctrl_c(), || {
        session.cancel();
    })
    .await?;

    let Some(outcome) = session.result().await else {
        return Ok(());
    };

    if let Some(format) = export {
        let Some(result) = outcome.result() else {
            warn!("Nothing to export for {}", kind);
            return Ok(());
        };

        let payloads = match (format, result) {
            (ExportFormat::Archive, ExtractionResult::Images(urls)) => session.download_images(urls).await,
            _ => Vec::new(),
        };

        let manager = ExportManager::new(&session.config().export);
        let path = output.unwrap_or_else(|| manager.default_path(kind, format));
        let stats = manager.export(result, &payloads, format, &path).await?;
        eprintln!("Exported {} records to {}", stats.record_count, stats.file_path);
    }

    Ok(())
}

/// Wait for the extraction task. A successful `interrupt` cancels the
/// session and keeps waiting; a failed one is ignored.
async fn wait_for_extraction<F>(mut handle: JoinHandle<()>, interrupt: F, cancel: impl FnOnce()) -> Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        joined = &mut handle => joined.context("Extraction task failed")?,
        Ok(()) = interrupt => {
            cancel();
            handle.await.context("Extraction task failed")?;
        }
    }
    Ok(())
}

async fn run_download(config: AppConfig, url: &str) -> Result<()> {
    let parsed = Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
    let name = display_name(parsed.as_str());
    if name.is_empty() {
        bail!("Cannot derive a file name from {}", url);
    }

    let session = ScrapeSession::new(config, Arc::new(ConsoleObserver { limit: None }))?;
    let link = DocumentLink {
        url: parsed.to_string(),
        name,
    };
    let path = session.download_document(&link).await?;
    info!("Saved {} to {}", link.url, path.display());
    println!("{}", path.display());
    Ok(())
}

/// Status on stderr, results on stdout
struct ConsoleObserver {
    limit: Option<usize>,
}

impl SessionObserver for ConsoleObserver {
    fn notify_result(&self, outcome: &SessionOutcome) {
        if let Some(result) = outcome.result() {
            print_result(result, self.limit);
        }
    }

    fn notify_progress(&self, fraction: f32) {
        debug!("Progress: {:.0}%", fraction * 100.0);
    }

    fn notify_status(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => eprintln!("{}", message),
            Severity::Success => eprintln!("[ok] {}", message),
            Severity::Warning => eprintln!("[warning] {}", message),
            Severity::Error => eprintln!("[error] {}", message),
        }
    }
}

fn print_result(result: &ExtractionResult, limit: Option<usize>) {
    match result {
        ExtractionResult::Images(urls) | ExtractionResult::Videos(urls) | ExtractionResult::Headlines(urls) => {
            for url in apply_display_limit(urls, limit) {
                println!("{}", url);
            }
        }
        ExtractionResult::Text(text) => println!("{}", text),
        ExtractionResult::Tables(tables) => {
            for (index, table) in apply_display_limit(tables, limit).iter().enumerate() {
                println!("Table {}:", index + 1);
                for row in table {
                    println!("  {}", row.join(" | "));
                }
            }
        }
        ExtractionResult::Movie(record) => print_detail_record(record),
        ExtractionResult::Book(record) => print_detail_record(record),
        ExtractionResult::Products(products) => {
            for product in apply_display_limit(products, limit) {
                println!("{} - {} - {}", product.title, product.price, product.rating);
                println!("  {}", product.link);
            }
        }
        ExtractionResult::DocumentLinks(links) => {
            for link in apply_display_limit(links, limit) {
                println!("{}: {}", link.name, link.url);
            }
        }
    }
}

fn print_detail_record<T: DetailFields>(record: &DetailRecord<T>) {
    if let Some(details) = record.details() {
        for (name, value) in details.fields() {
            println!("{}: {}", name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_failed_interrupt_handler_does_not_cancel() {
        let finished = Arc::new(AtomicBool::new(false));
        let task_finished = finished.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            task_finished.store(true, Ordering::SeqCst);
        });

        let mut cancelled = false;
        let interrupt = async { Err(std::io::Error::new(std::io::ErrorKind::Other, "no signal handler")) };
        wait_for_extraction(handle, interrupt, || cancelled = true).await.unwrap();

        assert!(!cancelled);
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_interrupt_cancels_and_waits() {
        let handle = tokio::spawn(tokio::time::sleep(Duration::from_millis(20)));

        let mut cancelled = false;
        wait_for_extraction(handle, async { Ok(()) }, || cancelled = true).await.unwrap();

        assert!(cancelled);
    }
}
