use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub mod archive_exporter;
pub mod csv_exporter;
pub mod json_exporter;

use crate::config::ExportConfig;
use crate::core::{DataKind, ImagePayload};
use crate::error::{ScrapeError, ScrapeResult};
use crate::extract::ExtractionResult;

/// Export manager writing one extraction result per file
pub struct ExportManager {
    config: ExportConfig,
}

/// Export format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
    /// Zip of downloaded images
    Archive,
}

impl std::str::FromStr for ExportFormat {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "archive" | "zip" => Ok(ExportFormat::Archive),
            _ => Err(ScrapeError::UnsupportedFormat { format: s.to_string() }),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Archive => write!(f, "archive"),
        }
    }
}

impl ExportFormat {
    pub fn file_extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Archive => "zip",
        }
    }
}

/// Export statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportStats {
    pub format: ExportFormat,
    pub file_path: String,
    pub record_count: usize,
    pub file_size_bytes: u64,
    pub export_duration_ms: u64,
}

/// What a format writer reports back
#[derive(Debug)]
pub(crate) struct InternalExportStats {
    pub record_count: usize,
    pub file_size_bytes: u64,
}

impl ExportManager {
    pub fn new(config: &ExportConfig) -> Self {
        Self { config: config.clone() }
    }

    /// `scraped_<kind>.<ext>` inside the configured output directory
    pub fn default_path(&self, kind: DataKind, format: ExportFormat) -> PathBuf {
        self.config.output_directory.join(Self::generate_filename(kind, format))
    }

    pub fn generate_filename(kind: DataKind, format: ExportFormat) -> String {
        format!("scraped_{}.{}", kind.file_stem(), format.file_extension())
    }

    /// Write `result` to `output_path`. `payloads` are only read by the
    /// archive format, which is valid for images alone.
    pub async fn export(
        &self,
        result: &ExtractionResult,
        payloads: &[ImagePayload],
        format: ExportFormat,
        output_path: &Path,
    ) -> ScrapeResult<ExportStats> {
        let kind = result_kind(result);
        info!("Exporting {} to {} as {}", kind, output_path.display(), format);

        if format == ExportFormat::Archive && kind != DataKind::Images {
            return Err(ScrapeError::UnsupportedFormat {
                format: format!("{} export of {}", format, kind),
            });
        }

        if let Some(parent) = output_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let start_time = std::time::Instant::now();

        let stats = match format {
            ExportFormat::Csv => csv_exporter::export_csv(result, output_path).await,
            ExportFormat::Json => json_exporter::export_json(result, output_path).await,
            ExportFormat::Archive => archive_exporter::export_archive(payloads, output_path).await,
        }
        .map_err(|e| {
            error!("Export to {} failed: {}", output_path.display(), e);
            e
        })?;

        let final_stats = ExportStats {
            format,
            file_path: output_path.display().to_string(),
            record_count: stats.record_count,
            file_size_bytes: stats.file_size_bytes,
            export_duration_ms: start_time.elapsed().as_millis() as u64,
        };

        info!(
            "Export completed: {} records in {}ms, file size: {} bytes",
            final_stats.record_count, final_stats.export_duration_ms, final_stats.file_size_bytes
        );

        Ok(final_stats)
    }
}

/// The data kind a result was extracted for
pub fn result_kind(result: &ExtractionResult) -> DataKind {
    match result {
        ExtractionResult::Images(_) => DataKind::Images,
        ExtractionResult::Text(_) => DataKind::Text,
        ExtractionResult::Tables(_) => DataKind::Tables,
        ExtractionResult::Movie(_) => DataKind::MovieDetails,
        ExtractionResult::Book(_) => DataKind::BookDetails,
        ExtractionResult::Videos(_) => DataKind::Videos,
        ExtractionResult::Products(_) => DataKind::Products,
        ExtractionResult::Headlines(_) => DataKind::Headlines,
        ExtractionResult::DocumentLinks(_) => DataKind::DocumentLinks,
    }
}

async fn file_size(path: &Path) -> ScrapeResult<u64> {
    Ok(tokio::fs::metadata(path).await?.len())
}
