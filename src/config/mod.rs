use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::error::ScrapeError;
use crate::logging::LoggingConfig;
use crate::scraper::FetchOptions;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scraping: ScrapingConfig,
    pub export: ExportConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    pub user_agent: String,
    pub extra_headers: HashMap<String, String>,
    pub request_timeout_seconds: u64,
    pub browser_timeout_seconds: u64,
    pub document_wait_timeout_seconds: u64,
    pub page_load_timeout_seconds: u64,
    pub image_download_timeout_seconds: u64,
    pub image_download_concurrency: usize,
    pub image_format: ImageFormat,
    pub video_format: VideoFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_directory: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Unset or non-positive means unbounded
    pub limit: Option<i64>,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            extra_headers: HashMap::new(),
            request_timeout_seconds: 10,
            browser_timeout_seconds: 10,
            document_wait_timeout_seconds: 15,
            page_load_timeout_seconds: 30,
            image_download_timeout_seconds: 5,
            image_download_concurrency: 5,
            image_format: ImageFormat::All,
            video_format: VideoFormat::All,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_directory: get_downloads_directory(),
        }
    }
}

impl ScrapingConfig {
    /// Header set and timeout threaded through each fetch
    pub fn fetch_options(&self) -> FetchOptions {
        let mut headers = self.extra_headers.clone();
        headers.insert("User-Agent".to_string(), self.user_agent.clone());

        FetchOptions {
            headers,
            timeout: Duration::from_secs(self.request_timeout_seconds),
        }
    }

    pub fn browser_timeout(&self) -> Duration {
        Duration::from_secs(self.browser_timeout_seconds)
    }

    pub fn document_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.document_wait_timeout_seconds)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_seconds)
    }

    pub fn image_download_timeout(&self) -> Duration {
        Duration::from_secs(self.image_download_timeout_seconds)
    }
}

impl DisplayConfig {
    /// Effective display limit, `None` when unbounded
    pub fn effective_limit(&self) -> Option<usize> {
        match self.limit {
            Some(limit) if limit > 0 => Some(limit as usize),
            _ => None,
        }
    }
}

/// Image format filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    All,
    Png,
    Jpg,
}

impl ImageFormat {
    /// Accepted file extensions, without the leading dot
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ImageFormat::All => &["png", "jpg", "jpeg", "webp", "gif"],
            ImageFormat::Png => &["png"],
            ImageFormat::Jpg => &["jpg", "jpeg"],
        }
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(ImageFormat::All),
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpg),
            _ => Err(ScrapeError::UnsupportedFormat { format: s.to_string() }),
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageFormat::All => write!(f, "all"),
            ImageFormat::Png => write!(f, "png"),
            ImageFormat::Jpg => write!(f, "jpg"),
        }
    }
}

/// Video container format filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    #[default]
    All,
    Mp4,
    Avi,
    Mkv,
    Mov,
    Webm,
}

impl VideoFormat {
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            VideoFormat::All => &["mp4", "avi", "mkv", "mov", "webm"],
            VideoFormat::Mp4 => &["mp4"],
            VideoFormat::Avi => &["avi"],
            VideoFormat::Mkv => &["mkv"],
            VideoFormat::Mov => &["mov"],
            VideoFormat::Webm => &["webm"],
        }
    }
}

impl std::str::FromStr for VideoFormat {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(VideoFormat::All),
            "mp4" => Ok(VideoFormat::Mp4),
            "avi" => Ok(VideoFormat::Avi),
            "mkv" => Ok(VideoFormat::Mkv),
            "mov" => Ok(VideoFormat::Mov),
            "webm" => Ok(VideoFormat::Webm),
            _ => Err(ScrapeError::UnsupportedFormat { format: s.to_string() }),
        }
    }
}

impl std::fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VideoFormat::All => "all",
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Avi => "avi",
            VideoFormat::Mkv => "mkv",
            VideoFormat::Mov => "mov",
            VideoFormat::Webm => "webm",
        };
        write!(f, "{}", name)
    }
}

impl AppConfig {
    /// Load configuration from the default location, falling back to defaults
    pub async fn load() -> Result<Self> {
        let config_path = get_config_path();

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            info!("No configuration file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from specific file
    pub async fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid configuration file {}", path.display()))?;

        config.validate()?;

        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ScrapeError> {
        if self.scraping.request_timeout_seconds == 0 {
            return Err(ScrapeError::config("Scraping request_timeout_seconds must be > 0"));
        }

        if self.scraping.browser_timeout_seconds == 0 || self.scraping.document_wait_timeout_seconds == 0 {
            return Err(ScrapeError::config("Browser wait timeouts must be > 0"));
        }

        if self.scraping.image_download_concurrency == 0 {
            return Err(ScrapeError::config("Scraping image_download_concurrency must be > 0"));
        }

        if self.scraping.user_agent.trim().is_empty() {
            return Err(ScrapeError::config("A user agent must be configured"));
        }

        Ok(())
    }
}

/// Default directory for exports and downloads
fn get_downloads_directory() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(|dir| dir.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("exports"))
}

/// Get the configuration file path
fn get_config_path() -> PathBuf {
    directories::ProjectDirs::from("com", "webharvest", "webharvest")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

/// Environment-based configuration overrides
pub struct ConfigOverrides;

impl ConfigOverrides {
    /// Apply environment variable overrides to configuration
    pub fn apply(config: &mut AppConfig) {
        Self::apply_from(config, |key| std::env::var(key).ok());
    }

    fn apply_from(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup("WEBHARVEST_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Some(timeout) = lookup("WEBHARVEST_REQUEST_TIMEOUT").and_then(|v| v.parse::<u64>().ok()) {
            config.scraping.request_timeout_seconds = timeout;
        }

        if let Some(user_agent) = lookup("WEBHARVEST_USER_AGENT") {
            config.scraping.user_agent = user_agent;
        }

        if let Some(dir) = lookup("WEBHARVEST_OUTPUT_DIR") {
            config.export.output_directory = PathBuf::from(dir);
        }

        if let Some(limit) = lookup("WEBHARVEST_DISPLAY_LIMIT").and_then(|v| v.parse::<i64>().ok()) {
            config.display.limit = Some(limit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_extensions() {
        assert_eq!(ImageFormat::Jpg.extensions(), &["jpg", "jpeg"]);
        assert_eq!(ImageFormat::All.extensions().len(), 5);
        assert_eq!(VideoFormat::Webm.extensions(), &["webm"]);
        assert_eq!("MP4".parse::<VideoFormat>().unwrap(), VideoFormat::Mp4);
        assert!("tiff".parse::<ImageFormat>().is_err());
    }

    #[test]
    fn test_display_limit() {
        assert_eq!(DisplayConfig { limit: None }.effective_limit(), None);
        assert_eq!(DisplayConfig { limit: Some(0) }.effective_limit(), None);
        assert_eq!(DisplayConfig { limit: Some(-3) }.effective_limit(), None);
        assert_eq!(DisplayConfig { limit: Some(7) }.effective_limit(), Some(7));
    }

    #[test]
    fn test_fetch_options_carry_user_agent() {
        let mut config = ScrapingConfig::default();
        config.extra_headers.insert("Accept-Language".into(), "en-US".into());

        let options = config.fetch_options();
        assert_eq!(options.headers.get("User-Agent").map(String::as_str), Some(DEFAULT_USER_AGENT));
        assert_eq!(options.headers.get("Accept-Language").map(String::as_str), Some("en-US"));
        assert_eq!(options.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_validation_rejects_zero_concurrency() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.scraping.image_download_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [scraping]
            request_timeout_seconds = 20
            image_format = "png"

            [display]
            limit = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.scraping.request_timeout_seconds, 20);
        assert_eq!(config.scraping.image_format, ImageFormat::Png);
        assert_eq!(config.scraping.image_download_concurrency, 5);
        assert_eq!(config.display.effective_limit(), Some(4));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        ConfigOverrides::apply_from(&mut config, |key| match key {
            "WEBHARVEST_REQUEST_TIMEOUT" => Some("42".to_string()),
            "WEBHARVEST_DISPLAY_LIMIT" => Some("-1".to_string()),
            "WEBHARVEST_OUTPUT_DIR" => Some("/tmp/out".to_string()),
            _ => None,
        });

        assert_eq!(config.scraping.request_timeout_seconds, 42);
        assert_eq!(config.display.effective_limit(), None);
        assert_eq!(config.export.output_directory, PathBuf::from("/tmp/out"));
    }
}
