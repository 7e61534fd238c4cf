use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ScrapeError, ScrapeResult};
use crate::extract::DocumentLink;
use crate::scraper::{FetchOptions, HttpClient};

/// Bytes of one downloaded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub url: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    /// Last path segment of the URL, used as the archive entry name
    pub fn file_name(&self) -> String {
        let path = self.url.split(['?', '#']).next().unwrap_or_default();
        match path.rsplit('/').next() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => "image".to_string(),
        }
    }
}

/// Fetch image bytes with at most `concurrency` requests in flight.
///
/// Failed downloads are left out; the rest keep their input order.
pub async fn download_images(
    client: &HttpClient,
    urls: &[String],
    options: &FetchOptions,
    concurrency: usize,
) -> Vec<ImagePayload> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    let tasks = urls.iter().map(|url| {
        let semaphore = semaphore.clone();
        async move {
            let _permit = semaphore.acquire_owned().await.ok()?;
            match fetch_image(client, url, options).await {
                Ok(bytes) => Some(ImagePayload {
                    url: url.clone(),
                    bytes,
                }),
                Err(e) => {
                    debug!("Skipping image {}: {}", url, e);
                    None
                }
            }
        }
    });

    let payloads: Vec<ImagePayload> = join_all(tasks).await.into_iter().flatten().collect();
    info!("Downloaded {} of {} images", payloads.len(), urls.len());
    payloads
}

async fn fetch_image(client: &HttpClient, url: &str, options: &FetchOptions) -> ScrapeResult<Vec<u8>> {
    let url = Url::parse(url)?;
    client.get_bytes(&url, options).await
}

/// Save a document link into `directory` under its display name
pub async fn download_document(
    client: &HttpClient,
    link: &DocumentLink,
    directory: &Path,
    options: &FetchOptions,
) -> ScrapeResult<PathBuf> {
    let url = Url::parse(&link.url)?;
    let name = sanitize_file_name(&link.name)
        .ok_or_else(|| ScrapeError::invalid_input(format!("Cannot save document without a file name: {}", link.url)))?;

    let bytes = client.get_bytes(&url, options).await.map_err(|e| {
        warn!("Failed to download {}: {}", link.url, e);
        e
    })?;

    tokio::fs::create_dir_all(directory).await?;
    let path = directory.join(name);
    tokio::fs::write(&path, &bytes).await?;

    info!("Saved {} ({} bytes) to {}", link.name, bytes.len(), path.display());
    Ok(path)
}

/// Strip anything that would escape the target directory
fn sanitize_file_name(name: &str) -> Option<String> {
    let cleaned: String = name
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '\0') { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
