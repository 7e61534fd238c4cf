use async_trait::async_trait;
use reqwest::{Client, Response, header::{HeaderMap, HeaderName, HeaderValue}};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use super::{FetchOptions, PageDocument, PageRequest, PageSource, SourceKind};
use crate::error::{ScrapeError, ScrapeResult};

/// Plain HTTP fetcher. One GET per call, no retries.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create new HTTP client with browser-like default headers
    pub fn new() -> ScrapeResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"));
        headers.insert("Accept-Language", HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .default_headers(headers)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()?;

        info!("HTTP client initialized");

        Ok(Self { client })
    }

    /// GET a URL; non-2xx statuses are reported as errors
    pub async fn get(&self, url: &Url, options: &FetchOptions) -> ScrapeResult<Response> {
        let start_time = Instant::now();
        debug!("HTTP GET {}", url);

        let mut request = self.client.get(url.as_str()).timeout(options.timeout);

        for (name, value) in &options.headers {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(header_name), Ok(header_value)) => {
                    request = request.header(header_name, header_value);
                }
                _ => warn!("Skipping invalid header {}", name),
            }
        }

        let response = request.send().await.map_err(|e| {
            warn!("HTTP request failed for {}: {}", url, e);
            ScrapeError::network(e.to_string())
        })?;

        let status = response.status();
        debug!("HTTP GET {} -> {} in {}ms", url, status, start_time.elapsed().as_millis());

        if !status.is_success() {
            return Err(ScrapeError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    /// GET a URL and return the body bytes
    pub async fn get_bytes(&self, url: &Url, options: &FetchOptions) -> ScrapeResult<Vec<u8>> {
        let response = self.get(url, options).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl PageSource for HttpClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Static
    }

    async fn fetch_page(&self, request: &PageRequest) -> ScrapeResult<PageDocument> {
        let response = self.get(&request.url, &request.options).await?;
        let final_url = response.url().clone();
        let markup = response.text().await?;

        debug!("Fetched {} bytes of markup from {}", markup.len(), final_url);
        Ok(PageDocument::new(request.url.clone(), markup))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_as_static_tier() {
        let client = HttpClient::new().unwrap();
        assert_eq!(client.kind(), SourceKind::Static);
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_error() {
        let client = HttpClient::new().unwrap();
        // Port 9 on localhost is the discard service and is closed on CI hosts
        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        let options = FetchOptions {
            timeout: Duration::from_secs(2),
            ..FetchOptions::default()
        };

        let error = client.get(&url, &options).await.unwrap_err();
        assert!(error.is_network());
    }
}
