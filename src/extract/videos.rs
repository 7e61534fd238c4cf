use url::Url;

use super::helpers::{has_http_scheme, resolve_url, selector};
use super::{Extraction, Extractor, FetchFailure};
use crate::config::VideoFormat;
use crate::error::ScrapeResult;
use crate::logging::{LogContext, RequestIdGenerator};
use crate::scraper::{FetchOptions, PageDocument, PageRequest};

impl Extractor {
    /// `<source>` URLs of every `<video>` on a page, filtered by container
    /// format. Duplicates are kept.
    pub async fn extract_videos(&self, url: &Url, format: VideoFormat, options: &FetchOptions) -> Extraction<Vec<String>> {
        let context = LogContext::new("extract", "videos")
            .with_request_id(RequestIdGenerator::generate())
            .with_url(url.as_str());

        let static_request = PageRequest::new(url.clone(), options.clone());
        let rendered_request = PageRequest::new(url.clone(), options.clone())
            .wait_for("video", self.timeouts().element);

        let parse = |document: &PageDocument| parse_videos(document, format);

        self.with_fallback(context, &static_request, &rendered_request, FetchFailure::GiveUp, parse, parse)
            .await
    }
}

pub fn parse_videos(document: &PageDocument, format: VideoFormat) -> ScrapeResult<Vec<String>> {
    let html = document.parse();
    let videos = selector("video")?;
    let sources = selector("source")?;
    let accepted = format.extensions();

    let mut urls = Vec::new();
    for video in html.select(&videos) {
        for source in video.select(&sources) {
            let Some(src) = source.value().attr("src").filter(|src| !src.is_empty()) else {
                continue;
            };

            // The extension is read from the raw attribute, before resolving
            if !accepted.contains(&raw_extension(src).as_str()) {
                continue;
            }

            if has_http_scheme(src) {
                urls.push(src.to_string());
            } else if let Some(resolved) = resolve_url(document.url(), src) {
                urls.push(resolved.to_string());
            }
        }
    }

    Ok(urls)
}

/// Lowercased extension of the last path segment, ignoring query and
/// fragment. Empty when the segment has none.
fn raw_extension(src: &str) -> String {
    let path = src.split(['?', '#']).next().unwrap_or_default();
    let segment = path.rsplit('/').next().unwrap_or_default();

    segment
        .trim_start_matches('.')
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_lowercase())
        .unwrap_or_default()
}
