use url::Url;

use super::{Extraction, Extractor};
use crate::logging::{LogContext, RequestIdGenerator};
use crate::scraper::{FetchOptions, PageDocument, PageRequest};

/// Elements whose text is never rendered
const HIDDEN_CONTAINERS: &[&str] = &["script", "style", "noscript", "template", "head", "title"];

impl Extractor {
    /// All visible text on a page, one trimmed chunk per line.
    /// Static fetch only.
    pub async fn extract_text(&self, url: &Url, options: &FetchOptions) -> Extraction<String> {
        let context = LogContext::new("extract", "text")
            .with_request_id(RequestIdGenerator::generate())
            .with_url(url.as_str());

        let request = PageRequest::new(url.clone(), options.clone());
        match self.fetch_static(&request).await {
            Ok(document) => {
                let text = visible_text(&document);
                if text.is_empty() {
                    crate::log_info!(context, "Page has no visible text");
                    Extraction::NotFound
                } else {
                    Extraction::Found(text)
                }
            }
            Err(e) => {
                let context = context.with_error_category(e.category());
                crate::log_error!(context, e, "Failed to fetch page text");
                Extraction::NotFound
            }
        }
    }
}

/// Visible text nodes, each trimmed, empties dropped, joined with newlines
pub fn visible_text(document: &PageDocument) -> String {
    let html = document.parse();

    let chunks: Vec<&str> = html
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .map_or(false, |element| HIDDEN_CONTAINERS.contains(&element.name()))
            });
            if hidden {
                None
            } else {
                Some(text.trim())
            }
        })
        .filter(|chunk| !chunk.is_empty())
        .collect();

    chunks.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;
    use crate::extract::test_support::{extractor, rendered_source, static_source};

    const PAGE: &str = "https://example.com/article";

    #[test]
    fn test_visible_text_skips_scripts_and_styles() {
        let markup = r#"<html><head><title>Ignored</title><style>p { color: red }</style></head>
            <body>
              <h1>  Heading </h1>
              <p>First paragraph</p>
              <script>var hidden = 1;</script>
              <div>   </div>
              <p>Second <b>bold</b></p>
            </body></html>"#;
        let document = PageDocument::new(Url::parse(PAGE).unwrap(), markup);

        assert_eq!(visible_text(&document), "Heading\nFirst paragraph\nSecond\nbold");
    }

    #[tokio::test]
    async fn test_blank_page_is_not_found() {
        let (extractor, _, renderer) = extractor(
            static_source().with_page(PAGE, "<html><body>  <script>x()</script></body></html>"),
            rendered_source(),
        );

        let result = extractor.extract_text(&Url::parse(PAGE).unwrap(), &FetchOptions::default()).await;
        assert_eq!(result, Extraction::NotFound);
        assert_eq!(renderer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_not_found() {
        let (extractor, _, _) = extractor(
            static_source().failing(|| ScrapeError::network("timed out")),
            rendered_source(),
        );

        let result = extractor.extract_text(&Url::parse(PAGE).unwrap(), &FetchOptions::default()).await;
        assert_eq!(result, Extraction::NotFound);
    }

    #[tokio::test]
    async fn test_text_found() {
        let (extractor, _, _) = extractor(static_source().with_page(PAGE, "<p>Hello</p><p>world</p>"), rendered_source());

        let result = extractor.extract_text(&Url::parse(PAGE).unwrap(), &FetchOptions::default()).await;
        assert_eq!(result, Extraction::Found("Hello\nworld".to_string()));
    }
}
