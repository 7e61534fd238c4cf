use url::Url;

use super::helpers::{first_attr, resolve_url, selector};
use super::{Extraction, Extractor, FetchFailure};
use crate::config::ImageFormat;
use crate::error::ScrapeResult;
use crate::logging::{LogContext, RequestIdGenerator};
use crate::scraper::{FetchOptions, PageDocument, PageRequest};

/// Source attributes in priority order; the first non-empty one wins
const SOURCE_ATTRIBUTES: &[&str] = &["src", "data-src", "data-lazy-src"];

impl Extractor {
    /// Image URLs on a page, filtered by format. Duplicates are kept.
    pub async fn extract_images(&self, url: &Url, format: ImageFormat, options: &FetchOptions) -> Extraction<Vec<String>> {
        let context = LogContext::new("extract", "images")
            .with_request_id(RequestIdGenerator::generate())
            .with_url(url.as_str());

        let static_request = PageRequest::new(url.clone(), options.clone());
        let rendered_request = PageRequest::new(url.clone(), options.clone())
            .wait_for("img", self.timeouts().element);

        let parse = |document: &PageDocument| parse_images(document, format);

        self.with_fallback(context, &static_request, &rendered_request, FetchFailure::GiveUp, parse, parse)
            .await
    }
}

/// Absolute URLs of every `img`/`image` element whose path has an accepted extension
pub fn parse_images(document: &PageDocument, format: ImageFormat) -> ScrapeResult<Vec<String>> {
    let html = document.parse();
    let images = selector("img, image")?;

    let urls = html
        .select(&images)
        .filter_map(|element| first_attr(&element, SOURCE_ATTRIBUTES))
        .filter_map(|source| resolve_url(document.url(), source))
        .filter(|resolved| has_accepted_extension(resolved, format))
        .map(String::from)
        .collect();

    Ok(urls)
}

fn has_accepted_extension(url: &Url, format: ImageFormat) -> bool {
    let path = url.path().to_lowercase();
    format
        .extensions()
        .iter()
        .any(|extension| path.ends_with(&format!(".{}", extension)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;
    use crate::extract::test_support::{extractor, rendered_source, static_source};

    const PAGE: &str = "https://example.com/gallery/";

    fn document(markup: &str) -> PageDocument {
        PageDocument::new(Url::parse(PAGE).unwrap(), markup)
    }

    #[test]
    fn test_src_and_lazy_attributes_in_document_order() {
        let doc = document(r#"<img src="a.png"><img data-src="b.jpg">"#);
        let urls = parse_images(&doc, ImageFormat::All).unwrap();
        assert_eq!(urls, vec!["https://example.com/gallery/a.png", "https://example.com/gallery/b.jpg"]);
    }

    #[test]
    fn test_attribute_priority() {
        let doc = document(r#"<img src="" data-src="" data-lazy-src="/lazy.webp"><img src="p.gif" data-src="ignored.png">"#);
        let urls = parse_images(&doc, ImageFormat::All).unwrap();
        assert_eq!(urls, vec!["https://example.com/lazy.webp", "https://example.com/gallery/p.gif"]);
    }

    #[test]
    fn test_format_filter() {
        let doc = document(r#"<img src="a.PNG"><img src="b.jpeg"><img src="c.jpg"><img src="d.svg"><img src="e.webp">"#);

        assert_eq!(parse_images(&doc, ImageFormat::Png).unwrap(), vec!["https://example.com/gallery/a.PNG"]);
        assert_eq!(
            parse_images(&doc, ImageFormat::Jpg).unwrap(),
            vec!["https://example.com/gallery/b.jpeg", "https://example.com/gallery/c.jpg"]
        );
        assert_eq!(parse_images(&doc, ImageFormat::All).unwrap().len(), 4);
    }

    #[test]
    fn test_every_url_is_absolute_with_accepted_extension() {
        let doc = document(r#"<img src="x.png?size=2"><img src="//cdn.example.org/y.jpg"><img src="z"><image src="w.gif">"#);
        let urls = parse_images(&doc, ImageFormat::All).unwrap();

        assert_eq!(urls.len(), 3);
        for url in urls {
            let parsed = Url::parse(&url).unwrap();
            assert!(parsed.has_host());
            let path = parsed.path().to_lowercase();
            assert!(ImageFormat::All.extensions().iter().any(|ext| path.ends_with(&format!(".{}", ext))));
        }
    }

    #[test]
    fn test_duplicates_are_kept() {
        let doc = document(r#"<img src="a.png"><img src="a.png">"#);
        assert_eq!(parse_images(&doc, ImageFormat::All).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_static_pass_skips_renderer() {
        let (extractor, _, renderer) = extractor(
            static_source().with_page(PAGE, r#"<img src="a.png">"#),
            rendered_source(),
        );

        let result = extractor
            .extract_images(&Url::parse(PAGE).unwrap(), ImageFormat::All, &FetchOptions::default())
            .await;

        assert_eq!(result, Extraction::Found(vec!["https://example.com/gallery/a.png".to_string()]));
        assert_eq!(renderer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_static_pass_falls_back_to_rendered() {
        let (extractor, _, renderer) = extractor(
            static_source().with_page(PAGE, r#"<div id="app"></div>"#),
            rendered_source().with_page(PAGE, r#"<img data-lazy-src="late.jpg">"#),
        );

        let result = extractor
            .extract_images(&Url::parse(PAGE).unwrap(), ImageFormat::Jpg, &FetchOptions::default())
            .await;

        assert_eq!(result, Extraction::Found(vec!["https://example.com/gallery/late.jpg".to_string()]));
        let requests = renderer.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].wait_for.as_deref(), Some("img"));
    }

    #[tokio::test]
    async fn test_fetch_failure_does_not_render() {
        let (extractor, _, renderer) = extractor(
            static_source().failing(|| ScrapeError::network("connection refused")),
            rendered_source().with_page(PAGE, r#"<img src="a.png">"#),
        );

        let result = extractor
            .extract_images(&Url::parse(PAGE).unwrap(), ImageFormat::All, &FetchOptions::default())
            .await;

        assert_eq!(result, Extraction::NotFound);
        assert_eq!(renderer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_nothing_in_either_tier_is_not_found() {
        let (extractor, _, _) = extractor(
            static_source().with_page(PAGE, "<p>no pictures</p>"),
            rendered_source().with_page(PAGE, r#"<img src="icon.svg">"#),
        );

        let result = extractor
            .extract_images(&Url::parse(PAGE).unwrap(), ImageFormat::All, &FetchOptions::default())
            .await;

        assert_eq!(result, Extraction::NotFound);
    }
}
