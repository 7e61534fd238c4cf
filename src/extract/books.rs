use scraper::ElementRef;
use serde::{Deserialize, Serialize};
use url::Url;

use super::helpers::{element_text, search_term, select_text, selector};
use super::{failure_record, DetailRecord, Extractor, NOT_AVAILABLE};
use crate::error::ScrapeResult;
use crate::logging::{LogContext, PerformanceLogger, RequestIdGenerator};
use crate::scraper::{FetchOptions, PageDocument, PageRequest};

const SITE_ROOT: &str = "https://openlibrary.org";

pub const NO_BOOK_FOUND: &str = "No book found with that name.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDetails {
    pub name: String,
    pub cover_url: String,
    pub author: String,
    pub year: String,
    pub rating: String,
    pub description: String,
    pub book_link: String,
}

/// Search page URL for a book title
pub fn book_search_url(name: &str) -> ScrapeResult<Url> {
    let url = Url::parse(&format!("{}/search?q={}&mode=everything", SITE_ROOT, search_term(name)))?;
    Ok(url)
}

impl Extractor {
    /// Look a book up by title. Summary fields come from the first search
    /// hit; the description comes from one extra fetch of its detail page.
    pub async fn extract_book_details(&self, name: &str, options: &FetchOptions) -> DetailRecord<BookDetails> {
        let context = LogContext::new("extract", "book_details")
            .with_request_id(RequestIdGenerator::generate())
            .with_string_field("title", name);
        let perf = PerformanceLogger::new(context.clone());

        match self.lookup_book(name, options).await {
            Ok(record) => {
                let status = if record.details().is_some() { "found" } else { "no_match" };
                perf.finish_with_status("Book lookup finished", status);
                record
            }
            Err(e) => {
                let context = context.with_error_category(e.category());
                crate::log_error!(context, e, "Book lookup failed");
                failure_record(&e)
            }
        }
    }

    async fn lookup_book(&self, name: &str, options: &FetchOptions) -> ScrapeResult<DetailRecord<BookDetails>> {
        let search_url = book_search_url(name)?;
        let search_page = self.fetch_static(&PageRequest::new(search_url, options.clone())).await?;

        let Some(mut details) = parse_search_result(&search_page)? else {
            return Ok(DetailRecord::error(NO_BOOK_FOUND));
        };

        if details.book_link != NOT_AVAILABLE {
            let detail_url = Url::parse(&details.book_link)?;
            let detail_page = self.fetch_static(&PageRequest::new(detail_url, options.clone())).await?;
            details.description = parse_description(&detail_page)?;
        }

        Ok(DetailRecord::Found(details))
    }
}

/// Summary fields of the first search hit. The description is left as
/// `N/A` until the detail page is read.
pub fn parse_search_result(document: &PageDocument) -> ScrapeResult<Option<BookDetails>> {
    let html = document.parse();
    let Some(item) = html.select(&selector("li.searchResultItem")?).next() else {
        return Ok(None);
    };

    let text_or_na = |css: &str| -> ScrapeResult<String> {
        Ok(select_text(&item, &selector(css)?).unwrap_or_else(|| NOT_AVAILABLE.to_string()))
    };

    let title_link = item.select(&selector("h3.booktitle a")?).next();

    let book_link = title_link
        .and_then(|link| link.value().attr("href"))
        .map(|href| format!("{}{}", SITE_ROOT, href))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let year = text_or_na("span.resultDetails span")?.replace("First published in ", "");

    Ok(Some(BookDetails {
        name: title_link.map(|link| element_text(&link)).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        cover_url: cover_url(&item)?,
        author: text_or_na("span.bookauthor a")?,
        year,
        rating: text_or_na(r#"span.ratingsByline span[itemprop="ratingValue"]"#)?,
        description: NOT_AVAILABLE.to_string(),
        book_link,
    }))
}

/// Cover images are served protocol-relative; absolute ones are kept as is
fn cover_url(item: &ElementRef<'_>) -> ScrapeResult<String> {
    let source = item
        .select(&selector("span.bookcover img")?)
        .next()
        .and_then(|img| img.value().attr("src"));

    Ok(match source {
        Some(src) if src.starts_with("//") => format!("https:{}", src),
        Some(src) if !src.is_empty() => src.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    })
}

/// Description paragraphs joined by spaces, skipping any paragraph that
/// contains a link
pub fn parse_description(document: &PageDocument) -> ScrapeResult<String> {
    let html = document.parse();
    let Some(content) = html.select(&selector("div.read-more__content")?).next() else {
        return Ok(NOT_AVAILABLE.to_string());
    };

    let paragraphs = selector("p")?;
    let links = selector("a")?;

    let description = content
        .select(&paragraphs)
        .filter(|paragraph| paragraph.select(&links).next().is_none())
        .map(|paragraph| element_text(&paragraph))
        .collect::<Vec<_>>()
        .join(" ");

    Ok(description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;
    use crate::extract::test_support::{extractor, rendered_source, static_source};

    const SEARCH: &str = "https://openlibrary.org/search?q=dune&mode=everything";
    const DETAIL: &str = "https://openlibrary.org/works/OL893415W/Dune";

    const SEARCH_HIT: &str = r#"<ul class="list-books">
        <li class="searchResultItem">
          <span class="bookcover"><img src="//covers.openlibrary.org/b/id/1-M.jpg"></span>
          <h3 class="booktitle"><a href="/works/OL893415W/Dune"> Dune </a></h3>
          <span class="bookauthor">by <a href="/authors/OL79034A">Frank Herbert</a></span>
          <span class="resultDetails"><span>First published in 1965</span></span>
          <span class="ratingsByline"><span itemprop="ratingValue">4.3</span></span>
        </li>
        <li class="searchResultItem"><h3 class="booktitle"><a href="/works/other">Other</a></h3></li>
    </ul>"#;

    const DETAIL_PAGE: &str = r#"<div class="read-more__content">
        <p>Set on the desert planet Arrakis.</p>
        <p>See <a href="https://en.wikipedia.org">Wikipedia</a></p>
        <p> A story of politics and ecology. </p>
    </div>"#;

    fn document(url: &str, markup: &str) -> PageDocument {
        PageDocument::new(Url::parse(url).unwrap(), markup)
    }

    #[test]
    fn test_search_url() {
        assert_eq!(
            book_search_url("the hobbit").unwrap().as_str(),
            "https://openlibrary.org/search?q=the+hobbit&mode=everything"
        );
    }

    #[test]
    fn test_description_skips_linked_paragraphs() {
        let description = parse_description(&document(DETAIL, DETAIL_PAGE)).unwrap();
        assert_eq!(description, "Set on the desert planet Arrakis. A story of politics and ecology.");
    }

    #[test]
    fn test_missing_description_container() {
        let description = parse_description(&document(DETAIL, "<p>nothing here</p>")).unwrap();
        assert_eq!(description, NOT_AVAILABLE);
    }

    #[test]
    fn test_sparse_result_uses_sentinels() {
        let details = parse_search_result(&document(SEARCH, r#"<li class="searchResultItem"></li>"#))
            .unwrap()
            .unwrap();

        assert_eq!(details.name, NOT_AVAILABLE);
        assert_eq!(details.cover_url, NOT_AVAILABLE);
        assert_eq!(details.author, NOT_AVAILABLE);
        assert_eq!(details.year, NOT_AVAILABLE);
        assert_eq!(details.rating, NOT_AVAILABLE);
        assert_eq!(details.book_link, NOT_AVAILABLE);
    }

    #[tokio::test]
    async fn test_full_lookup_uses_first_hit() {
        let (extractor, fetcher, _) = extractor(
            static_source().with_page(SEARCH, SEARCH_HIT).with_page(DETAIL, DETAIL_PAGE),
            rendered_source(),
        );

        let record = extractor.extract_book_details("dune", &FetchOptions::default()).await;
        let details = record.details().unwrap();

        assert_eq!(details.name, "Dune");
        assert_eq!(details.cover_url, "https://covers.openlibrary.org/b/id/1-M.jpg");
        assert_eq!(details.author, "Frank Herbert");
        assert_eq!(details.year, "1965");
        assert_eq!(details.rating, "4.3");
        assert_eq!(details.description, "Set on the desert planet Arrakis. A story of politics and ecology.");
        assert_eq!(details.book_link, DETAIL);
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test]
    async fn test_no_search_results_is_error_record() {
        let (extractor, _, _) = extractor(static_source().with_page(SEARCH, "<ul></ul>"), rendered_source());

        let record = extractor.extract_book_details("dune", &FetchOptions::default()).await;
        assert_eq!(record, DetailRecord::error(NO_BOOK_FOUND));
    }

    #[tokio::test]
    async fn test_search_transport_failure() {
        let (extractor, _, _) = extractor(
            static_source().failing(|| ScrapeError::network("connection reset")),
            rendered_source(),
        );

        let record = extractor.extract_book_details("dune", &FetchOptions::default()).await;
        assert_eq!(record.error_message(), Some("Network error: connection reset"));
    }
}
