use scraper::Html;
use serde::{Deserialize, Serialize};
use url::Url;

use super::helpers::{element_text, search_term, select_text, selector};
use super::{failure_record, DetailRecord, Extractor, NOT_AVAILABLE};
use crate::error::ScrapeResult;
use crate::logging::{LogContext, PerformanceLogger, RequestIdGenerator};
use crate::scraper::{FetchOptions, PageDocument, PageRequest};

const SITE_ROOT: &str = "https://www.imdb.com";

pub const NO_MOVIE_FOUND: &str = "No movie found with that name.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieDetails {
    pub name: String,
    pub poster_url: String,
    pub year: String,
    pub rating: String,
    pub plot: String,
    pub genre: String,
    pub movie_link: String,
}

/// Search page URL for a movie title
pub fn movie_search_url(name: &str) -> ScrapeResult<Url> {
    let url = Url::parse(&format!("{}/find?q={}&ref_=nv_sr_sm", SITE_ROOT, search_term(name)))?;
    Ok(url)
}

impl Extractor {
    /// Look a movie up by title and read its detail page.
    ///
    /// Never fails: lookups that go wrong come back as an error record.
    pub async fn extract_movie_details(&self, name: &str, options: &FetchOptions) -> DetailRecord<MovieDetails> {
        let context = LogContext::new("extract", "movie_details")
            .with_request_id(RequestIdGenerator::generate())
            .with_string_field("title", name);
        let perf = PerformanceLogger::new(context.clone());

        match self.lookup_movie(name, options).await {
            Ok(record) => {
                let status = if record.details().is_some() { "found" } else { "no_match" };
                perf.finish_with_status("Movie lookup finished", status);
                record
            }
            Err(e) => {
                let context = context.with_error_category(e.category());
                crate::log_error!(context, e, "Movie lookup failed");
                failure_record(&e)
            }
        }
    }

    async fn lookup_movie(&self, name: &str, options: &FetchOptions) -> ScrapeResult<DetailRecord<MovieDetails>> {
        let search_url = movie_search_url(name)?;
        let search_page = self.fetch_static(&PageRequest::new(search_url, options.clone())).await?;

        let Some(href) = first_search_result(&search_page)? else {
            return Ok(DetailRecord::error(NO_MOVIE_FOUND));
        };

        let movie_url = Url::parse(&format!("{}{}", SITE_ROOT, href))?;
        let detail_page = self.fetch_static(&PageRequest::new(movie_url, options.clone())).await?;

        Ok(DetailRecord::Found(parse_movie_details(&detail_page)?))
    }
}

/// Href of the first search hit; an empty string when the link has none
pub fn first_search_result(document: &PageDocument) -> ScrapeResult<Option<String>> {
    let html = document.parse();
    let result_link = selector(".ipc-metadata-list-summary-item a")?;

    Ok(html
        .select(&result_link)
        .next()
        .map(|link| link.value().attr("href").unwrap_or_default().to_string()))
}

/// Read the fixed field set from a title page, `N/A` for absent elements
pub fn parse_movie_details(document: &PageDocument) -> ScrapeResult<MovieDetails> {
    let html = document.parse();
    let root = html.root_element();

    let text_or_na = |css: &str| -> ScrapeResult<String> {
        Ok(select_text(&root, &selector(css)?).unwrap_or_else(|| NOT_AVAILABLE.to_string()))
    };

    let poster_url = html
        .select(&selector("img.ipc-image")?)
        .next()
        .and_then(|img| img.value().attr("src"))
        .unwrap_or(NOT_AVAILABLE)
        .to_string();

    let rating = select_text(&root, &selector(r#"div[data-testid="hero-rating-bar__aggregate-rating__score"] span"#)?)
        .map(|score| format!("{}/10", score))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    Ok(MovieDetails {
        name: text_or_na("h1")?,
        poster_url,
        year: text_or_na(r#"a[href*="/releaseinfo"]"#)?,
        rating,
        plot: text_or_na(r#"span[data-testid="plot-xl"]"#)?,
        genre: genres(&html)?,
        movie_link: document.url().to_string(),
    })
}

fn genres(html: &Html) -> ScrapeResult<String> {
    let chips: Vec<String> = html
        .select(&selector(".ipc-chip__text")?)
        .map(|chip| element_text(&chip))
        .collect();

    if chips.is_empty() {
        Ok(NOT_AVAILABLE.to_string())
    } else {
        Ok(chips.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::test_support::{extractor, rendered_source, static_source};

    const SEARCH: &str = "https://www.imdb.com/find?q=the+matrix&ref_=nv_sr_sm";
    const DETAIL: &str = "https://www.imdb.com/title/tt0133093/";

    const SEARCH_HIT: &str = r#"<ul><li class="ipc-metadata-list-summary-item">
        <a href="/title/tt0133093/">The Matrix</a></li></ul>"#;

    const TITLE_PAGE: &str = r#"<html><body>
        <h1> The Matrix </h1>
        <img class="ipc-image" src="https://m.media-amazon.com/poster.jpg">
        <a href="/title/tt0133093/releaseinfo">1999</a>
        <div data-testid="hero-rating-bar__aggregate-rating__score"><span>8.7</span><span>/10</span></div>
        <span data-testid="plot-xl">A hacker learns the truth.</span>
        <span class="ipc-chip__text">Action</span><span class="ipc-chip__text">Sci-Fi</span>
    </body></html>"#;

    #[test]
    fn test_search_url_escapes_spaces_as_plus() {
        assert_eq!(movie_search_url("the matrix").unwrap().as_str(), SEARCH);
    }

    #[test]
    fn test_missing_fields_are_sentinels() {
        let document = PageDocument::new(Url::parse(DETAIL).unwrap(), "<h1>Untitled</h1>");
        let details = parse_movie_details(&document).unwrap();

        assert_eq!(details.name, "Untitled");
        assert_eq!(details.poster_url, NOT_AVAILABLE);
        assert_eq!(details.year, NOT_AVAILABLE);
        assert_eq!(details.rating, NOT_AVAILABLE);
        assert_eq!(details.plot, NOT_AVAILABLE);
        assert_eq!(details.genre, NOT_AVAILABLE);
        assert_eq!(details.movie_link, DETAIL);
    }

    #[tokio::test]
    async fn test_full_lookup() {
        let (extractor, fetcher, renderer) = extractor(
            static_source().with_page(SEARCH, SEARCH_HIT).with_page(DETAIL, TITLE_PAGE),
            rendered_source(),
        );

        let record = extractor.extract_movie_details("the matrix", &FetchOptions::default()).await;
        let details = record.details().unwrap();

        assert_eq!(details.name, "The Matrix");
        assert_eq!(details.poster_url, "https://m.media-amazon.com/poster.jpg");
        assert_eq!(details.year, "1999");
        assert_eq!(details.rating, "8.7/10");
        assert_eq!(details.plot, "A hacker learns the truth.");
        assert_eq!(details.genre, "Action, Sci-Fi");
        assert_eq!(details.movie_link, DETAIL);
        assert_eq!(fetcher.call_count(), 2);
        assert_eq!(renderer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_no_search_results_is_error_record() {
        let (extractor, fetcher, _) = extractor(
            static_source().with_page(SEARCH, "<p>No results found for \"the matrix\"</p>"),
            rendered_source(),
        );

        let record = extractor.extract_movie_details("the matrix", &FetchOptions::default()).await;
        assert_eq!(record, DetailRecord::error(NO_MOVIE_FOUND));
        assert!(record.details().is_none());
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_detail_page_failure_is_network_error_record() {
        let (extractor, _, _) = extractor(static_source().with_page(SEARCH, SEARCH_HIT), rendered_source());

        let record = extractor.extract_movie_details("the matrix", &FetchOptions::default()).await;
        let message = record.error_message().unwrap();
        assert!(message.starts_with("Network error: "), "{}", message);
        assert!(message.contains("404"));
    }
}
