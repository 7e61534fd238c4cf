use scraper::ElementRef;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use super::helpers::{first_attr, search_term, select_text, selector};
use super::{Extraction, Extractor, NOT_AVAILABLE};
use crate::error::ScrapeResult;
use crate::logging::{LogContext, RequestIdGenerator};
use crate::scraper::{FetchOptions, PageDocument, PageRequest};

/// Image used for listings that carry no picture
pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/150?text=No+Image";

const PRIMARY_LISTING: &str = "li.s-item.s-item__pl-on-bottom";
const FALLBACK_LISTING: &str = "li[data-viewport]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub title: String,
    pub link: String,
    pub image_url: String,
    pub price: String,
    pub rating: String,
}

/// Marketplace search URL, newest listings first
pub fn product_search_url(query: &str) -> ScrapeResult<Url> {
    let url = Url::parse(&format!("https://www.ebay.com/sch/i.html?_nkw={}&_sop=12", search_term(query)))?;
    Ok(url)
}

/// Listings matched on a results page and the products kept from them
#[derive(Debug, Default)]
pub struct ListingScan {
    pub candidates: usize,
    pub products: Vec<Product>,
}

impl Extractor {
    /// Marketplace listings for a search term. The results page needs
    /// scripts to run, so only the rendered tier is used.
    pub async fn extract_products(&self, query: &str, options: &FetchOptions) -> Extraction<Vec<Product>> {
        let context = LogContext::new("extract", "products")
            .with_request_id(RequestIdGenerator::generate())
            .with_string_field("query", query);

        let url = match product_search_url(query) {
            Ok(url) => url,
            Err(e) => {
                let context = context.with_error_category(e.category());
                crate::log_error!(context, e, "Could not build marketplace search URL");
                return Extraction::NotFound;
            }
        };

        let request = PageRequest::new(url, options.clone()).wait_for("li.s-item", self.timeouts().element);

        let document = match self.fetch_rendered(&request).await {
            Ok(document) => document,
            Err(e) => {
                let context = context.with_url(request.url.as_str()).with_error_category(e.category());
                crate::log_error!(context, e, "Failed to render marketplace results");
                return Extraction::NotFound;
            }
        };

        match parse_listings(&document) {
            Ok(scan) if scan.candidates == 0 => {
                crate::log_warn!(context, "No listings matched either listing selector");
                Extraction::NotFound
            }
            Ok(scan) if scan.products.is_empty() => {
                let context = context.with_number_field("candidates", scan.candidates as i64);
                crate::log_warn!(context, "Listings found but none had a title and link");
                Extraction::NotFound
            }
            Ok(scan) => {
                let context = context.with_number_field("products", scan.products.len() as i64);
                crate::log_info!(context, "Scraped marketplace listings");
                Extraction::Found(scan.products)
            }
            Err(e) => {
                let context = context.with_error_category(e.category());
                crate::log_error!(context, e, "Failed to parse marketplace results");
                Extraction::NotFound
            }
        }
    }
}

pub fn parse_listings(document: &PageDocument) -> ScrapeResult<ListingScan> {
    let html = document.parse();

    let mut listings: Vec<ElementRef<'_>> = html.select(&selector(PRIMARY_LISTING)?).collect();
    if listings.is_empty() {
        warn!("No listings with the standard selector, trying {}", FALLBACK_LISTING);
        listings = html.select(&selector(FALLBACK_LISTING)?).collect();
    }

    let fields = ListingSelectors::new()?;
    let products: Vec<Product> = listings.iter().filter_map(|listing| fields.product(listing)).collect();

    if products.len() < listings.len() {
        info!(dropped = listings.len() - products.len(), "Skipped listings without a title or link");
    }

    Ok(ListingScan {
        candidates: listings.len(),
        products,
    })
}

struct ListingSelectors {
    title: scraper::Selector,
    link: scraper::Selector,
    image: scraper::Selector,
    price: scraper::Selector,
    rating: scraper::Selector,
}

impl ListingSelectors {
    fn new() -> ScrapeResult<Self> {
        Ok(Self {
            title: selector(".s-item__title")?,
            link: selector("a.s-item__link")?,
            image: selector("img")?,
            price: selector(".s-item__price")?,
            rating: selector(".s-item__reviews")?,
        })
    }

    /// A product, or `None` when the listing lacks a title or link
    fn product(&self, listing: &ElementRef<'_>) -> Option<Product> {
        let title = select_text(listing, &self.title).filter(|title| !title.is_empty())?;
        let link = listing
            .select(&self.link)
            .next()
            .and_then(|link| link.value().attr("href"))
            .filter(|href| !href.is_empty())?
            .to_string();

        let image_url = listing
            .select(&self.image)
            .next()
            .and_then(|img| first_attr(&img, &["data-src", "src"]))
            .unwrap_or(PLACEHOLDER_IMAGE)
            .to_string();

        Some(Product {
            title,
            link,
            image_url,
            price: select_text(listing, &self.price).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            rating: select_text(listing, &self.rating).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;
    use crate::extract::test_support::{extractor, rendered_source, static_source};

    const SEARCH: &str = "https://www.ebay.com/sch/i.html?_nkw=usb+cable&_sop=12";

    const RESULTS: &str = r#"<ul>
        <li class="s-item s-item__pl-on-bottom">
          <img data-src="https://i.ebayimg.com/lazy.jpg" src="https://ir.ebaystatic.com/blank.gif">
          <a class="s-item__link" href="https://www.ebay.com/itm/1"><div class="s-item__title">USB-C cable 2m</div></a>
          <span class="s-item__price">$9.99</span>
          <div class="s-item__reviews">4.5 out of 5 stars</div>
        </li>
        <li class="s-item s-item__pl-on-bottom">
          <a class="s-item__link" href="https://www.ebay.com/itm/2"><div class="s-item__title">Braided cable</div></a>
        </li>
        <li class="s-item s-item__pl-on-bottom">
          <div class="s-item__title">No link here</div>
        </li>
    </ul>"#;

    fn document(markup: &str) -> PageDocument {
        PageDocument::new(Url::parse(SEARCH).unwrap(), markup)
    }

    #[test]
    fn test_listing_fields_and_defaults() {
        let scan = parse_listings(&document(RESULTS)).unwrap();

        assert_eq!(scan.candidates, 3);
        assert_eq!(
            scan.products,
            vec![
                Product {
                    title: "USB-C cable 2m".into(),
                    link: "https://www.ebay.com/itm/1".into(),
                    image_url: "https://i.ebayimg.com/lazy.jpg".into(),
                    price: "$9.99".into(),
                    rating: "4.5 out of 5 stars".into(),
                },
                Product {
                    title: "Braided cable".into(),
                    link: "https://www.ebay.com/itm/2".into(),
                    image_url: PLACEHOLDER_IMAGE.into(),
                    price: NOT_AVAILABLE.into(),
                    rating: NOT_AVAILABLE.into(),
                },
            ]
        );
    }

    #[test]
    fn test_fallback_listing_selector() {
        let markup = r#"<li data-viewport="{}">
            <a class="s-item__link" href="https://www.ebay.com/itm/9"><span class="s-item__title">Fallback item</span></a>
        </li>"#;
        let scan = parse_listings(&document(markup)).unwrap();
        assert_eq!(scan.products.len(), 1);
        assert_eq!(scan.products[0].title, "Fallback item");
    }

    #[tokio::test]
    async fn test_products_never_use_static_fetch() {
        let (extractor, fetcher, renderer) = extractor(
            static_source().with_page(SEARCH, RESULTS),
            rendered_source().with_page(SEARCH, RESULTS),
        );

        let result = extractor.extract_products("usb cable", &FetchOptions::default()).await;

        assert_eq!(result.into_option().map(|products| products.len()), Some(2));
        assert_eq!(fetcher.call_count(), 0);
        assert_eq!(renderer.requests()[0].wait_for.as_deref(), Some("li.s-item"));
    }

    #[tokio::test]
    async fn test_listings_without_links_are_not_found() {
        let markup = r#"<li class="s-item s-item__pl-on-bottom"><div class="s-item__title">Orphan</div></li>"#;
        let (extractor, _, _) = extractor(static_source(), rendered_source().with_page(SEARCH, markup));

        let result = extractor.extract_products("usb cable", &FetchOptions::default()).await;
        assert_eq!(result, Extraction::NotFound);
    }

    #[tokio::test]
    async fn test_render_failure_is_not_found() {
        let (extractor, _, _) = extractor(static_source(), rendered_source().failing(|| ScrapeError::BrowserUnavailable));

        let result = extractor.extract_products("usb cable", &FetchOptions::default()).await;
        assert_eq!(result, Extraction::NotFound);
    }
}
