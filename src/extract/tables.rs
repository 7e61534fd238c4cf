use scraper::ElementRef;
use url::Url;

use super::helpers::{element_text, selector};
use super::{Extraction, Extractor};
use crate::error::ScrapeResult;
use crate::logging::{LogContext, RequestIdGenerator};
use crate::scraper::{FetchOptions, PageDocument, PageRequest};

/// Rows of cell strings; the header row, when present, is row 0
pub type Table = Vec<Vec<String>>;

impl Extractor {
    /// Every table on a page in document order. Static fetch only, sent
    /// without custom headers.
    pub async fn extract_tables(&self, url: &Url, timeout: std::time::Duration) -> Extraction<Vec<Table>> {
        let context = LogContext::new("extract", "tables")
            .with_request_id(RequestIdGenerator::generate())
            .with_url(url.as_str());

        let options = FetchOptions {
            timeout,
            ..FetchOptions::default()
        };
        let request = PageRequest::new(url.clone(), options);

        let document = match self.fetch_static(&request).await {
            Ok(document) => document,
            Err(e) => {
                let context = context.with_error_category(e.category());
                crate::log_error!(context, e, "Failed to fetch tables");
                return Extraction::NotFound;
            }
        };

        match parse_tables(&document) {
            Ok(tables) => {
                let context = context.with_number_field("tables", tables.len() as i64);
                crate::log_info!(context, "Parsed tables");
                Extraction::from_items(tables)
            }
            Err(e) => {
                let context = context.with_error_category(e.category());
                crate::log_error!(context, e, "Failed to parse tables");
                Extraction::NotFound
            }
        }
    }
}

pub fn parse_tables(document: &PageDocument) -> ScrapeResult<Vec<Table>> {
    let html = document.parse();
    let tables = selector("table")?;
    let header_cells = selector("th")?;
    let rows = selector("tr")?;
    let data_cells = selector("td")?;

    let parsed = html
        .select(&tables)
        .map(|table| parse_table(table, &header_cells, &rows, &data_cells))
        .filter(|table| !table.is_empty())
        .collect();

    Ok(parsed)
}

fn parse_table(
    table: ElementRef<'_>,
    header_cells: &scraper::Selector,
    rows: &scraper::Selector,
    data_cells: &scraper::Selector,
) -> Table {
    let headers: Vec<String> = table.select(header_cells).map(|cell| element_text(&cell)).collect();

    // The first row carries the headers when there are any
    let skip = usize::from(!headers.is_empty());

    let mut parsed: Table = table
        .select(rows)
        .skip(skip)
        .filter_map(|row| {
            let cells: Vec<String> = row.select(data_cells).map(|cell| element_text(&cell)).collect();
            if cells.is_empty() {
                None
            } else {
                Some(cells)
            }
        })
        .collect();

    if !headers.is_empty() {
        parsed.insert(0, headers);
    }

    parsed
}
