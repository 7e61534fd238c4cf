use serde::Serialize;
use serde_json::to_writer_pretty;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

use super::{file_size, InternalExportStats};
use crate::error::ScrapeResult;
use crate::extract::ExtractionResult;

/// Export a result as pretty-printed JSON. Lists are wrapped in a single
/// key object; movie and book records are written as they are.
pub(crate) async fn export_json(result: &ExtractionResult, output_path: &Path) -> ScrapeResult<InternalExportStats> {
    debug!("Exporting {} records to JSON: {}", result.item_count(), output_path.display());

    let mut writer = BufWriter::new(File::create(output_path)?);

    match result {
        ExtractionResult::Images(urls) => write_wrapped(&mut writer, "images", urls)?,
        ExtractionResult::Text(text) => write_wrapped(&mut writer, "text", text)?,
        ExtractionResult::Tables(tables) => write_wrapped(&mut writer, "tables", tables)?,
        ExtractionResult::Movie(record) => to_writer_pretty(&mut writer, record)?,
        ExtractionResult::Book(record) => to_writer_pretty(&mut writer, record)?,
        ExtractionResult::Videos(urls) => write_wrapped(&mut writer, "videos", urls)?,
        ExtractionResult::Products(products) => write_wrapped(&mut writer, "products", products)?,
        ExtractionResult::Headlines(headlines) => write_wrapped(&mut writer, "headlines", headlines)?,
        ExtractionResult::DocumentLinks(links) => write_wrapped(&mut writer, "pdf_links", links)?,
    }
    writer.flush()?;
    drop(writer);

    let record_count = result.item_count();
    let file_size_bytes = file_size(output_path).await?;
    info!("JSON export completed: {} records, {} bytes", record_count, file_size_bytes);

    Ok(InternalExportStats {
        record_count,
        file_size_bytes,
    })
}

fn write_wrapped<W: Write, T: Serialize + ?Sized>(writer: &mut W, key: &str, value: &T) -> ScrapeResult<()> {
    let wrapped = BTreeMap::from([(key, value)]);
    to_writer_pretty(writer, &wrapped)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{DetailRecord, DocumentLink, MovieDetails, Product};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    async fn export_to_value(result: &ExtractionResult) -> Value {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        export_json(result, &path).await.unwrap();
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_products_round_trip_in_order() {
        let products = vec![
            Product {
                title: "USB-C cable 2m".into(),
                link: "https://www.ebay.com/itm/1".into(),
                image_url: "https://i.ebayimg.com/1.jpg".into(),
                price: "$9.99".into(),
                rating: "4.5 out of 5 stars".into(),
            },
            Product {
                title: "Braided cable".into(),
                link: "https://www.ebay.com/itm/2".into(),
                image_url: "https://via.placeholder.com/150?text=No+Image".into(),
                price: "N/A".into(),
                rating: "N/A".into(),
            },
        ];

        let value = export_to_value(&ExtractionResult::Products(products.clone())).await;
        let parsed: Vec<Product> = serde_json::from_value(value["products"].clone()).unwrap();
        assert_eq!(parsed, products);
    }

    #[tokio::test]
    async fn test_wrapped_keys() {
        let value = export_to_value(&ExtractionResult::DocumentLinks(vec![DocumentLink {
            url: "https://x.org/a.pdf".into(),
            name: "a.pdf".into(),
        }]))
        .await;
        assert_eq!(value, json!({"pdf_links": [{"url": "https://x.org/a.pdf", "name": "a.pdf"}]}));

        let value = export_to_value(&ExtractionResult::Tables(vec![vec![vec!["A".into()]]])).await;
        assert_eq!(value, json!({"tables": [[["A"]]]}));

        let value = export_to_value(&ExtractionResult::Text("hello".into())).await;
        assert_eq!(value, json!({"text": "hello"}));
    }

    #[tokio::test]
    async fn test_detail_records_written_as_is() {
        let record = DetailRecord::Found(MovieDetails {
            name: "The Matrix".into(),
            poster_url: "N/A".into(),
            year: "1999".into(),
            rating: "8.7/10".into(),
            plot: "N/A".into(),
            genre: "Action".into(),
            movie_link: "https://www.imdb.com/title/tt0133093/".into(),
        });
        let value = export_to_value(&ExtractionResult::Movie(record)).await;
        assert_eq!(value["name"], "The Matrix");
        assert!(value.get("error").is_none());

        let value = export_to_value(&ExtractionResult::Movie(DetailRecord::error("No movie found with that name."))).await;
        assert_eq!(value, json!({"error": "No movie found with that name."}));
    }
}
