use csv::{Writer, WriterBuilder};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

use super::{file_size, InternalExportStats};
use crate::error::ScrapeResult;
use crate::extract::{DetailFields, DetailRecord, ExtractionResult};

/// Separator between cells when a table row is flattened into one column
const CELL_SEPARATOR: &str = " | ";

/// Export a result with the fixed column mapping for its kind
pub(crate) async fn export_csv(result: &ExtractionResult, output_path: &Path) -> ScrapeResult<InternalExportStats> {
    debug!("Exporting {} records to CSV: {}", result.item_count(), output_path.display());

    let file = File::create(output_path)?;
    // Tables rows and detail records differ in width from their headers
    let mut writer = WriterBuilder::new().has_headers(false).flexible(true).from_writer(file);

    let record_count = write_result(&mut writer, result)?;
    writer.flush()?;
    drop(writer);

    let file_size_bytes = file_size(output_path).await?;
    info!("CSV export completed: {} records, {} bytes", record_count, file_size_bytes);

    Ok(InternalExportStats {
        record_count,
        file_size_bytes,
    })
}

fn write_result<W: std::io::Write>(writer: &mut Writer<W>, result: &ExtractionResult) -> ScrapeResult<usize> {
    match result {
        ExtractionResult::Images(urls) => write_column(writer, "Image URL", urls),
        ExtractionResult::Videos(urls) => write_column(writer, "Video URL", urls),
        ExtractionResult::Headlines(headlines) => write_column(writer, "Headline", headlines),
        ExtractionResult::Text(text) => write_column(writer, "Text Content", std::slice::from_ref(text)),
        ExtractionResult::Tables(tables) => {
            writer.write_record(["Table Index", "Row Data"])?;
            let mut rows = 0;
            for (index, table) in tables.iter().enumerate() {
                for row in table {
                    writer.write_record([(index + 1).to_string(), row.join(CELL_SEPARATOR)])?;
                    rows += 1;
                }
            }
            Ok(rows)
        }
        ExtractionResult::Movie(record) => write_detail_record(writer, record),
        ExtractionResult::Book(record) => write_detail_record(writer, record),
        ExtractionResult::Products(products) => {
            writer.write_record(["Title", "Link", "Image URL", "Price", "Rating"])?;
            for product in products {
                writer.write_record([
                    &product.title,
                    &product.link,
                    &product.image_url,
                    &product.price,
                    &product.rating,
                ])?;
            }
            Ok(products.len())
        }
        ExtractionResult::DocumentLinks(links) => {
            writer.write_record(["PDF Name", "URL"])?;
            for link in links {
                writer.write_record([&link.name, &link.url])?;
            }
            Ok(links.len())
        }
    }
}

fn write_column<W: std::io::Write>(writer: &mut Writer<W>, header: &str, values: &[String]) -> ScrapeResult<usize> {
    writer.write_record([header])?;
    for value in values {
        writer.write_record([value])?;
    }
    Ok(values.len())
}

/// Field names as the header row, values as the single data row
fn write_detail_record<W, T>(writer: &mut Writer<W>, record: &DetailRecord<T>) -> ScrapeResult<usize>
where
    W: std::io::Write,
    T: DetailFields,
{
    match record {
        DetailRecord::Found(details) => {
            let fields = details.fields();
            writer.write_record(fields.iter().map(|(name, _)| *name))?;
            writer.write_record(fields.iter().map(|(_, value)| *value))?;
            Ok(1)
        }
        DetailRecord::Error { error } => {
            writer.write_record(["error"])?;
            writer.write_record([error])?;
            Ok(0)
        }
    }
}
