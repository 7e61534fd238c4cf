use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{file_size, InternalExportStats};
use crate::core::ImagePayload;
use crate::error::ScrapeResult;

/// Write downloaded images into a zip, one entry per payload named after
/// the last URL path segment
pub(crate) async fn export_archive(payloads: &[ImagePayload], output_path: &Path) -> ScrapeResult<InternalExportStats> {
    debug!("Archiving {} images into {}", payloads.len(), output_path.display());

    let mut archive = ZipWriter::new(File::create(output_path)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut names = EntryNames::default();

    for payload in payloads {
        let name = names.unique(&payload.file_name());
        archive.start_file(name, options)?;
        archive.write_all(&payload.bytes)?;
    }
    archive.finish()?;

    let file_size_bytes = file_size(output_path).await?;
    info!("Archive export completed: {} images, {} bytes", payloads.len(), file_size_bytes);

    Ok(InternalExportStats {
        record_count: payloads.len(),
        file_size_bytes,
    })
}

/// Zip entries must be unique; repeats get the first free numeric suffix
/// before the extension
#[derive(Default)]
struct EntryNames {
    taken: HashSet<String>,
}

impl EntryNames {
    fn unique(&mut self, name: &str) -> String {
        let mut candidate = name.to_string();
        let mut suffix = 0;
        while self.taken.contains(&candidate) {
            suffix += 1;
            candidate = match name.rsplit_once('.') {
                Some((stem, extension)) => format!("{}-{}.{}", stem, suffix, extension),
                None => format!("{}-{}", name, suffix),
            };
        }

        self.taken.insert(candidate.clone());
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_one_entry_per_payload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scraped_images.zip");
        let payloads = vec![
            ImagePayload {
                url: "https://example.com/a/logo.png".into(),
                bytes: b"first".to_vec(),
            },
            ImagePayload {
                url: "https://example.com/b/logo.png?v=2".into(),
                bytes: b"second".to_vec(),
            },
            ImagePayload {
                url: "https://example.com/photo.jpg".into(),
                bytes: b"third".to_vec(),
            },
        ];

        let stats = export_archive(&payloads, &path).await.unwrap();
        assert_eq!(stats.record_count, 3);

        let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 3);

        let mut contents = String::new();
        archive.by_name("logo-1.png").unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "second");
        assert!(archive.by_name("logo.png").is_ok());
        assert!(archive.by_name("photo.jpg").is_ok());
    }

    #[tokio::test]
    async fn test_empty_archive_is_valid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.zip");

        export_archive(&[], &path).await.unwrap();
        let archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 0);
    }

    #[test]
    fn test_suffixed_names_never_collide_with_real_names() {
        let mut names = EntryNames::default();
        let produced: Vec<String> = ["logo.png", "logo.png", "logo-1.png", "logo.png", "README"]
            .iter()
            .map(|name| names.unique(name))
            .collect();

        assert_eq!(produced, vec!["logo.png", "logo-1.png", "logo-1-1.png", "logo-2.png", "README"]);
    }

    #[tokio::test]
    async fn test_archive_entries_stay_distinct() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scraped_images.zip");
        let payloads: Vec<ImagePayload> = ["a/logo.png", "b/logo.png", "logo-1.png"]
            .iter()
            .map(|path| ImagePayload {
                url: format!("https://example.com/{}", path),
                bytes: path.as_bytes().to_vec(),
            })
            .collect();

        export_archive(&payloads, &path).await.unwrap();

        let archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 3);
    }
}
