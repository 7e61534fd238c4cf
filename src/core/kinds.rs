use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ScrapeError, ScrapeResult};

const URL_PATTERN: &str = r"^https?://[^\s/$.?#].[^\s]*$";

/// The kind of data a session extracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataKind {
    Images,
    Text,
    Tables,
    MovieDetails,
    BookDetails,
    Videos,
    Products,
    Headlines,
    DocumentLinks,
}

impl DataKind {
    pub const ALL: [DataKind; 9] = [
        DataKind::Images,
        DataKind::Text,
        DataKind::Tables,
        DataKind::MovieDetails,
        DataKind::BookDetails,
        DataKind::Videos,
        DataKind::Products,
        DataKind::Headlines,
        DataKind::DocumentLinks,
    ];

    /// False for kinds whose input is a search term
    pub fn takes_url(&self) -> bool {
        !matches!(self, DataKind::MovieDetails | DataKind::BookDetails | DataKind::Products)
    }

    /// Stem used in default export file names
    pub fn file_stem(&self) -> &'static str {
        match self {
            DataKind::Images => "images",
            DataKind::Text => "text",
            DataKind::Tables => "tables",
            DataKind::MovieDetails => "movie_details",
            DataKind::BookDetails => "book_details",
            DataKind::Videos => "videos",
            DataKind::Products => "products",
            DataKind::Headlines => "headlines",
            DataKind::DocumentLinks => "pdf_links",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DataKind::Images => "images",
            DataKind::Text => "text",
            DataKind::Tables => "tables",
            DataKind::MovieDetails => "movie details",
            DataKind::BookDetails => "book details",
            DataKind::Videos => "videos",
            DataKind::Products => "products",
            DataKind::Headlines => "news headlines",
            DataKind::DocumentLinks => "PDF links",
        };
        write!(f, "{}", label)
    }
}

impl FromStr for DataKind {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "images" | "image" => Ok(DataKind::Images),
            "text" => Ok(DataKind::Text),
            "tables" | "table" => Ok(DataKind::Tables),
            "movie-details" | "movie" | "movies" => Ok(DataKind::MovieDetails),
            "book-details" | "book" | "books" => Ok(DataKind::BookDetails),
            "videos" | "video" => Ok(DataKind::Videos),
            "products" | "product" | "ebay-products" => Ok(DataKind::Products),
            "headlines" | "news" | "news-headlines" => Ok(DataKind::Headlines),
            "pdf-links" | "pdfs" | "documents" | "document-links" => Ok(DataKind::DocumentLinks),
            _ => Err(ScrapeError::invalid_input(format!("Unknown data kind: {}", s))),
        }
    }
}

/// Validate user input for a kind and bring URLs into canonical form
pub fn normalize_input(kind: DataKind, raw: &str) -> ScrapeResult<String> {
    let input = raw.trim();
    if input.is_empty() {
        return Err(ScrapeError::invalid_input("Please enter a URL or search term"));
    }

    match kind {
        DataKind::MovieDetails | DataKind::BookDetails => {
            let compact: String = input.chars().filter(|c| *c != ' ').collect();
            if compact.chars().all(char::is_alphanumeric) {
                Ok(input.to_string())
            } else {
                Err(ScrapeError::invalid_input("Please enter a valid movie or book name"))
            }
        }
        DataKind::Products => Ok(input.to_string()),
        _ => normalize_url(input),
    }
}

fn normalize_url(input: &str) -> ScrapeResult<String> {
    let pattern = Regex::new(URL_PATTERN).map_err(|e| ScrapeError::internal(e.to_string()))?;
    if pattern.is_match(input) {
        return Ok(input.to_string());
    }

    let candidate = if input.starts_with("http://") || input.starts_with("https://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };

    if pattern.is_match(&candidate) {
        Ok(candidate)
    } else {
        Err(ScrapeError::invalid_input("Invalid URL format"))
    }
}
