use scraper::{ElementRef, Selector};
use std::collections::HashSet;
use std::hash::Hash;
use url::Url;

use crate::error::{ScrapeError, ScrapeResult};

/// Parse a CSS selector, reporting failures as parse errors
pub fn selector(css: &str) -> ScrapeResult<Selector> {
    Selector::parse(css).map_err(|e| ScrapeError::parse(format!("Invalid CSS selector '{}': {}", css, e)))
}

/// Concatenated text of an element, trimmed
pub fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Trimmed text of the first match, or `None` when nothing matches
pub fn select_text(scope: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope.select(selector).next().map(|element| element_text(&element))
}

/// First non-empty attribute value, in priority order
pub fn first_attr<'a>(element: &ElementRef<'a>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| element.value().attr(name))
        .find(|value| !value.is_empty())
}

/// Resolve a possibly-relative reference against the page URL
pub fn resolve_url(base: &Url, reference: &str) -> Option<Url> {
    base.join(reference.trim()).ok()
}

/// Whether a string starts with an http(s) scheme
pub fn has_http_scheme(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Drop repeated items by key, keeping the first occurrence in order
pub fn dedup_by_key<T, K, F>(items: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(key(item))).collect()
}

/// Encode a search term for a query string, spaces as `+`
pub fn search_term(term: &str) -> String {
    url::form_urlencoded::byte_serialize(term.trim().as_bytes()).collect()
}
