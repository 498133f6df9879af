//! HTML link extraction
//!
//! Parses fetched HTML and returns the links a seed crawl may follow.

use crate::url::{host_key, normalize_link, same_host};
use scraper::{Html, Selector};
use url::Url;

/// Extracts absolute links from `<a href>` tags that stay on `base_url`'s host
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags resolved against `base_url`
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - fragment-only anchors
/// - links whose host differs (case-insensitively) from the base host
///
/// Fragments are removed from returned links. Order follows the document;
/// duplicates are kept, the crawl's visited set handles them.
///
/// # Example
///
/// ```
/// use crawl_relay::crawler::extract_same_host_links;
/// use url::Url;
///
/// let html = r#"<a href="/a">A</a><a href="https://other.com/">B</a>"#;
/// let base = Url::parse("https://example.com/").unwrap();
/// let links = extract_same_host_links(html, &base);
/// assert_eq!(links.len(), 1);
/// assert_eq!(links[0].as_str(), "https://example.com/a");
/// ```
pub fn extract_same_host_links(html: &str, base_url: &Url) -> Vec<Url> {
    let Some(base_host) = host_key(base_url) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| normalize_link(base_url, href))
        .filter(|link| same_host(&base_host, link))
        .collect()
}
