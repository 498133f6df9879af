use crate::UrlError;
use url::Url;

/// Schemes that never lead to a fetchable page
const NON_NAVIGABLE_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Parses and normalizes a seed URL
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace and parse; reject if malformed
/// 2. Require an HTTP(S) scheme
/// 3. Require a host
/// 4. Remove the fragment
///
/// # Examples
///
/// ```
/// use crawl_relay::url::normalize_seed;
///
/// let url = normalize_seed(" https://example.com/start#top ").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/start");
/// ```
pub fn normalize_seed(seed: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(seed.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);
    Ok(url)
}

/// Resolves a link found on `base` into an absolute, fragment-free URL
///
/// Returns None if the link should be discarded:
/// - empty or fragment-only hrefs
/// - `javascript:`, `mailto:`, `tel:` and `data:` pseudo-URLs
/// - hrefs that fail to resolve
/// - non-HTTP(S) URLs after resolution
///
/// # Examples
///
/// ```
/// use crawl_relay::url::normalize_link;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/docs/intro").unwrap();
/// let link = normalize_link(&base, "../about#team").unwrap();
/// assert_eq!(link.as_str(), "https://example.com/about");
/// assert!(normalize_link(&base, "javascript:void(0)").is_none());
/// ```
pub fn normalize_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if NON_NAVIGABLE_SCHEMES
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    url.set_fragment(None);
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/docs/page").unwrap()
    }

    #[test]
    fn test_normalize_seed_strips_fragment() {
        let url = normalize_seed("https://example.com/#hero").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_normalize_seed_rejects_missing_host() {
        assert!(matches!(
            normalize_seed("https://"),
            Err(UrlError::Parse(_)) | Err(UrlError::MissingHost)
        ));
        assert!(normalize_seed("not a url").is_err());
    }

    #[test]
    fn test_normalize_seed_rejects_other_schemes() {
        assert!(matches!(
            normalize_seed("ftp://example.com/file"),
            Err(UrlError::InvalidScheme(_))
        ));
    }

    #[test]
    fn test_normalize_seed_keeps_port() {
        let url = normalize_seed("http://127.0.0.1:8080/").unwrap();
        assert_eq!(url.port(), Some(8080));
    }

    #[test]
    fn test_relative_link() {
        let url = normalize_link(&base(), "other").unwrap();
        assert_eq!(url.as_str(), "https://example.com/docs/other");
    }

    #[test]
    fn test_root_relative_link() {
        let url = normalize_link(&base(), "/contact?x=1").unwrap();
        assert_eq!(url.as_str(), "https://example.com/contact?x=1");
    }

    #[test]
    fn test_fragment_removed() {
        let url = normalize_link(&base(), "/a#b").unwrap();
        assert_eq!(url.as_str(), "https://example.com/a");
    }

    #[test]
    fn test_pseudo_urls_discarded() {
        assert!(normalize_link(&base(), "javascript:alert(1)").is_none());
        assert!(normalize_link(&base(), "  JavaScript:void(0)").is_none());
        assert!(normalize_link(&base(), "mailto:a@example.com").is_none());
        assert!(normalize_link(&base(), "tel:+100").is_none());
        assert!(normalize_link(&base(), "data:text/html,hi").is_none());
    }

    #[test]
    fn test_empty_and_fragment_only_discarded() {
        assert!(normalize_link(&base(), "").is_none());
        assert!(normalize_link(&base(), "   ").is_none());
        assert!(normalize_link(&base(), "#section").is_none());
    }

    #[test]
    fn test_non_http_scheme_discarded() {
        assert!(normalize_link(&base(), "ftp://example.com/file").is_none());
    }
}
