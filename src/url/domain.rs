use url::Url;

/// Extracts the host key used to decide whether two URLs belong to one site
///
/// The key is the lowercase host followed by `:port` when the URL carries a
/// non-default port, so `http://127.0.0.1:8080` and `http://127.0.0.1:9090`
/// are different sites.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use crawl_relay::url::host_key;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(host_key(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(host_key(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    if host.is_empty() {
        return None;
    }
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// Returns true if `url` lives on the site identified by `host`
///
/// `host` is compared case-insensitively against [`host_key`].
pub fn same_host(host: &str, url: &Url) -> bool {
    host_key(url).is_some_and(|key| key.eq_ignore_ascii_case(host))
}
