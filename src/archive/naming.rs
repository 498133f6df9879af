use sha2::{Digest, Sha256};
use url::Url;

/// Longest stem kept before the index suffix
const MAX_STEM_LEN: usize = 120;

/// Hex characters of the URL digest appended to truncated stems
const DIGEST_LEN: usize = 16;

/// Derives the archive entry name of the `index`-th page of a batch
///
/// The name is `<stem>-<index:04>.html`, where the stem is the URL's host
/// and path with every run of characters outside `[A-Za-z0-9._-]` replaced
/// by a single `-`. A stem longer than 120 characters is cut and suffixed
/// with a digest of the full URL, so long URLs sharing a prefix still get
/// readable, distinct stems.
///
/// # Uniqueness
///
/// The index is the last `-`-separated component and contains only digits,
/// so distinct indices always yield distinct names, whatever the URLs. The
/// output is a pure function of `(index, url)`.
///
/// # Examples
///
/// ```
/// use crawl_relay::archive::archive_file_name;
///
/// assert_eq!(
///     archive_file_name(3, "https://example.com/docs/intro"),
///     "example.com-docs-intro-0003.html"
/// );
/// assert_eq!(archive_file_name(1, "https://example.com/"), "example.com-index-0001.html");
/// ```
pub fn archive_file_name(index: usize, url: &str) -> String {
    let raw = match Url::parse(url) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or_default();
            let path = parsed.path().trim_matches('/');
            let path = if path.is_empty() { "index" } else { path };
            format!("{}-{}", host, path)
        }
        Err(_) => String::new(),
    };

    let mut stem = sanitize(&raw);
    if stem.is_empty() {
        stem = "page".to_string();
    }

    if stem.len() > MAX_STEM_LEN {
        let digest = hex::encode(Sha256::digest(url.as_bytes()));
        // Sanitized stems are ASCII, so byte truncation is safe
        stem.truncate(MAX_STEM_LEN - DIGEST_LEN - 1);
        let stem_trimmed = stem.trim_end_matches('-').to_string();
        stem = format!("{}-{}", stem_trimmed, &digest[..DIGEST_LEN]);
    }

    format!("{}-{:04}.html", stem, index)
}

/// Collapses every run of disallowed characters into one `-` and trims
/// leading/trailing dashes
fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_dash = false;

    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }

    out.trim_matches('-').to_string()
}
