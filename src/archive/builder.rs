use super::{archive_file_name, Archive, ArchiveError, BatchStats, PageMetadata};
use crate::crawler::PageResult;
use base64::Engine;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Packages a seed's pages into one zip archive, base64-encoded
///
/// Pages with a body and no fetch error become archive entries named by
/// [`archive_file_name`] (1-based position in `pages`). Failed or empty pages
/// appear in the metadata only.
///
/// # Guarantees
///
/// - `metadata.len() == pages.len()`, in input order
/// - `stats.successful + stats.failed == pages.len()`
///
/// # Returns
///
/// * `Ok(Archive)` - Encoded payload, metadata and stats
/// * `Err(ArchiveError)` - The zip writer failed
pub fn build_archive(pages: &[PageResult]) -> Result<Archive, ArchiveError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut metadata = Vec::with_capacity(pages.len());
    let mut stats = BatchStats::default();

    for (idx, page) in pages.iter().enumerate() {
        let mut meta = PageMetadata {
            url: page.url.clone(),
            file_name: None,
            content_type: page.content_type.clone(),
            error: page.error.clone(),
            size_bytes: 0,
            has_html: false,
        };

        if page.error.is_some() || page.html.is_empty() {
            stats.failed += 1;
            metadata.push(meta);
            continue;
        }

        let file_name = archive_file_name(idx + 1, &page.url);
        zip.start_file(file_name.as_str(), options)?;
        zip.write_all(page.html.as_bytes())?;

        meta.file_name = Some(file_name);
        meta.size_bytes = page.html.len();
        meta.has_html = true;
        stats.successful += 1;
        metadata.push(meta);
    }

    let bytes = zip.finish()?.into_inner();
    tracing::debug!(
        "Built archive: {} entries, {} failed, {} bytes",
        stats.successful,
        stats.failed,
        bytes.len()
    );

    Ok(Archive {
        payload: base64::engine::general_purpose::STANDARD.encode(bytes),
        metadata,
        stats,
    })
}
