//! Archive builder: packages a seed's fetched pages for delivery
//!
//! The archive is a zip file, base64-encoded so it travels inside the JSON
//! batch. Each input page gets exactly one [`PageMetadata`] entry.

mod builder;
mod naming;

pub use builder::build_archive;
pub use naming::archive_file_name;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Value of the batch `compression` field for archives built here
pub const COMPRESSION: &str = "zip-base64";

/// Errors that can occur while building an archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-page record inside a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub url: String,
    /// Archive entry name; absent when the page has no body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub size_bytes: usize,
    pub has_html: bool,
}

/// Aggregate outcome of a batch's pages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub successful: usize,
    pub failed: usize,
}

/// Output of [`build_archive`]
#[derive(Debug, Clone)]
pub struct Archive {
    /// Base64 of the zip bytes
    pub payload: String,
    pub metadata: Vec<PageMetadata>,
    pub stats: BatchStats,
}
