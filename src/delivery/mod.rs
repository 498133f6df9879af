//! Batch delivery to the downstream analyzer
//!
//! A [`PageBatch`] is POSTed as JSON (optionally gzip-encoded) with bounded
//! exponential backoff between attempts. When every attempt fails the caller
//! gets [`DeliveryError::Exhausted`] and decides where the batch goes next.

mod backoff;
mod body;
mod client;

pub use backoff::{Backoff, MAX_BACKOFF};
pub use body::stream_batch;
pub use client::{DeliveryClient, DeliveryCounts};

use crate::archive::{Archive, BatchStats, PageMetadata, COMPRESSION};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::io;
use thiserror::Error;

/// The unit of delivery: one seed's archive plus its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageBatch {
    pub request_id: String,
    pub batch_id: String,
    pub main_url: String,
    pub batch_num: u32,
    pub is_complete: bool,
    pub total_pages: usize,
    pub archive_payload: String,
    pub compression: String,
    pub metadata: Vec<PageMetadata>,
    pub stats: BatchStats,
}

impl PageBatch {
    /// Wraps a finished seed archive as the seed's single, complete batch
    pub fn from_archive(
        request_id: impl Into<String>,
        main_url: impl Into<String>,
        archive: Archive,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            batch_id: uuid::Uuid::new_v4().to_string(),
            main_url: main_url.into(),
            batch_num: 1,
            is_complete: true,
            total_pages: archive.metadata.len(),
            archive_payload: archive.payload,
            compression: COMPRESSION.to_string(),
            metadata: archive.metadata,
            stats: archive.stats,
        }
    }
}

/// Errors that can occur while delivering a batch
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Analyzer responded with HTTP {status}")]
    Status { status: u16 },

    #[error("Transport error (transient: {transient}): {source}")]
    Transport {
        source: reqwest::Error,
        transient: bool,
    },

    #[error("Failed to encode batch: {0}")]
    Encode(String),

    #[error("Delivery failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<DeliveryError>,
    },
}

impl DeliveryError {
    pub(crate) fn transport(source: reqwest::Error) -> Self {
        let transient = is_transient(&source);
        Self::Transport { source, transient }
    }
}

/// Returns true for network failures expected to clear up on retry:
/// timeouts, resets, broken pipes and unexpected EOF
///
/// Only used for diagnostics; every failure consumes the same retry budget.
pub fn is_transient(error: &reqwest::Error) -> bool {
    if error.is_timeout() {
        return true;
    }

    let mut source: Option<&(dyn StdError + 'static)> = error.source();
    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::TimedOut
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        if is_transient_message(&err.to_string()) {
            return true;
        }
        source = err.source();
    }

    is_transient_message(&error.to_string())
}

fn is_transient_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    ["timeout", "timed out", "connection reset", "broken pipe", "unexpected eof"]
        .iter()
        .any(|needle| message.contains(needle))
}
