//! Streaming request bodies for batch delivery
//!
//! A blocking task serializes the batch straight into a bounded channel,
//! optionally through a gzip encoder; the receiving half is handed to
//! reqwest as the request body. The encoded batch is never held in memory
//! as a whole.

use super::{DeliveryError, PageBatch};
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::Body;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

/// Bytes buffered before a chunk is sent down the channel
const CHUNK_SIZE: usize = 64 * 1024;

/// Chunks in flight between the encoder and the HTTP connection
const CHANNEL_DEPTH: usize = 8;

/// `Write` adapter that forwards fixed-size chunks over a channel
struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Vec<u8>>>,
    buf: Vec<u8>,
}

impl ChannelWriter {
    fn new(tx: mpsc::Sender<io::Result<Vec<u8>>>) -> Self {
        Self {
            tx,
            buf: Vec::with_capacity(CHUNK_SIZE),
        }
    }

    fn send_chunk(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::replace(&mut self.buf, Vec::with_capacity(CHUNK_SIZE));
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "request body dropped"))
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        if self.buf.len() >= CHUNK_SIZE {
            self.send_chunk()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_chunk()
    }
}

/// Starts encoding `batch` and returns the request body fed by the encoder
///
/// The returned handle resolves once encoding stops. An I/O failure there
/// means the HTTP side dropped the body early; that failure is reported by
/// the request itself, so the handle only yields [`DeliveryError::Encode`]
/// for genuine serialization errors.
pub fn stream_batch(
    batch: Arc<PageBatch>,
    gzip: bool,
) -> (Body, JoinHandle<Result<(), DeliveryError>>) {
    let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);

    let encoder = tokio::task::spawn_blocking(move || {
        match encode_into(batch.as_ref(), ChannelWriter::new(tx), gzip) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                tracing::trace!("Body encoder stopped early: {}", e);
                Ok(())
            }
            Err(e) => Err(DeliveryError::Encode(e.to_string())),
        }
    });

    (Body::wrap_stream(ReceiverStream::new(rx)), encoder)
}

/// Serializes `batch` as JSON into `writer`, gzip-compressed if asked
fn encode_into(batch: &PageBatch, writer: ChannelWriter, gzip: bool) -> io::Result<()> {
    if gzip {
        let mut gz = GzEncoder::new(writer, Compression::default());
        serde_json::to_writer(&mut gz, batch)?;
        gz.finish()?.flush()
    } else {
        let mut writer = writer;
        serde_json::to_writer(&mut writer, batch)?;
        writer.flush()
    }
}
