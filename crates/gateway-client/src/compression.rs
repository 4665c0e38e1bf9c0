//! Streaming message decompression
//!
//! The compressed transport delivers one continuous zlib deflate stream
//! spread across many binary WebSocket frames. A logical message is complete
//! only once the accumulated bytes end with the 4-byte full-flush marker;
//! the inflate context persists across messages for the lifetime of one
//! socket connection and must be recreated on every reconnect.

use flate2::{Decompress, FlushDecompress, Status};

/// Zlib full-flush suffix that terminates each complete message
pub const ZLIB_SUFFIX: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

/// Output buffer growth step while inflating
const INFLATE_CHUNK: usize = 16 * 1024;

/// Streaming decompressor for the zlib-stream transport
///
/// Exclusive access (`&mut self`) serializes pushes; the inflate context is
/// single-threaded mutable state and decompressions must never interleave.
#[derive(Debug)]
pub struct ZlibStreamDecompressor {
    /// Live inflate context; created lazily so the first chunk can decide
    /// whether the stream carries the 2-byte zlib header
    inflate: Option<Decompress>,

    /// Compressed bytes accumulated for the message currently in flight
    buffer: Vec<u8>,
}

impl ZlibStreamDecompressor {
    /// Create a fresh context for a new socket connection
    #[must_use]
    pub fn new() -> Self {
        Self {
            inflate: None,
            buffer: Vec::new(),
        }
    }

    /// Number of compressed bytes buffered for the incomplete message
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Feed one binary frame; returns the decoded text once a message is complete
    ///
    /// Frames are appended to the accumulation buffer until the trailing
    /// bytes equal [`ZLIB_SUFFIX`]; until then `Ok(None)` is returned.
    pub fn push(&mut self, frame: &[u8]) -> Result<Option<String>, DecompressError> {
        self.buffer.extend_from_slice(frame);

        if self.buffer.len() < ZLIB_SUFFIX.len() || !self.buffer.ends_with(&ZLIB_SUFFIX) {
            return Ok(None);
        }

        let inflate = self.inflate.get_or_insert_with(|| {
            // 0x78 is the zlib CMF byte; without it the stream is raw deflate
            let zlib_header = self.buffer.first() == Some(&0x78);
            Decompress::new(zlib_header)
        });

        let mut out = Vec::with_capacity(INFLATE_CHUNK);
        let mut read = 0usize;
        loop {
            let before = inflate.total_in();
            let status = inflate
                .decompress_vec(&self.buffer[read..], &mut out, FlushDecompress::Sync)
                .map_err(|_| DecompressError::Corrupt)?;
            read += usize::try_from(inflate.total_in() - before).unwrap_or(usize::MAX);

            if status == Status::StreamEnd {
                break;
            }
            if out.len() == out.capacity() {
                // Output side filled up; grow and keep draining
                out.reserve(INFLATE_CHUNK);
                continue;
            }
            if read >= self.buffer.len() {
                break;
            }
        }

        self.buffer.clear();
        let text = String::from_utf8(out).map_err(|_| DecompressError::InvalidText)?;
        Ok(Some(text))
    }
}

impl Default for ZlibStreamDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

/// Decompression error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecompressError {
    /// The deflate stream is corrupt and the connection must be dropped
    #[error("corrupt deflate stream")]
    Corrupt,

    /// The inflated message is not valid UTF-8
    #[error("decompressed message is not valid UTF-8")]
    InvalidText,
}
