//! MIME type detection strategies.
//!
//! Two strategies share one trait and are picked by [`DetectionMode`]:
//!
//! - [`FastMimeTypeDetectionStrategy`] reads at most [`MARK_LIMIT`] leading
//!   bytes and matches magic numbers, falling back to the file extension. Streams
//!   must support mark/reset because the bytes are read ahead of the upload.
//! - [`PreciseMimeTypeDetectionStrategy`] reads the whole payload and decodes it,
//!   so a file that only starts like a PNG is rejected.

mod fast;
mod precise;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::config::DetectionMode;
use crate::stream::ImageStream;

pub use fast::{FastMimeTypeDetectionStrategy, MARK_LIMIT};
pub use precise::PreciseMimeTypeDetectionStrategy;

pub(crate) const OCTET_STREAM: &str = "application/octet-stream";
pub(crate) const TEXT_PLAIN: &str = "text/plain";

/// Result type for MIME detection
pub type DetectionResult<T> = Result<T, DetectionError>;

/// Errors raised while detecting a MIME type
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Stream must support mark/reset for fast MIME detection")]
    MarkUnsupported,

    #[error("MIME detection succeeded, but failed to reset the stream for reuse")]
    ResetFailed {
        #[source]
        source: std::io::Error,
    },

    #[error("Nothing to detect: input is empty")]
    EmptyInput,

    #[error("I/O error during MIME detection: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Precise MIME detection failed for {context}: {source}")]
    Parse {
        context: String,
        #[source]
        source: image::ImageError,
    },

    #[error("MIME detection task failed: {source}")]
    Task {
        #[source]
        source: tokio::task::JoinError,
    },
}

/// Detects the MIME type of a file or stream
#[async_trait]
pub trait MimeTypeDetectionStrategy: Send + Sync {
    /// Detect the MIME type of a file on disk
    async fn detect_file(&self, path: &Path) -> DetectionResult<String>;

    /// Detect the MIME type of a stream.
    ///
    /// On success the stream is positioned where it was before the call.
    async fn detect_stream(&self, stream: &mut ImageStream) -> DetectionResult<String>;

    /// Mode this strategy implements
    fn mode(&self) -> DetectionMode;
}

/// Match magic numbers, then fall back to a plain-text check
pub(crate) fn sniff(head: &[u8]) -> Option<&'static str> {
    if let Some(kind) = infer::get(head) {
        return Some(kind.mime_type());
    }
    if looks_like_text(head) {
        return Some(TEXT_PLAIN);
    }
    None
}

fn looks_like_text(head: &[u8]) -> bool {
    if head.is_empty() || head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        // a multi-byte character cut off at the end of the head
        Err(e) => e.error_len().is_none(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_magic_numbers() {
        assert_eq!(sniff(&fixtures::png_bytes()), Some("image/png"));
        assert_eq!(sniff(&fixtures::jpeg_bytes()), Some("image/jpeg"));
        assert_eq!(sniff(b"GIF89a\x01\x00\x01\x00"), Some("image/gif"));
        assert_eq!(sniff(&fixtures::psd_header_bytes()), Some("image/vnd.adobe.photoshop"));
    }

    #[test]
    fn test_sniff_text() {
        assert_eq!(sniff(b"just some notes\n"), Some(TEXT_PLAIN));
        // cut in the middle of a two-byte character
        assert_eq!(sniff(&"caf\u{e9}".as_bytes()[..4]), Some(TEXT_PLAIN));
    }

    #[test]
    fn test_sniff_unknown_binary() {
        assert_eq!(sniff(&[0x00, 0x13, 0x37, 0x00, 0xfe]), None);
        assert_eq!(sniff(&[]), None);
    }
}
