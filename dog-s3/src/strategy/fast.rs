use async_trait::async_trait;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use super::{sniff, DetectionError, DetectionResult, MimeTypeDetectionStrategy, OCTET_STREAM};
use crate::config::DetectionMode;
use crate::stream::ImageStream;
use crate::types::ImageType;

/// Bytes read ahead of the upload when sniffing
pub const MARK_LIMIT: usize = 2048;

/// Detects from the leading bytes, with the file extension as a fallback.
///
/// Trades accuracy for a bounded read: a file that starts with a PNG
/// signature is reported as PNG even if the rest is corrupt.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastMimeTypeDetectionStrategy;

impl FastMimeTypeDetectionStrategy {
    pub fn new() -> Self {
        Self
    }
}

async fn read_head<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(MARK_LIMIT);
    reader.take(MARK_LIMIT as u64).read_to_end(&mut head).await?;
    Ok(head)
}

#[async_trait]
impl MimeTypeDetectionStrategy for FastMimeTypeDetectionStrategy {
    async fn detect_file(&self, path: &Path) -> DetectionResult<String> {
        let mut file = tokio::fs::File::open(path).await?;
        let head = read_head(&mut file).await?;

        let mime_type = sniff(&head)
            .or_else(|| ImageType::from_path(path).map(|image_type| image_type.mime_type()))
            .unwrap_or(OCTET_STREAM);

        debug!("Fast MIME detection: file={}, mime={}", path.display(), mime_type);
        Ok(mime_type.to_string())
    }

    async fn detect_stream(&self, stream: &mut ImageStream) -> DetectionResult<String> {
        if !stream.supports_mark() {
            return Err(DetectionError::MarkUnsupported);
        }

        stream.mark(MARK_LIMIT).await?;
        let head = read_head(stream).await;
        stream
            .reset()
            .await
            .map_err(|source| DetectionError::ResetFailed { source })?;
        stream.unmark();

        let mime_type = sniff(&head?).unwrap_or(OCTET_STREAM);
        debug!("Fast MIME detection: stream, mime={}", mime_type);
        Ok(mime_type.to_string())
    }

    fn mode(&self) -> DetectionMode {
        DetectionMode::Fast
    }
}
