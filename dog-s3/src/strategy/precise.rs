use async_trait::async_trait;
use bytes::Bytes;
use image::ImageReader;
use std::io::Cursor;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::{sniff, DetectionError, DetectionResult, MimeTypeDetectionStrategy, OCTET_STREAM};
use crate::config::DetectionMode;
use crate::stream::ImageStream;

/// Detects by decoding the whole payload.
///
/// The declared type is the format the decoder accepted. Content that is not
/// an image family at all is reported by its magic number (or as text), so the
/// caller's allow-list still gets a meaningful MIME type to reject.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreciseMimeTypeDetectionStrategy;

impl PreciseMimeTypeDetectionStrategy {
    pub fn new() -> Self {
        Self
    }

    async fn detect_bytes(data: Bytes, context: String) -> DetectionResult<String> {
        if data.is_empty() {
            return Err(DetectionError::EmptyInput);
        }

        tokio::task::spawn_blocking(move || parse_content_type(&data, context))
            .await
            .map_err(|source| DetectionError::Task { source })?
    }
}

fn parse_content_type(data: &[u8], context: String) -> DetectionResult<String> {
    let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;

    let Some(format) = reader.format() else {
        return Ok(sniff(data).unwrap_or(OCTET_STREAM).to_string());
    };

    reader
        .decode()
        .map_err(|source| DetectionError::Parse { context, source })?;

    Ok(format.to_mime_type().to_string())
}

#[async_trait]
impl MimeTypeDetectionStrategy for PreciseMimeTypeDetectionStrategy {
    async fn detect_file(&self, path: &Path) -> DetectionResult<String> {
        let data = tokio::fs::read(path).await?;
        let context = format!(
            "file: {}",
            path.file_name().map(|name| name.to_string_lossy()).unwrap_or_default()
        );

        let mime_type = Self::detect_bytes(Bytes::from(data), context).await?;
        debug!("Precise MIME detection: file={}, mime={}", path.display(), mime_type);
        Ok(mime_type)
    }

    async fn detect_stream(&self, stream: &mut ImageStream) -> DetectionResult<String> {
        let mut data = Vec::new();

        if stream.supports_mark() {
            stream.mark(usize::MAX).await?;
            let read = stream.read_to_end(&mut data).await;
            stream
                .reset()
                .await
                .map_err(|source| DetectionError::ResetFailed { source })?;
            stream.unmark();
            read?;
        } else {
            // The stream is consumed either way; hand the caller a replay of it.
            stream.read_to_end(&mut data).await?;
        }

        let data = Bytes::from(data);
        if !stream.supports_mark() {
            *stream = ImageStream::from_bytes(data.clone());
        }

        let mime_type = Self::detect_bytes(data, "stream".to_string()).await?;
        debug!("Precise MIME detection: stream, mime={}", mime_type);
        Ok(mime_type)
    }

    fn mode(&self) -> DetectionMode {
        DetectionMode::Precise
    }
}
