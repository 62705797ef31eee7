use std::error::Error;
use std::io::{self, Cursor, SeekFrom};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

use dog_s3::{
    strategy_from_mode, DetectionError, DetectionMode, ErrorKind, ImageStream, MemoryObjectClient,
    S3ImageService, S3Service, UploadPolicy,
};

const BUCKET: &str = "images";

/// Test factory functions
fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_fn(16, 16, |x, y| image::Rgb([(x * 16) as u8, (y * 16) as u8, 128]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn psd_bytes() -> Vec<u8> {
    let mut bytes = b"8BPS\x00\x01".to_vec();
    bytes.extend_from_slice(&[0; 6]);
    bytes.extend_from_slice(&[0x00, 0x03, 0, 0, 0, 16, 0, 0, 0, 16, 0x00, 0x08, 0x00, 0x03]);
    bytes.resize(128, 0);
    bytes
}

/// Seekable reader that can report its position once and never seek again
struct BrokenSeek {
    inner: Cursor<Vec<u8>>,
    seeks: usize,
}

impl AsyncRead for BrokenSeek {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncSeek for BrokenSeek {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        let this = self.get_mut();
        this.seeks += 1;
        if this.seeks > 1 {
            return Err(io::Error::new(io::ErrorKind::Other, "device gone"));
        }
        Pin::new(&mut this.inner).start_seek(position)
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Pin::new(&mut self.get_mut().inner).poll_complete(cx)
    }
}

fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn create_service(client: &Arc<MemoryObjectClient>, mode: DetectionMode) -> S3ImageService {
    S3ImageService::new(client.clone(), BUCKET, strategy_from_mode(mode))
}

/// B1. Blank keys never reach the store
#[tokio::test]
async fn test_blank_key_fails_before_any_store_call() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "a.png", &png_bytes());
    let client = Arc::new(MemoryObjectClient::new());
    let service = create_service(&client, DetectionMode::Fast);

    for key in ["", "   ", "\t"] {
        let err = service.upload(key, &path).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);

        let err = service
            .upload_with_content_type(key, &path, "image/png")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);

        let mut stream = ImageStream::from_bytes(png_bytes());
        let err = service
            .upload_stream(key, &mut stream, "image/png", 10)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    assert_eq!(client.put_count(), 0);
    assert_eq!(client.delete_count(), 0);
}

/// B2. Extension passes, content does not
#[tokio::test]
async fn test_text_named_jpg_is_invalid_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "fake.jpg", b"this is definitely not a jpeg\n");
    let client = Arc::new(MemoryObjectClient::new());

    for mode in [DetectionMode::Fast, DetectionMode::Precise] {
        let service = create_service(&client, mode);
        let err = service.upload("uploads/fake.jpg", &path).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidImage);
        assert!(err.to_string().contains("text/plain"), "{}", err);
    }

    assert_eq!(client.put_count(), 0);
}

/// B3. Declared content type is checked after sniffing
#[tokio::test]
async fn test_png_declared_as_pdf_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "photo.png", &png_bytes());
    let client = Arc::new(MemoryObjectClient::new());
    let service = create_service(&client, DetectionMode::Fast);

    let err = service
        .upload_with_content_type("photo.png", &path, "application/pdf")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidImage);
    assert!(err.to_string().contains("application/pdf"));
    assert_eq!(client.put_count(), 0);
}

/// B4. The happy path
#[tokio::test]
async fn test_valid_png_upload_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let png = png_bytes();
    let path = write_file(&dir, "avatar.PNG", &png);
    let client = Arc::new(MemoryObjectClient::new());

    for mode in [DetectionMode::Fast, DetectionMode::Precise] {
        let service = create_service(&client, mode);
        let key = format!("users/{}/avatar.png", mode);

        let result = service
            .upload_with_content_type(&key, &path, "image/png")
            .await
            .unwrap();

        assert!(result.is_success());
        assert!(!result.e_tag.is_empty());
        assert!(result.url.contains(&key));
        assert!(result.message.is_empty());

        let stored = client.get(BUCKET, &key).unwrap();
        assert_eq!(stored.data.as_ref(), png.as_slice());
        assert_eq!(stored.content_type.as_deref(), Some("image/png"));
    }
}

/// B5. Disallowed and missing extensions
#[tokio::test]
async fn test_extension_checks() {
    let dir = tempfile::tempdir().unwrap();
    let png = png_bytes();
    let client = Arc::new(MemoryObjectClient::new());
    let service = create_service(&client, DetectionMode::Fast);

    let pdf = write_file(&dir, "image.pdf", &png);
    let err = service.upload("k", &pdf).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidImage);
    assert!(err.to_string().contains(".pdf"));

    let bare = write_file(&dir, "image", &png);
    let err = service.upload("k", &bare).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidImage);
    assert!(err.to_string().contains("no extension"));

    assert_eq!(client.put_count(), 0);
}

/// B6. Missing and empty files
#[tokio::test]
async fn test_unusable_files_are_invalid_images() {
    let dir = tempfile::tempdir().unwrap();
    let empty = write_file(&dir, "empty.png", b"");
    let client = Arc::new(MemoryObjectClient::new());
    let service = create_service(&client, DetectionMode::Fast);

    let err = service.upload("k", &empty).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidImage);

    let err = service.upload("k", Path::new("/no/such/file.png")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidImage);

    let err = service.upload("k", dir.path()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidImage);
}

/// B7. A rejected put is a result, not an error
#[tokio::test]
async fn test_rejected_upload_returns_fail_result() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "a.png", &png_bytes());
    let client = Arc::new(MemoryObjectClient::new().with_rejection(403, "AccessDenied"));
    let service = create_service(&client, DetectionMode::Fast);

    let result = service.upload("a.png", &path).await.unwrap();

    assert!(!result.is_success());
    assert!(result.url.is_empty());
    assert!(result.e_tag.is_empty());
    assert_eq!(result.message, "S3 upload fail, status code: 403, message: AccessDenied");
}

/// B8. A put that blows up is an uploader error
#[tokio::test]
async fn test_failing_store_is_uploader_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "a.png", &png_bytes());
    let client = Arc::new(MemoryObjectClient::new().with_failing_puts());
    let service = create_service(&client, DetectionMode::Fast);

    let err = service.upload("a.png", &path).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Uploader);
    assert_eq!(client.put_count(), 1);
}

/// B9. Stream uploads
#[tokio::test]
async fn test_stream_upload_after_fast_detection_sends_whole_payload() {
    let png = png_bytes();
    let client = Arc::new(MemoryObjectClient::new());
    let service = create_service(&client, DetectionMode::Fast);
    let mut stream = ImageStream::buffered(Cursor::new(png.clone()));

    let result = service
        .upload_stream("s.png", &mut stream, "image/png", png.len() as u64)
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(client.get(BUCKET, "s.png").unwrap().data.as_ref(), png.as_slice());
}

#[tokio::test]
async fn test_forward_only_stream_needs_precise_detection() {
    let png = png_bytes();
    let client = Arc::new(MemoryObjectClient::new());

    // Fast cannot rewind a forward-only stream
    let fast = create_service(&client, DetectionMode::Fast);
    let mut stream = ImageStream::forward_only(Cursor::new(png.clone()));
    let err = fast
        .upload_stream("s.png", &mut stream, "image/png", png.len() as u64)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
    assert_eq!(client.put_count(), 0);

    // Precise replays what it consumed
    let precise = create_service(&client, DetectionMode::Precise);
    let mut stream = ImageStream::forward_only(Cursor::new(png.clone()));
    let result = precise
        .upload_stream("s.png", &mut stream, "image/png", png.len() as u64)
        .await
        .unwrap();
    assert!(result.is_success());
    assert_eq!(client.get(BUCKET, "s.png").unwrap().data.as_ref(), png.as_slice());
}

#[tokio::test]
async fn test_stream_with_text_content_is_invalid_image() {
    let client = Arc::new(MemoryObjectClient::new());
    let service = create_service(&client, DetectionMode::Fast);
    let mut stream = ImageStream::from_bytes(&b"GET / HTTP/1.1\r\n"[..]);

    let err = service
        .upload_stream("s.png", &mut stream, "image/png", 16)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidImage);
    assert_eq!(client.put_count(), 0);
}

#[tokio::test]
async fn test_stream_that_cannot_rewind_after_detection_is_not_uploaded() {
    let png = png_bytes();
    let client = Arc::new(MemoryObjectClient::new());
    let service = create_service(&client, DetectionMode::Fast);
    let mut stream = ImageStream::seekable(BrokenSeek {
        inner: Cursor::new(png.clone()),
        seeks: 0,
    });

    let err = service
        .upload_stream("s.png", &mut stream, "image/png", png.len() as u64)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidImage);
    let source = err.source().and_then(|e| e.downcast_ref::<DetectionError>());
    assert!(matches!(source, Some(DetectionError::ResetFailed { .. })), "{:?}", err);
    assert_eq!(client.put_count(), 0);
}

/// B10. Photoshop files
#[tokio::test]
async fn test_psd_upload_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "layers.psd", &psd_bytes());
    let client = Arc::new(MemoryObjectClient::new());

    for mode in [DetectionMode::Fast, DetectionMode::Precise] {
        let service = create_service(&client, mode);
        let key = format!("designs/{}/layers.psd", mode);

        let result = service
            .upload_with_content_type(&key, &path, "image/vnd.adobe.photoshop")
            .await
            .unwrap();

        assert!(result.is_success());
        assert!(result.url.contains(&key));
    }
    assert_eq!(client.put_count(), 2);
}

/// B11. Optional size ceiling
#[tokio::test]
async fn test_max_content_length_policy() {
    let dir = tempfile::tempdir().unwrap();
    let png = png_bytes();
    let path = write_file(&dir, "big.png", &png);
    let client = Arc::new(MemoryObjectClient::new());

    let limited = create_service(&client, DetectionMode::Fast)
        .with_policy(UploadPolicy::new().with_max_content_length(png.len() as u64 - 1));
    let err = limited.upload("big.png", &path).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidImage);
    assert!(err.to_string().contains("exceeds maximum"));

    let unlimited = create_service(&client, DetectionMode::Fast);
    assert!(unlimited.upload("big.png", &path).await.unwrap().is_success());
}

/// B12. Delete never surfaces store failures
#[tokio::test]
async fn test_delete() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "a.png", &png_bytes());
    let client = Arc::new(MemoryObjectClient::new());
    let service = create_service(&client, DetectionMode::Fast);

    service.upload("a.png", &path).await.unwrap();
    assert!(service.delete("a.png").await.unwrap());
    assert!(!client.contains(BUCKET, "a.png"));

    let failing = Arc::new(MemoryObjectClient::new().with_failing_deletes());
    let service = create_service(&failing, DetectionMode::Fast);
    assert!(!service.delete("a.png").await.unwrap());
    assert_eq!(failing.delete_count(), 1);
}
