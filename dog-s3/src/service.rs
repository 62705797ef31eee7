use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::strategy::{DetectionError, MimeTypeDetectionStrategy};
use crate::stream::ImageStream;
use crate::upload::{Reader, Remover, Uploader};
use crate::validation::{self, reject_image, reject_input};
use crate::{ImageType, ObjectStoreClient, S3Error, S3Result, UploadPolicy, UploadResponse, UploadResult};

/// Upload, delete and URL resolution against one bucket.
///
/// Bad arguments fail with an error before the store is called. A store that
/// answers but refuses an upload yields an unsuccessful [`UploadResult`].
#[async_trait]
pub trait S3Service: Send + Sync {
    /// Upload a file without a content type
    async fn upload(&self, key: &str, path: &Path) -> S3Result<UploadResult>;

    /// Upload a file with a declared content type
    async fn upload_with_content_type(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> S3Result<UploadResult>;

    /// Upload `content_length` bytes of a stream
    async fn upload_stream(
        &self,
        key: &str,
        stream: &mut ImageStream,
        content_type: &str,
        content_length: u64,
    ) -> S3Result<UploadResult>;

    /// Delete an object. Only a blank key is an error; store failures are `Ok(false)`.
    async fn delete(&self, key: &str) -> S3Result<bool>;

    /// URL of an object
    fn get_url(&self, key: &str) -> String;
}

#[derive(Clone)]
struct Delegates {
    uploader: Uploader,
    remover: Remover,
    reader: Reader,
}

impl Delegates {
    fn new(client: Arc<dyn ObjectStoreClient>, bucket: &str) -> Self {
        Self {
            uploader: Uploader::new(client.clone(), bucket),
            remover: Remover::new(client.clone(), bucket),
            reader: Reader::new(client, bucket),
        }
    }

    fn finish(&self, key: &str, response: UploadResponse) -> UploadResult {
        if !response.success {
            return UploadResult::fail(&response);
        }
        let url = self.reader.get_url(key);
        UploadResult::success(&response, url)
    }

    async fn delete(&self, key: &str) -> S3Result<bool> {
        validation::validate_key(key)?;
        Ok(self.remover.delete(key).await)
    }
}

/// Uploads objects of any type
#[derive(Clone)]
pub struct S3FileService {
    delegates: Delegates,
    policy: UploadPolicy,
}

impl S3FileService {
    pub fn new<S: AsRef<str>>(client: Arc<dyn ObjectStoreClient>, bucket: S) -> Self {
        Self {
            delegates: Delegates::new(client, bucket.as_ref()),
            policy: UploadPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: UploadPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn validate_file(&self, key: &str, path: &Path) -> S3Result<()> {
        validation::validate_key(key)?;
        let length = validation::validate_file(path, "File", reject_input).await?;
        validation::validate_size(length, &self.policy, reject_input)
    }
}

#[async_trait]
impl S3Service for S3FileService {
    async fn upload(&self, key: &str, path: &Path) -> S3Result<UploadResult> {
        self.validate_file(key, path).await?;

        let response = self.delegates.uploader.upload_file(key, path, None).await?;
        Ok(self.delegates.finish(key, response))
    }

    async fn upload_with_content_type(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> S3Result<UploadResult> {
        self.validate_file(key, path).await?;
        validation::validate_content_type(content_type, reject_input)?;

        let response = self
            .delegates
            .uploader
            .upload_file(key, path, Some(content_type))
            .await?;
        Ok(self.delegates.finish(key, response))
    }

    async fn upload_stream(
        &self,
        key: &str,
        stream: &mut ImageStream,
        content_type: &str,
        content_length: u64,
    ) -> S3Result<UploadResult> {
        validation::validate_key(key)?;
        validation::validate_content_type(content_type, reject_input)?;
        validation::validate_content_length(content_length, reject_input)?;
        validation::validate_size(content_length, &self.policy, reject_input)?;

        let response = self
            .delegates
            .uploader
            .upload_stream(key, stream, content_type, content_length)
            .await?;
        Ok(self.delegates.finish(key, response))
    }

    async fn delete(&self, key: &str) -> S3Result<bool> {
        self.delegates.delete(key).await
    }

    fn get_url(&self, key: &str) -> String {
        self.delegates.reader.get_url(key)
    }
}

/// Uploads images only.
///
/// Files must carry an allowed extension; files and streams must sniff as an
/// allowed MIME type using the configured detection strategy.
#[derive(Clone)]
pub struct S3ImageService {
    delegates: Delegates,
    detector: Arc<dyn MimeTypeDetectionStrategy>,
    policy: UploadPolicy,
}

impl S3ImageService {
    pub fn new<S: AsRef<str>>(
        client: Arc<dyn ObjectStoreClient>,
        bucket: S,
        detector: Arc<dyn MimeTypeDetectionStrategy>,
    ) -> Self {
        Self {
            delegates: Delegates::new(client, bucket.as_ref()),
            detector,
            policy: UploadPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: UploadPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn validate_image_file(&self, key: &str, path: &Path) -> S3Result<()> {
        validation::validate_key(key)?;
        let length = validation::validate_file(path, "Image File", reject_image).await?;
        validation::validate_size(length, &self.policy, reject_image)?;
        validation::validate_image_extension(path)?;

        let detected = self
            .detector
            .detect_file(path)
            .await
            .map_err(|e| detection_error("Failed to detect MIME type", e))?;
        debug!(
            "Detected MIME type: file={}, mime={}, mode={}",
            path.display(),
            detected,
            self.detector.mode()
        );

        if !ImageType::is_allowed_mime_type(&detected) {
            return Err(S3Error::invalid_image(format!(
                "Image File type not allowed: MIME type {}",
                detected
            )));
        }
        Ok(())
    }
}

fn detection_error(message: &str, error: DetectionError) -> S3Error {
    match error {
        // The caller handed over a stream that cannot be rewound.
        DetectionError::MarkUnsupported => S3Error::invalid_input(error.to_string()),
        error => S3Error::detection_failed(message, error),
    }
}

#[async_trait]
impl S3Service for S3ImageService {
    async fn upload(&self, key: &str, path: &Path) -> S3Result<UploadResult> {
        self.validate_image_file(key, path).await?;

        let response = self.delegates.uploader.upload_file(key, path, None).await?;
        Ok(self.delegates.finish(key, response))
    }

    async fn upload_with_content_type(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> S3Result<UploadResult> {
        self.validate_image_file(key, path).await?;
        validation::validate_image_content_type(content_type)?;

        let response = self
            .delegates
            .uploader
            .upload_file(key, path, Some(content_type))
            .await?;
        Ok(self.delegates.finish(key, response))
    }

    async fn upload_stream(
        &self,
        key: &str,
        stream: &mut ImageStream,
        content_type: &str,
        content_length: u64,
    ) -> S3Result<UploadResult> {
        validation::validate_key(key)?;

        let detected = self
            .detector
            .detect_stream(stream)
            .await
            .map_err(|e| detection_error("Failed to detect MIME type from stream", e))?;
        debug!("Detected MIME type: stream, mime={}, mode={}", detected, self.detector.mode());

        if !ImageType::is_allowed_mime_type(&detected) {
            return Err(S3Error::invalid_image(format!(
                "Image File type not allowed: detected MIME type {}",
                detected
            )));
        }

        validation::validate_image_content_type(content_type)?;
        validation::validate_content_length(content_length, reject_image)?;
        validation::validate_size(content_length, &self.policy, reject_image)?;

        let response = self
            .delegates
            .uploader
            .upload_stream(key, stream, content_type, content_length)
            .await?;
        Ok(self.delegates.finish(key, response))
    }

    async fn delete(&self, key: &str) -> S3Result<bool> {
        self.delegates.delete(key).await
    }

    fn get_url(&self, key: &str) -> String {
        self.delegates.reader.get_url(key)
    }
}
