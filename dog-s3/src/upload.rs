use std::io;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info};

use crate::stream::ImageStream;
use crate::{ObjectBody, ObjectStoreClient, PutObjectRequest, S3Error, S3Result, UploadResponse};

/// Puts objects into one bucket
#[derive(Clone)]
pub struct Uploader {
    client: Arc<dyn ObjectStoreClient>,
    bucket: String,
}

impl Uploader {
    pub fn new<S: Into<String>>(client: Arc<dyn ObjectStoreClient>, bucket: S) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Upload a file. The body is streamed from disk by the client.
    pub async fn upload_file(
        &self,
        key: &str,
        path: &Path,
        content_type: Option<&str>,
    ) -> S3Result<UploadResponse> {
        let content_length = tokio::fs::metadata(path)
            .await
            .map_err(|e| self.failed(key, e))?
            .len();

        let mut request = PutObjectRequest::new(
            self.bucket.as_str(),
            key,
            content_length,
            ObjectBody::File(path.to_path_buf()),
        );
        if let Some(content_type) = content_type {
            request = request.with_content_type(content_type);
        }

        self.send(request).await
    }

    /// Upload exactly `content_length` bytes read from `stream`
    pub async fn upload_stream(
        &self,
        key: &str,
        stream: &mut ImageStream,
        content_type: &str,
        content_length: u64,
    ) -> S3Result<UploadResponse> {
        let mut data = Vec::new();
        (&mut *stream)
            .take(content_length)
            .read_to_end(&mut data)
            .await
            .map_err(|e| self.failed(key, e))?;

        if (data.len() as u64) < content_length {
            return Err(self.failed(
                key,
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("stream ended after {} of {} bytes", data.len(), content_length),
                ),
            ));
        }

        let request = PutObjectRequest::new(
            self.bucket.as_str(),
            key,
            content_length,
            ObjectBody::Bytes(Bytes::from(data)),
        )
        .with_content_type(content_type);

        self.send(request).await
    }

    async fn send(&self, request: PutObjectRequest) -> S3Result<UploadResponse> {
        let key = request.key.clone();
        debug!("Uploading object: bucket={}, key={}", self.bucket, key);

        let response = self
            .client
            .put_object(request)
            .await
            .map_err(|e| self.failed(&key, e))?;

        if response.success {
            info!("Uploaded object: bucket={}, key={}, etag={}", self.bucket, key, response.e_tag);
        } else {
            debug!(
                "Upload rejected: bucket={}, key={}, status={}",
                self.bucket, key, response.status_code
            );
        }
        Ok(response)
    }

    fn failed<E: Into<crate::error::BoxError>>(&self, key: &str, error: E) -> S3Error {
        S3Error::uploader(
            format!("S3 upload failed: bucket={}, key={}", self.bucket, key),
            error,
        )
    }
}

/// Deletes objects from one bucket
#[derive(Clone)]
pub struct Remover {
    client: Arc<dyn ObjectStoreClient>,
    bucket: String,
}

impl Remover {
    pub fn new<S: Into<String>>(client: Arc<dyn ObjectStoreClient>, bucket: S) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Delete an object. Failures are logged and reported as `false`.
    pub async fn delete(&self, key: &str) -> bool {
        debug!("Deleting object: bucket={}, key={}", self.bucket, key);

        match self.client.delete_object(&self.bucket, key).await {
            Ok(()) => {
                info!("Deleted object: bucket={}, key={}", self.bucket, key);
                true
            }
            Err(e) => {
                error!("S3 delete failed: bucket={}, key={}, error={}", self.bucket, key, e);
                false
            }
        }
    }
}

/// Resolves object URLs in one bucket
#[derive(Clone)]
pub struct Reader {
    client: Arc<dyn ObjectStoreClient>,
    bucket: String,
}

impl Reader {
    pub fn new<S: Into<String>>(client: Arc<dyn ObjectStoreClient>, bucket: S) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn get_url(&self, key: &str) -> String {
        self.client.object_url(&self.bucket, key)
    }
}
