use async_trait::async_trait;

use crate::{PutObjectRequest, S3Result, UploadResponse};

/// The three object-store operations this crate needs.
///
/// `put_object` returns `Ok` with an unsuccessful [`UploadResponse`] when the
/// store answered but rejected the object, and `Err` only when the call itself
/// failed (no answer, timeout, unreadable body).
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Store an object
    async fn put_object(&self, request: PutObjectRequest) -> S3Result<UploadResponse>;

    /// Delete an object
    async fn delete_object(&self, bucket: &str, key: &str) -> S3Result<()>;

    /// URL of an object. No request is made.
    fn object_url(&self, bucket: &str, key: &str) -> String;
}

/// Percent-encode each segment of a key, keeping the `/` separators
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
