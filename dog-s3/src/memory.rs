use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::store::encode_key;
use crate::{ObjectBody, ObjectStoreClient, PutObjectRequest, S3Error, S3Result, UploadResponse};

/// An object held by [`MemoryObjectClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub e_tag: String,
}

/// In-memory object store, for tests and local development.
///
/// Counts every call it receives, and can be told to reject or fail them.
#[derive(Debug, Default)]
pub struct MemoryObjectClient {
    objects: DashMap<String, StoredObject>,
    put_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    rejection: Option<(u16, String)>,
    fail_puts: bool,
    fail_deletes: bool,
}

impl MemoryObjectClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every put with an unsuccessful response
    pub fn with_rejection<S: Into<String>>(mut self, status_code: u16, status_text: S) -> Self {
        self.rejection = Some((status_code, status_text.into()));
        self
    }

    /// Fail every put without an answer
    pub fn with_failing_puts(mut self) -> Self {
        self.fail_puts = true;
        self
    }

    pub fn with_failing_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }

    pub fn put_count(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects.get(&object_id(bucket, key)).map(|entry| entry.clone())
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects.contains_key(&object_id(bucket, key))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

fn object_id(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, key)
}

fn e_tag(data: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("\"{:016x}\"", hasher.finish())
}

fn unavailable(operation: &str) -> S3Error {
    S3Error::backend(io::Error::new(
        io::ErrorKind::ConnectionRefused,
        format!("memory store refused {}", operation),
    ))
}

#[async_trait]
impl ObjectStoreClient for MemoryObjectClient {
    async fn put_object(&self, request: PutObjectRequest) -> S3Result<UploadResponse> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_puts {
            return Err(unavailable("put"));
        }
        if let Some((status_code, status_text)) = &self.rejection {
            return Ok(UploadResponse::rejected(*status_code, status_text.clone()));
        }

        let data = match request.body {
            ObjectBody::File(path) => Bytes::from(tokio::fs::read(&path).await?),
            ObjectBody::Bytes(bytes) => bytes,
        };
        let e_tag = e_tag(&data);

        self.objects.insert(
            object_id(&request.bucket, &request.key),
            StoredObject {
                data,
                content_type: request.content_type,
                e_tag: e_tag.clone(),
            },
        );

        Ok(UploadResponse::accepted(e_tag, 200))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> S3Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_deletes {
            return Err(unavailable("delete"));
        }

        // Deleting a missing key succeeds, as on S3.
        self.objects.remove(&object_id(bucket, key));
        Ok(())
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("memory://{}/{}", bucket, encode_key(key))
    }
}
