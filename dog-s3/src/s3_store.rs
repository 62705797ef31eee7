use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream as AwsByteStream;
use aws_sdk_s3::Client;

use crate::store::encode_key;
use crate::{
    ObjectBody, ObjectStoreClient, PutObjectRequest, S3AccessConfig, S3Error, S3Result, UploadResponse,
};

/// Object store client backed by the AWS SDK (S3 and S3-compatible stores)
#[derive(Clone, Debug)]
pub struct S3ObjectClient {
    client: Client,
    region: String,
    endpoint_url: Option<String>,
}

impl S3ObjectClient {
    /// Build a client from an access configuration. No request is made.
    pub fn from_config(config: &S3AccessConfig) -> Self {
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region().to_string()))
            .credentials_provider(config.credentials_provider());

        if let Some(endpoint) = config.endpoint_url() {
            builder = builder
                .endpoint_url(endpoint)
                .force_path_style(true); // path-style for S3-compatible stores
        }

        Self {
            client: Client::from_conf(builder.build()),
            region: config.region().to_string(),
            endpoint_url: config.endpoint_url().map(String::from),
        }
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: Client, region: String, endpoint_url: Option<String>) -> Self {
        Self {
            client,
            region,
            endpoint_url,
        }
    }

    /// The underlying SDK client
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait]
impl ObjectStoreClient for S3ObjectClient {
    async fn put_object(&self, request: PutObjectRequest) -> S3Result<UploadResponse> {
        let content_length = i64::try_from(request.content_length).map_err(S3Error::backend)?;

        let body = match &request.body {
            ObjectBody::File(path) => AwsByteStream::from_path(path).await.map_err(S3Error::backend)?,
            ObjectBody::Bytes(bytes) => AwsByteStream::from(bytes.clone()),
        };

        let mut put = self
            .client
            .put_object()
            .bucket(&request.bucket)
            .key(&request.key)
            .content_length(content_length)
            .body(body);

        if let Some(ct) = &request.content_type {
            put = put.content_type(ct);
        }

        match put.send().await {
            Ok(output) => Ok(UploadResponse::accepted(output.e_tag().unwrap_or_default(), 200)),
            Err(err) => {
                // An HTTP response means the store answered and refused.
                let status = err.raw_response().map(|raw| raw.status().as_u16());
                match status {
                    Some(status_code) => {
                        let status_text = err
                            .code()
                            .or_else(|| err.message())
                            .unwrap_or("unknown error")
                            .to_string();
                        Ok(UploadResponse::rejected(status_code, status_text))
                    }
                    None => Err(S3Error::backend(err)),
                }
            }
        }
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> S3Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(S3Error::backend)?;
        Ok(())
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        let key = encode_key(key);
        match &self.endpoint_url {
            Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
            None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, self.region, key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn client(endpoint: Option<&str>) -> S3ObjectClient {
        let mut builder = S3AccessConfig::builder()
            .with_region("us-east-1")
            .with_credentials("AK", "SK");
        if let Some(endpoint) = endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        S3ObjectClient::from_config(&builder.build().await.unwrap())
    }

    #[tokio::test]
    async fn test_oversized_content_length_fails_before_sending() {
        let client = client(None).await;
        let request = PutObjectRequest::new(
            "photos",
            "huge.bin",
            u64::MAX,
            ObjectBody::Bytes(bytes::Bytes::from_static(b"x")),
        );

        let err = client.put_object(request).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Backend);
    }

    #[tokio::test]
    async fn test_virtual_hosted_url() {
        let client = client(None).await;
        assert_eq!(
            client.object_url("photos", "users/1/avatar.png"),
            "https://photos.s3.us-east-1.amazonaws.com/users/1/avatar.png"
        );
    }

    #[tokio::test]
    async fn test_path_style_url_for_custom_endpoint() {
        let client = client(Some("http://localhost:9000/")).await;
        assert_eq!(
            client.object_url("photos", "a b.png"),
            "http://localhost:9000/photos/a%20b.png"
        );
    }
}
