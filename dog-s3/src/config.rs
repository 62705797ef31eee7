use aws_config::default_provider::credentials::DefaultCredentialsChain;
use aws_config::Region;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use tracing::debug;

use crate::{S3Error, S3Result};

/// Region used when none is configured (Seoul)
pub const DEFAULT_REGION: &str = "ap-northeast-2";

/// Environment variable read by [`DetectionProperties::from_env`]
pub const MIME_DETECTION_ENV: &str = "S3_MIME_DETECTION";

/// Region identifiers accepted without a custom endpoint
pub const KNOWN_REGIONS: &[&str] = &[
    "af-south-1",
    "ap-east-1",
    "ap-east-2",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-south-1",
    "ap-south-2",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-southeast-3",
    "ap-southeast-4",
    "ap-southeast-5",
    "ap-southeast-7",
    "ca-central-1",
    "ca-west-1",
    "cn-north-1",
    "cn-northwest-1",
    "eu-central-1",
    "eu-central-2",
    "eu-north-1",
    "eu-south-1",
    "eu-south-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "il-central-1",
    "me-central-1",
    "me-south-1",
    "mx-central-1",
    "sa-east-1",
    "us-east-1",
    "us-east-2",
    "us-gov-east-1",
    "us-gov-west-1",
    "us-west-1",
    "us-west-2",
    "aws-global",
    "aws-cn-global",
    "aws-us-gov-global",
];

/// How uploaded content is sniffed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum DetectionMode {
    /// Leading bytes and extension only
    #[default]
    Fast,
    /// Full decode of the payload
    Precise,
}

impl DetectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMode::Fast => "fast",
            DetectionMode::Precise => "precise",
        }
    }
}

impl std::fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionMode {
    type Err = S3Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(DetectionMode::Fast),
            "precise" => Ok(DetectionMode::Precise),
            _ => Err(S3Error::UnsupportedDetectionMode { mode: s.to_string() }),
        }
    }
}

impl TryFrom<String> for DetectionMode {
    type Error = S3Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Settings for MIME detection in the image service
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionProperties {
    #[serde(default)]
    pub mime_detection: DetectionMode,
}

impl DetectionProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the detection mode; `None` keeps the default ([`DetectionMode::Fast`])
    pub fn with_mime_detection(mut self, mode: Option<DetectionMode>) -> Self {
        self.mime_detection = mode.unwrap_or_default();
        self
    }

    /// Read the mode from `S3_MIME_DETECTION`, defaulting to fast when unset
    pub fn from_env() -> S3Result<Self> {
        let mode = match std::env::var(MIME_DETECTION_ENV) {
            Ok(value) if !value.trim().is_empty() => Some(value.parse()?),
            _ => None,
        };
        Ok(Self::new().with_mime_detection(mode))
    }
}

/// Upload limits shared by both services
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadPolicy {
    /// Reject files and streams larger than this. Disabled when `None`.
    #[serde(default)]
    pub max_content_length: Option<u64>,
}

impl UploadPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the maximum size check
    pub fn with_max_content_length(mut self, bytes: u64) -> Self {
        self.max_content_length = Some(bytes);
        self
    }
}

/// Identity of a credentials provider, used to share clients
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CredentialsIdentity {
    /// Explicit key pair; the secret is only kept as a digest
    Static { access_key_id: String, secret_digest: u64 },
    /// Environment, profile or instance metadata
    DefaultChain,
}

/// Region, endpoint and credentials for reaching S3
#[derive(Clone)]
pub struct S3AccessConfig {
    region: String,
    endpoint_url: Option<String>,
    credentials: SharedCredentialsProvider,
    identity: CredentialsIdentity,
}

impl S3AccessConfig {
    pub fn builder() -> S3AccessConfigBuilder {
        S3AccessConfigBuilder::default()
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint_url(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }

    pub fn credentials_provider(&self) -> SharedCredentialsProvider {
        self.credentials.clone()
    }

    pub fn credentials_identity(&self) -> &CredentialsIdentity {
        &self.identity
    }
}

impl std::fmt::Debug for S3AccessConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3AccessConfig")
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("identity", &self.identity)
            .finish()
    }
}

/// Builder for [`S3AccessConfig`].
///
/// ```no_run
/// # async fn run() -> dog_s3::S3Result<()> {
/// let config = dog_s3::S3AccessConfig::builder()
///     .with_region("us-west-2")
///     .with_credentials("ACCESS_KEY", "SECRET_KEY")
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default, Clone)]
pub struct S3AccessConfigBuilder {
    region: Option<String>,
    access_key: Option<String>,
    secret_key: Option<String>,
    endpoint_url: Option<String>,
}

impl S3AccessConfigBuilder {
    /// Use a static key pair instead of the default credentials chain
    pub fn with_credentials<A: Into<String>, S: Into<String>>(mut self, access_key: A, secret_key: S) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Set the region (default `ap-northeast-2`)
    pub fn with_region<S: Into<String>>(mut self, region: S) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Target an S3-compatible store. Any non-blank region is accepted then.
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint_url: S) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Validate the region and resolve a credentials provider
    pub async fn build(self) -> S3Result<S3AccessConfig> {
        let region = self.region.unwrap_or_else(|| DEFAULT_REGION.to_string());
        if region.trim().is_empty() {
            return Err(S3Error::invalid_config("Region must not be null or empty"));
        }

        let endpoint_url = match self.endpoint_url {
            Some(url) if url.trim().is_empty() => {
                return Err(S3Error::invalid_config("Endpoint URL must not be empty"));
            }
            other => other,
        };

        if endpoint_url.is_none() && !KNOWN_REGIONS.contains(&region.as_str()) {
            return Err(S3Error::RegionNotFound { region });
        }

        let (credentials, identity) = match (self.access_key, self.secret_key) {
            (Some(access_key), Some(secret_key)) => static_credentials(access_key, secret_key)?,
            (None, None) => default_chain_credentials(&region).await?,
            _ => {
                return Err(S3Error::invalid_config(
                    "Access key and secret key must be provided together",
                ))
            }
        };

        Ok(S3AccessConfig {
            region,
            endpoint_url,
            credentials,
            identity,
        })
    }
}

fn static_credentials(
    access_key: String,
    secret_key: String,
) -> S3Result<(SharedCredentialsProvider, CredentialsIdentity)> {
    if access_key.trim().is_empty() {
        return Err(S3Error::invalid_config("Access key must not be null or empty"));
    }
    if secret_key.trim().is_empty() {
        return Err(S3Error::invalid_config("Secret key must not be null or empty"));
    }

    let mut hasher = DefaultHasher::new();
    secret_key.hash(&mut hasher);
    let identity = CredentialsIdentity::Static {
        access_key_id: access_key.clone(),
        secret_digest: hasher.finish(),
    };

    debug!("Using static credentials with provided access key and secret key");
    let credentials = Credentials::new(access_key, secret_key, None, None, "dog-s3-static");
    Ok((SharedCredentialsProvider::new(credentials), identity))
}

async fn default_chain_credentials(region: &str) -> S3Result<(SharedCredentialsProvider, CredentialsIdentity)> {
    let chain = DefaultCredentialsChain::builder()
        .region(Region::new(region.to_string()))
        .build()
        .await;

    // Resolve once so missing credentials fail at configuration time.
    chain
        .provide_credentials()
        .await
        .map_err(|e| S3Error::CredentialsNotFound { source: Box::new(e) })?;

    debug!("Using default credentials chain");
    Ok((SharedCredentialsProvider::new(chain), CredentialsIdentity::DefaultChain))
}
