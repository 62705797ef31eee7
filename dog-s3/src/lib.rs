//! # dog-s3: S3 uploads with image validation
//!
//! `dog-s3` wraps an S3 client with the routine checks every upload path ends
//! up writing: non-blank keys, readable non-empty files, declared content types
//! and lengths, and for images an extension and content-sniffing allow-list.
//!
//! ## Key Features
//!
//! - **Two services**: [`S3FileService`] for any object, [`S3ImageService`] for images only
//! - **Content sniffing**: fast (leading bytes) or precise (full decode), picked by [`DetectionMode`]
//! - **Typed failures**: [`ErrorKind`] separates bad input from a failing store
//! - **Shared clients**: [`S3ClientFactory`] builds one client per region and credentials
//! - **Storage agnostic**: anything implementing [`ObjectStoreClient`], including [`MemoryObjectClient`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use dog_s3::prelude::*;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> S3Result<()> {
//! // 1. Resolve region and credentials once
//! let config = S3AccessConfig::builder()
//!     .with_region("ap-northeast-2")
//!     .build()
//!     .await?;
//!
//! // 2. Get a shared client and pick a detection strategy
//! let clients = S3ClientFactory::new();
//! let detector = strategy_from_properties(&DetectionProperties::from_env()?);
//! let images = S3ImageService::new(clients.get_client(&config), "my-bucket", detector);
//!
//! // 3. Upload
//! let result = images
//!     .upload_with_content_type("avatars/42.png", Path::new("avatar.png"), "image/png")
//!     .await?;
//!
//! if result.is_success() {
//!     println!("stored at {}", result.url);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ S3FileService/S3ImageService │  ← validation
//! ├──────────────────────────────┤
//! │   Uploader/Remover/Reader    │  ← one bucket, logging
//! ├──────────────────────────────┤
//! │      ObjectStoreClient       │  ← put/delete/url
//! └──────────────────────────────┘
//! ```

mod config;
mod error;
mod factory;
mod memory;
mod receipt;
mod s3_store;
mod service;
pub mod store;
pub mod strategy;
pub mod stream;
mod types;
mod upload;
mod validation;

pub use config::{
    CredentialsIdentity, DetectionMode, DetectionProperties, S3AccessConfig, S3AccessConfigBuilder,
    UploadPolicy, DEFAULT_REGION, KNOWN_REGIONS, MIME_DETECTION_ENV,
};
pub use error::{BoxError, ErrorKind, S3Error, S3Result};
pub use factory::{
    strategy_from_config, strategy_from_mode, strategy_from_properties, ClientCache, ClientKey,
    S3ClientFactory,
};
pub use memory::{MemoryObjectClient, StoredObject};
pub use receipt::{UploadResponse, UploadResult};
pub use s3_store::S3ObjectClient;
pub use service::{S3FileService, S3ImageService, S3Service};
pub use store::ObjectStoreClient;
pub use strategy::{
    DetectionError, FastMimeTypeDetectionStrategy, MimeTypeDetectionStrategy,
    PreciseMimeTypeDetectionStrategy,
};
pub use stream::{ImageStream, MarkableReader};
pub use types::{ImageType, ObjectBody, PutObjectRequest};
pub use upload::{Reader, Remover, Uploader};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        strategy_from_properties, DetectionMode, DetectionProperties, ErrorKind, ImageStream,
        S3AccessConfig, S3ClientFactory, S3Error, S3FileService, S3ImageService, S3Result,
        S3Service, UploadResult,
    };
}
