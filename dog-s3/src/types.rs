use bytes::Bytes;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Image formats accepted by the image-aware upload service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    Jpg,
    Jpeg,
    Png,
    Gif,
    Bmp,
    Tiff,
    Psd,
    Webp,
}

static ALLOWED_EXTENSIONS: Lazy<HashSet<String>> = Lazy::new(|| {
    ImageType::ALL
        .iter()
        .map(|image_type| format!(".{}", image_type.extension().to_lowercase()))
        .collect()
});

static ALLOWED_MIME_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ImageType::ALL
        .iter()
        .map(|image_type| image_type.mime_type())
        .collect()
});

impl ImageType {
    /// Every registered variant
    pub const ALL: [ImageType; 8] = [
        ImageType::Jpg,
        ImageType::Jpeg,
        ImageType::Png,
        ImageType::Gif,
        ImageType::Bmp,
        ImageType::Tiff,
        ImageType::Psd,
        ImageType::Webp,
    ];

    /// Lowercase file extension without the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            ImageType::Jpg => "jpg",
            ImageType::Jpeg => "jpeg",
            ImageType::Png => "png",
            ImageType::Gif => "gif",
            ImageType::Bmp => "bmp",
            ImageType::Tiff => "tiff",
            ImageType::Psd => "psd",
            ImageType::Webp => "webp",
        }
    }

    /// Canonical MIME type
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageType::Jpg | ImageType::Jpeg => "image/jpeg",
            ImageType::Png => "image/png",
            ImageType::Gif => "image/gif",
            ImageType::Bmp => "image/bmp",
            ImageType::Tiff => "image/tiff",
            ImageType::Psd => "image/vnd.adobe.photoshop",
            ImageType::Webp => "image/webp",
        }
    }

    /// Look up a variant by extension, with or without the leading dot
    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.trim_start_matches('.').to_lowercase();
        Self::ALL
            .into_iter()
            .find(|image_type| image_type.extension() == extension)
    }

    /// Look up a variant by the extension of a file name
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Dot-prefixed lowercase extensions, e.g. `.png`
    pub fn allowed_extensions() -> &'static HashSet<String> {
        &ALLOWED_EXTENSIONS
    }

    /// Allowed MIME types, one entry per distinct type
    pub fn allowed_mime_types() -> &'static HashSet<&'static str> {
        &ALLOWED_MIME_TYPES
    }

    pub fn is_allowed_extension(extension: &str) -> bool {
        ALLOWED_EXTENSIONS.contains(extension)
    }

    pub fn is_allowed_mime_type(mime_type: &str) -> bool {
        ALLOWED_MIME_TYPES.contains(mime_type)
    }
}

/// Body of a put-object call
#[derive(Debug, Clone)]
pub enum ObjectBody {
    /// Streamed from a file on disk
    File(PathBuf),
    /// Already in memory
    Bytes(Bytes),
}

/// Request shaped for the object store's put-object operation
#[derive(Debug, Clone)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub content_type: Option<String>,
    pub content_length: u64,
    pub body: ObjectBody,
}

impl PutObjectRequest {
    pub fn new<B: Into<String>, K: Into<String>>(bucket: B, key: K, content_length: u64, body: ObjectBody) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            content_type: None,
            content_length,
            body,
        }
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}
