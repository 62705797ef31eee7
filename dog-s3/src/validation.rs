use std::path::Path;

use crate::{ImageType, S3Error, S3Result, UploadPolicy};

/// Builds the error a check reports; input errors for plain files, invalid
/// image errors for the image service.
pub(crate) type Reject = fn(String) -> S3Error;

pub(crate) fn reject_input(message: String) -> S3Error {
    S3Error::invalid_input(message)
}

pub(crate) fn reject_image(message: String) -> S3Error {
    S3Error::invalid_image(message)
}

pub(crate) fn validate_key(key: &str) -> S3Result<()> {
    if key.trim().is_empty() {
        return Err(S3Error::invalid_input("Object key must not be null or empty"));
    }
    Ok(())
}

/// The file must exist, be a regular file and not be empty. Returns its length.
pub(crate) async fn validate_file(path: &Path, subject: &str, reject: Reject) -> S3Result<u64> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Err(reject(format!("{} must exist and be a valid file", subject))),
    };

    if metadata.len() == 0 {
        return Err(reject(format!("{} size must be greater than 0", subject)));
    }
    Ok(metadata.len())
}

pub(crate) fn validate_content_type(content_type: &str, reject: Reject) -> S3Result<()> {
    if content_type.trim().is_empty() {
        return Err(reject("Content type must not be null or empty".to_string()));
    }
    Ok(())
}

pub(crate) fn validate_image_content_type(content_type: &str) -> S3Result<()> {
    validate_content_type(content_type, reject_image)?;

    if !ImageType::is_allowed_mime_type(&content_type.to_lowercase()) {
        return Err(S3Error::invalid_image(format!(
            "Image File type not allowed: MIME type {}",
            content_type
        )));
    }
    Ok(())
}

pub(crate) fn validate_content_length(content_length: u64, reject: Reject) -> S3Result<()> {
    if content_length == 0 {
        return Err(reject("Content length must be greater than 0".to_string()));
    }
    Ok(())
}

/// Applies the optional size ceiling
pub(crate) fn validate_size(content_length: u64, policy: &UploadPolicy, reject: Reject) -> S3Result<()> {
    match policy.max_content_length {
        Some(max) if content_length > max => Err(reject(format!(
            "Content length {} exceeds maximum {}",
            content_length, max
        ))),
        _ => Ok(()),
    }
}

/// Lowercase extension of the file name, including the leading dot
pub(crate) fn file_extension(path: &Path) -> S3Result<String> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    match file_name.rfind('.') {
        Some(index) => Ok(file_name[index..].to_lowercase()),
        None => Err(S3Error::invalid_image(format!(
            "Image File has no extension: {}",
            file_name
        ))),
    }
}

pub(crate) fn validate_image_extension(path: &Path) -> S3Result<()> {
    let extension = file_extension(path)?;
    if !ImageType::allowed_extensions().contains(&extension) {
        return Err(S3Error::invalid_image(format!(
            "Image File type not allowed: extension {}",
            extension
        )));
    }
    Ok(())
}
