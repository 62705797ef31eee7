use serde::{Deserialize, Serialize};

/// Outcome of a single put-object call, as reported by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub e_tag: String,
    pub status_code: u16,
    pub status_text: String,
}

impl UploadResponse {
    /// The store accepted the object
    pub fn accepted<S: Into<String>>(e_tag: S, status_code: u16) -> Self {
        Self {
            success: true,
            e_tag: e_tag.into(),
            status_code,
            status_text: String::new(),
        }
    }

    /// The store answered but refused the object
    pub fn rejected<S: Into<String>>(status_code: u16, status_text: S) -> Self {
        Self {
            success: false,
            e_tag: String::new(),
            status_code,
            status_text: status_text.into(),
        }
    }
}

/// What callers get back from an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub success: bool,
    pub e_tag: String,
    /// Object URL; empty on failure
    pub url: String,
    /// Diagnostic; empty on success
    pub message: String,
}

impl UploadResult {
    pub fn success(response: &UploadResponse, url: String) -> Self {
        Self {
            success: true,
            e_tag: response.e_tag.clone(),
            url,
            message: String::new(),
        }
    }

    pub fn fail(response: &UploadResponse) -> Self {
        Self {
            success: false,
            e_tag: String::new(),
            url: String::new(),
            message: format!(
                "S3 upload fail, status code: {}, message: {}",
                response.status_code, response.status_text
            ),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}
