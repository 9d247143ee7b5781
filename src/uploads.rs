use axum::body::Bytes;
use chrono::Utc;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use crate::errors::AppError;

pub const DEFAULT_BUCKET: &str = "profile-images";
pub const DEFAULT_MAX_BYTES: usize = 2 * 1024 * 1024;
pub const DEFAULT_ALLOWED_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// Size and type limits for one storage bucket.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub bucket: String,
    pub max_bytes: usize,
    pub allowed_types: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            max_bytes: DEFAULT_MAX_BYTES,
            allowed_types: DEFAULT_ALLOWED_TYPES.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl UploadPolicy {
    /// Rejects oversize bodies and content types outside the allow-list.
    pub fn check(&self, content_type: &str, size: usize) -> Result<(), AppError> {
        if size == 0 {
            return Err(AppError::Validation("Upload body is empty".to_string()));
        }
        if size > self.max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "Images must be {} bytes or smaller",
                self.max_bytes
            )));
        }

        let mime = essence(content_type);
        if !self.allowed_types.iter().any(|t| t == mime) {
            return Err(AppError::UnsupportedMediaType(format!(
                "Only {} images are accepted",
                self.allowed_types.join(", ")
            )));
        }
        Ok(())
    }

    /// `<folder>/<millis>-<random>.<ext>`, or just the file name without a folder.
    pub fn object_path(&self, folder: Option<&str>, content_type: &str) -> Result<String, AppError> {
        let file_name = format!(
            "{}-{}.{}",
            Utc::now().timestamp_millis(),
            &Uuid::new_v4().simple().to_string()[..13],
            extension_for(content_type)
        );

        match folder.map(str::trim).filter(|f| !f.is_empty()) {
            Some(folder) => {
                validate_folder(folder)?;
                Ok(format!("{}/{}", folder, file_name))
            }
            None => Ok(file_name),
        }
    }
}

/// `image/png; charset=binary` -> `image/png`
fn essence(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or_default().trim()
}

fn extension_for(content_type: &str) -> &'static str {
    match essence(content_type) {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

fn validate_folder(folder: &str) -> Result<(), AppError> {
    let valid = folder.split('/').all(|segment| {
        !segment.is_empty()
            && segment != "."
            && segment != ".."
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    });
    if !valid {
        return Err(AppError::Validation(format!("Invalid folder '{}'", folder)));
    }
    Ok(())
}

/// Client for the hosted object storage REST API.
#[derive(Clone)]
pub struct StorageClient {
    client: reqwest::Client,
    base_url: Url,
    service_key: String,
}

impl StorageClient {
    pub fn new(base_url: &str, service_key: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Upstream(format!("Failed to create storage client: {}", e)))?;

        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::Internal(format!("Invalid storage base URL: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            service_key,
        })
    }

    fn object_url(&self, prefix: &[&str], bucket: &str, path: &str) -> Result<Url, AppError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Internal("Storage base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(prefix)
            .push(bucket)
            .extend(path.split('/'));
        Ok(url)
    }

    pub fn public_url(&self, bucket: &str, path: &str) -> Result<String, AppError> {
        self.object_url(&["storage", "v1", "object", "public"], bucket, path)
            .map(String::from)
    }

    /// Uploads without overwriting; returns the object's public URL.
    pub async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<String, AppError> {
        let url = self.object_url(&["storage", "v1", "object"], bucket, path)?;
        tracing::info!("Uploading {} bytes to {}/{}", body.len(), bucket, path);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header("x-upsert", "false")
            .header(reqwest::header::CACHE_CONTROL, "max-age=3600")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Storage upload failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Storage upload returned {}: {}", status, body);
            return Err(AppError::Upstream(format!(
                "Storage returned {} for {}/{}",
                status, bucket, path
            )));
        }

        self.public_url(bucket, path)
    }
}
