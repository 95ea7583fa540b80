//! Cloudinary object store.
//!
//! Uploads go through the signed upload API with `resource_type = auto`.
//! The object id keeps the resource type Cloudinary picked so that the
//! matching destroy endpoint can be called later: `image:drive_clone/abc`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::storage::{ObjectStore, StoredObject};
use crate::config::CloudinaryConfig;
use crate::{CumulusError, Result};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Total timeout in seconds (uploads can be large).
const TOTAL_TIMEOUT_SECS: u64 = 300;

/// Resource type assumed for object ids without a prefix.
const DEFAULT_RESOURCE_TYPE: &str = "raw";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    resource_type: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Object store backed by Cloudinary.
pub struct CloudinaryStore {
    client: Client,
    config: CloudinaryConfig,
    api_base: String,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig) -> Result<Self> {
        Self::with_api_base(config, API_BASE)
    }

    /// Create a store talking to a different API host.
    pub fn with_api_base(config: CloudinaryConfig, api_base: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(TOTAL_TIMEOUT_SECS))
            .build()
            .map_err(|e| CumulusError::Storage(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Sign request parameters: SHA-256 over the sorted `key=value` pairs
    /// joined with `&`, followed by the API secret.
    fn sign(&self, params: &BTreeMap<&str, String>) -> String {
        let joined = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        hasher.update(self.config.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn endpoint(&self, resource_type: &str, action: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.api_base, self.config.cloud_name, resource_type, action
        )
    }

    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        match response.json::<ErrorResponse>().await {
            Ok(body) => format!("{status}: {}", body.error.message),
            Err(_) => status.to_string(),
        }
    }
}

/// Split a stored object id into resource type and public id.
pub fn split_object_id(object_id: &str) -> (&str, &str) {
    match object_id.split_once(':') {
        Some((kind @ ("image" | "video" | "raw"), public_id)) => (kind, public_id),
        _ => (DEFAULT_RESOURCE_TYPE, object_id),
    }
}

fn unix_timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

#[async_trait]
impl ObjectStore for CloudinaryStore {
    async fn upload(&self, content: Vec<u8>, original_name: &str) -> Result<StoredObject> {
        let mut params = BTreeMap::new();
        params.insert("folder", self.config.folder.clone());
        params.insert("timestamp", unix_timestamp());
        let signature = self.sign(&params);

        let mime = mime_guess::from_path(original_name).first_or_octet_stream();
        let part = Part::bytes(content)
            .file_name(original_name.to_string())
            .mime_str(mime.essence_str())
            .map_err(|e| CumulusError::Storage(format!("invalid content type: {e}")))?;

        let mut form = Form::new()
            .part("file", part)
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (key, value) in params {
            form = form.text(key, value);
        }

        let response = self
            .client
            .post(self.endpoint("auto", "upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| CumulusError::Storage(format!("upload request failed: {e}")))?;

        if !response.status().is_success() {
            let message = Self::error_message(response).await;
            return Err(CumulusError::Storage(format!("upload rejected: {message}")));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| CumulusError::Storage(format!("invalid upload response: {e}")))?;

        debug!(public_id = %body.public_id, "Uploaded object to Cloudinary");
        Ok(StoredObject {
            url: body.secure_url,
            object_id: format!("{}:{}", body.resource_type, body.public_id),
        })
    }

    async fn destroy(&self, object_id: &str) -> Result<()> {
        let (resource_type, public_id) = split_object_id(object_id);

        let mut params = BTreeMap::new();
        params.insert("public_id", public_id.to_string());
        params.insert("timestamp", unix_timestamp());
        let signature = self.sign(&params);

        let mut form: Vec<(&str, String)> = params.into_iter().collect();
        form.push(("api_key", self.config.api_key.clone()));
        form.push(("signature", signature));
        form.push(("signature_algorithm", "sha256".to_string()));

        let response = self
            .client
            .post(self.endpoint(resource_type, "destroy"))
            .form(&form)
            .send()
            .await
            .map_err(|e| CumulusError::Storage(format!("destroy request failed: {e}")))?;

        if !response.status().is_success() {
            let message = Self::error_message(response).await;
            return Err(CumulusError::Storage(format!("destroy rejected: {message}")));
        }

        let body: DestroyResponse = response
            .json()
            .await
            .map_err(|e| CumulusError::Storage(format!("invalid destroy response: {e}")))?;

        match body.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(CumulusError::Storage(format!("destroy failed: {other}"))),
        }
    }

    fn backend_name(&self) -> &'static str {
        "cloudinary"
    }
}
