// Thin reqwest wrapper for the service API. Reads the session token live at
// request-build time so a mid-flight session reset invalidates future
// requests without tearing down in-flight ones.

use bytes::Bytes;
use reqwest::multipart;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::types::{ClientError, ClientResult};

/// Shared live view of the session token. Owned by the session manager,
/// read by every authenticated request.
pub type TokenHandle = Arc<RwLock<Option<String>>>;

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: TokenHandle,
}

#[derive(Deserialize)]
struct DownloadInfoResponse {
    url: String,
    #[serde(default)]
    content_type: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    files: Vec<UploadedFile>,
}

#[derive(Deserialize)]
struct UploadedFile {
    file_id: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: TokenHandle) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn bearer(&self) -> ClientResult<String> {
        let guard = self.token.read().await;
        guard
            .clone()
            .ok_or_else(|| ClientError::InvalidRequest("No active session".to_string()))
    }

    async fn read_json(response: reqwest::Response, context: &str) -> ClientResult<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Protocol(format!(
                "{} returned {}: {}",
                context, status, body
            )));
        }
        response
            .json()
            .await
            .map_err(|e| ClientError::Protocol(format!("{} returned malformed JSON: {}", context, e)))
    }

    pub async fn get_json(&self, path: &str) -> ClientResult<Value> {
        let response = self.http.get(self.url(path)).send().await?;
        Self::read_json(response, path).await
    }

    pub async fn get_json_auth(&self, path: &str) -> ClientResult<Value> {
        let token = self.bearer().await?;
        let response = self
            .http
            .get(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;
        Self::read_json(response, path).await
    }

    pub async fn post_json_auth(&self, path: &str, body: &Value) -> ClientResult<Value> {
        let token = self.bearer().await?;
        let response = self
            .http
            .post(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
            .json(body)
            .send()
            .await?;
        Self::read_json(response, path).await
    }

    pub async fn delete_auth(&self, path: &str) -> ClientResult<()> {
        let token = self.bearer().await?;
        let response = self
            .http
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Protocol(format!(
                "{} returned {}: {}",
                path, status, body
            )));
        }
        Ok(())
    }

    /// Fetches a blob from an absolute URL, e.g. one returned by download
    /// info.
    pub async fn get_bytes(&self, url: &str) -> ClientResult<Bytes> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Protocol(format!(
                "Download from {} returned {}",
                url, status
            )));
        }
        Ok(response.bytes().await?)
    }

    /// Resolves a file or package id to its download URL and fetches the
    /// blob. Returns the payload and its reported content type.
    pub async fn download(&self, id: &str) -> ClientResult<(Bytes, String)> {
        let info = self.get_json(&format!("/v1/download/info/{}", id)).await?;
        let info: DownloadInfoResponse = serde_json::from_value(info)
            .map_err(|e| ClientError::Protocol(format!("Malformed download info: {}", e)))?;
        debug!(id, url = %info.url, "Resolved download info");
        let bytes = self.get_bytes(&info.url).await?;
        Ok((bytes, info.content_type))
    }

    /// Uploads the given files in one multipart request and returns the
    /// assigned file ids, in request order.
    pub async fn upload_files(&self, paths: &[std::path::PathBuf]) -> ClientResult<Vec<String>> {
        let token = self.bearer().await?;

        let mut form = multipart::Form::new();
        for path in paths {
            let data = tokio::fs::read(path).await?;
            let file_name = file_name_of(path);
            form = form.part(
                "files",
                multipart::Part::bytes(data).file_name(file_name),
            );
        }

        let response = self
            .http
            .post(self.url("/v1/upload/store"))
            .header("Authorization", format!("Bearer {}", token))
            .multipart(form)
            .send()
            .await?;
        let value = Self::read_json(response, "/v1/upload/store").await?;
        let upload: UploadResponse = serde_json::from_value(value)
            .map_err(|e| ClientError::Protocol(format!("Malformed upload response: {}", e)))?;
        Ok(upload.files.into_iter().map(|f| f.file_id).collect())
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string())
}
