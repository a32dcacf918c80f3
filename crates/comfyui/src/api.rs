//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps the three endpoints the sprite pipeline needs (workflow
//! submission, history retrieval, output download) using [`reqwest`].

use std::time::Duration;

use serde::Deserialize;
use spritegen_core::workflow::Workflow;

use crate::history::{parse_history, ImageRef, JobResult};

/// Output folder type requested from `/view`.
const OUTPUT_FOLDER_TYPE: &str = "output";

/// HTTP client for a single ComfyUI instance.
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
    client_id: String,
}

/// Response returned by the ComfyUI `/prompt` endpoint after
/// successfully queuing a workflow.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: String,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: Option<i64>,
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("ComfyUI service unreachable: {0}")]
    ServiceUnreachable(#[from] reqwest::Error),

    /// The workflow failed local validation or ComfyUI refused to queue it.
    #[error("Invalid job description: {0}")]
    InvalidJobDescription(String),

    /// ComfyUI answered, but not in the expected shape.
    #[error("ComfyUI protocol error: {0}")]
    Protocol(String),

    /// The job did not show up in the history before the deadline.
    #[error("Prompt {prompt_id} did not complete within {timeout:?}")]
    Timeout { prompt_id: String, timeout: Duration },

    /// Retrieving an output file failed.
    #[error("Failed to download '{filename}': {reason}")]
    Download { filename: String, reason: String },
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client whose requests each fail after `timeout`.
    pub fn with_request_timeout(
        api_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ComfyUIApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url))
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            api_url,
            client_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Client ID sent with every submission.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Submit a workflow for execution.
    ///
    /// Validates the graph locally, then sends `POST /prompt` with
    /// `{"prompt": <workflow>, "client_id": <id>}`. Returns the
    /// server-assigned `prompt_id`.
    pub async fn submit_workflow(&self, workflow: &Workflow) -> Result<String, ComfyUIApiError> {
        workflow
            .validate()
            .map_err(|e| ComfyUIApiError::InvalidJobDescription(e.to_string()))?;
        let prompt = workflow
            .to_json()
            .map_err(|e| ComfyUIApiError::InvalidJobDescription(e.to_string()))?;

        let body = serde_json::json!({
            "prompt": prompt,
            "client_id": self.client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, body) = Self::error_body(response).await;
            return Err(ComfyUIApiError::InvalidJobDescription(format!(
                "ComfyUI rejected the workflow ({status}): {body}"
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ComfyUIApiError::Protocol(format!("/prompt returned invalid JSON: {e}")))?;
        let submitted: SubmitResponse = serde_json::from_value(value).map_err(|e| {
            ComfyUIApiError::Protocol(format!("/prompt response has no usable 'prompt_id': {e}"))
        })?;

        tracing::info!(
            prompt_id = %submitted.prompt_id,
            queue_number = ?submitted.number,
            "Workflow queued",
        );
        Ok(submitted.prompt_id)
    }

    /// Retrieve the execution history for a specific prompt.
    ///
    /// Sends `GET /history/{prompt_id}`. Returns `None` while the prompt is
    /// still queued or running (ComfyUI answers with an empty object).
    pub async fn get_history(&self, prompt_id: &str) -> Result<Option<JobResult>, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, body) = Self::error_body(response).await;
            return Err(ComfyUIApiError::Protocol(format!(
                "/history/{prompt_id} returned {status}: {body}"
            )));
        }

        let history: serde_json::Value = response.json().await.map_err(|e| {
            ComfyUIApiError::Protocol(format!("/history/{prompt_id} returned invalid JSON: {e}"))
        })?;
        parse_history(prompt_id, history)
    }

    /// Download the raw bytes of an output file.
    ///
    /// Sends `GET /view?filename=..&subfolder=..&type=output`.
    pub async fn fetch_bytes(
        &self,
        filename: &str,
        subfolder: &str,
    ) -> Result<Vec<u8>, ComfyUIApiError> {
        let download_error = |reason: String| ComfyUIApiError::Download {
            filename: filename.to_string(),
            reason,
        };

        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", filename),
                ("subfolder", subfolder),
                ("type", OUTPUT_FOLDER_TYPE),
            ])
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        if !response.status().is_success() {
            let (status, body) = Self::error_body(response).await;
            return Err(download_error(format!("HTTP {status}: {body}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        tracing::debug!(filename, subfolder, size_bytes = bytes.len(), "Downloaded output");
        Ok(bytes.to_vec())
    }

    /// Convenience wrapper around [`fetch_bytes`](Self::fetch_bytes).
    pub async fn fetch_image(&self, image: &ImageRef) -> Result<Vec<u8>, ComfyUIApiError> {
        self.fetch_bytes(&image.filename, &image.subfolder).await
    }

    // ---- private helpers ----

    /// Status code and body text of a failed response.
    async fn error_body(response: reqwest::Response) -> (u16, String) {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        (status, body)
    }
}
