//! Google Generative Language API provider
//!
//! Stages audio through the resumable file-upload endpoint, runs a
//! single generateContent call against a multimodal model, and deletes
//! the staged file when the pipeline is done with it.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::provider::{InsightProvider, ProviderError, StagedFile};

/// Gemini provider configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-flash".to_string(),
            timeout_secs: 300,
        }
    }
}

impl GeminiConfig {
    /// Read the API key from GEMINI_API_KEY, keeping the other defaults
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            ProviderError::AuthenticationFailed("GEMINI_API_KEY is not set".to_string())
        })?;

        Ok(Self {
            api_key,
            ..Default::default()
        })
    }
}

/// Resumable upload start request
#[derive(Debug, Serialize)]
struct UploadStartRequest<'a> {
    file: UploadFileMeta<'a>,
}

#[derive(Debug, Serialize)]
struct UploadFileMeta<'a> {
    display_name: &'a str,
}

/// File resource returned once the upload is finalized
#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteFile {
    name: String,
    uri: String,
    mime_type: String,
}

/// generateContent request
#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text {
        text: String,
    },
    File {
        #[serde(rename = "fileData")]
        file_data: RequestFileData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestFileData {
    mime_type: String,
    file_uri: String,
}

/// generateContent response
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Gemini insight provider
pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }
}

#[async_trait]
impl InsightProvider for GeminiClient {
    fn provider_name(&self) -> &'static str {
        "gemini"
    }

    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<StagedFile, ProviderError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ProviderError::UploadFailed(format!("cannot read {}: {}", path.display(), e))
        })?;

        // Phase 1: open a resumable upload session
        let start_url = format!("{}/upload/v1beta/files", self.config.base_url);
        let response = self
            .client
            .post(&start_url)
            .header("x-goog-api-key", &self.config.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&UploadStartRequest {
                file: UploadFileMeta { display_name },
            })
            .send()
            .await
            .map_err(|e| ProviderError::UploadFailed(format!("start request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::UploadFailed(format!(
                "upload start returned {}: {}",
                status, body
            )));
        }

        let upload_url = response
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::UploadFailed("no upload URL in start response".to_string())
            })?;

        // Phase 2: send the bytes and finalize in one shot
        let response = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header("X-Goog-Upload-Offset", "0")
            .body(bytes)
            .send()
            .await
            .map_err(|e| ProviderError::UploadFailed(format!("byte upload failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::UploadFailed(format!(
                "upload finalize returned {}: {}",
                status, body
            )));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("upload response: {}", e)))?;

        log::info!(
            "Staged '{}' with Gemini as {} ({})",
            display_name,
            uploaded.file.name,
            uploaded.file.uri
        );

        Ok(StagedFile {
            name: uploaded.file.name,
            uri: uploaded.file.uri,
            mime_type: uploaded.file.mime_type,
        })
    }

    async fn generate(&self, prompt: &str, file: &StagedFile) -> Result<String, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        );

        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text {
                        text: prompt.to_string(),
                    },
                    RequestPart::File {
                        file_data: RequestFileData {
                            mime_type: file.mime_type.clone(),
                            file_uri: file.uri.clone(),
                        },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(format!("generation request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed(format!(
                "Gemini returned {}: {}",
                status, body
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("generation response: {}", e)))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "response contained no text".to_string(),
            ));
        }

        Ok(text)
    }

    async fn delete_file(&self, file: &StagedFile) -> Result<(), ProviderError> {
        let url = format!("{}/v1beta/{}", self.config.base_url, file.name);

        let response = self
            .client
            .delete(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::DeleteFailed(format!("delete request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ProviderError::DeleteFailed(format!(
                "Gemini returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
