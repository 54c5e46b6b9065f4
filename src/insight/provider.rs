//! Insight provider trait and types
//!
//! Defines the interface the pipeline uses to talk to a hosted
//! multimodal model. Implementations are constructed explicitly and
//! injected, so tests can substitute fakes without process-wide state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Error types for provider operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProviderError {
    /// File staging upload failed
    UploadFailed(String),
    /// Generation call failed (network, timeout, quota, provider error)
    RequestFailed(String),
    /// Response arrived but could not be interpreted
    InvalidResponse(String),
    /// Provider-side file deletion failed
    DeleteFailed(String),
    /// API key missing or invalid
    AuthenticationFailed(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::UploadFailed(msg) => write!(f, "Upload failed: {}", msg),
            ProviderError::RequestFailed(msg) => write!(f, "Request failed: {}", msg),
            ProviderError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            ProviderError::DeleteFailed(msg) => write!(f, "Delete failed: {}", msg),
            ProviderError::AuthenticationFailed(msg) => write!(f, "Authentication failed: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Handle to an audio file staged provider-side.
///
/// Valid only for the pipeline invocation that created it; the runner
/// deletes it before returning, on success and failure alike.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedFile {
    /// Provider resource name used for deletion (e.g. "files/abc123")
    pub name: String,
    /// URI referenced by the generation request
    pub uri: String,
    /// MIME type as negotiated by the provider
    pub mime_type: String,
}

/// The interface every insight backend must implement
#[async_trait]
pub trait InsightProvider: Send + Sync {
    /// Get the provider name (e.g. "gemini")
    fn provider_name(&self) -> &'static str;

    /// Stage a local audio file with the provider
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<StagedFile, ProviderError>;

    /// Run a single non-streaming generation over the staged file.
    /// Returns the raw response text; parsing happens at the caller's
    /// schema boundary.
    async fn generate(&self, prompt: &str, file: &StagedFile) -> Result<String, ProviderError>;

    /// Delete a staged file provider-side
    async fn delete_file(&self, file: &StagedFile) -> Result<(), ProviderError>;
}
