// Insight extraction module for meeting-insights
// Provider seam for the hosted multimodal model, the Gemini
// implementation, and the strict response contract

pub mod gemini;
pub mod provider;
pub mod response;

pub use gemini::{GeminiClient, GeminiConfig};
pub use provider::{InsightProvider, ProviderError, StagedFile};
pub use response::{parse_insights, MeetingInsights, ReportedActionItem, INSIGHT_PROMPT};
