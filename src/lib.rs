// meeting-insights - audio-to-insight processing pipeline
//
// Turns one uploaded meeting recording into durable structured data:
// a summary, an ordered transcript, and derived action items, committed
// atomically together with the meeting's lifecycle status.

// Core modules
pub mod database;
pub mod insight;
pub mod pipeline;

pub use database::{ActionItem, DatabaseManager, Meeting, MeetingStatus, TranscriptSegment};
pub use insight::{GeminiClient, GeminiConfig, InsightProvider, ProviderError, StagedFile};
pub use pipeline::{DispatchError, PipelineConfig, PipelineError, PipelineQueue};
