// Database models - Meeting
use serde::{Deserialize, Serialize};

/// Lifecycle status of a meeting's audio processing.
///
/// `Completed` and `Failed` are terminal; only a fresh upload dispatch
/// moves a meeting back into `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeetingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingStatus::Pending => "PENDING",
            MeetingStatus::Processing => "PROCESSING",
            MeetingStatus::Completed => "COMPLETED",
            MeetingStatus::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(MeetingStatus::Pending),
            "PROCESSING" => Some(MeetingStatus::Processing),
            "COMPLETED" => Some(MeetingStatus::Completed),
            "FAILED" => Some(MeetingStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One utterance of the meeting transcript.
///
/// Embedded in the meeting row as a JSON array, not a table of its own.
/// The speaker label is free text (never a user reference) and the
/// timestamp is a display string ("MM:SS"), not a duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub speaker: String,
    pub timestamp: String,
    pub text: String,
}

/// A meeting and its derived insights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_at: String,
    pub audio_url: Option<String>,
    pub duration_seconds: Option<i64>,
    pub status: MeetingStatus,
    pub summary: Option<String>,
    /// Ordered transcript segments, exactly as extracted. Populated only
    /// once processing completes.
    pub transcript: Option<Vec<TranscriptSegment>>,
    pub organization_id: String,
    pub creator_id: String,
    pub created_at: String,
}

impl Meeting {
    pub fn new(
        title: String,
        description: Option<String>,
        scheduled_at: chrono::DateTime<chrono::Utc>,
        organization_id: String,
        creator_id: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            description,
            scheduled_at: scheduled_at.to_rfc3339(),
            audio_url: None,
            duration_seconds: None,
            status: MeetingStatus::Pending,
            summary: None,
            transcript: None,
            organization_id,
            creator_id,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
