// Insight response contract
// The fixed instruction prompt, fence stripping, and the strict decode
// of the model's JSON payload into typed insights.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::database::models::{ActionItem, TranscriptSegment};

/// Instruction prompt sent with every generation request. Constant
/// across invocations; the model receives it together with the staged
/// audio file reference.
pub const INSIGHT_PROMPT: &str = r#"
You are an expert executive assistant. Listen to this meeting recording and extract structured data.
Output strictly valid JSON.
{
  "summary": "Concise summary.",
  "transcript": [{ "speaker": "Name", "timestamp": "00:00", "text": "..." }],
  "actionItems": [{ "task": "Task description", "assignee": "Name", "dueDate": "YYYY-MM-DD" }]
}
"#;

/// Assignee value the model uses when it could not attribute a task
const UNASSIGNED_SENTINEL: &str = "unassigned";

/// Structured insights decoded from the model response
#[derive(Debug, Clone, Deserialize)]
pub struct MeetingInsights {
    pub summary: String,
    #[serde(default)]
    pub transcript: Vec<TranscriptSegment>,
    #[serde(rename = "actionItems", default)]
    pub action_items: Vec<ReportedActionItem>,
}

/// One action item as reported by the model, before commit rules apply
#[derive(Debug, Clone, Deserialize)]
pub struct ReportedActionItem {
    pub task: String,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(rename = "dueDate", default)]
    pub due_date: Option<String>,
}

impl ReportedActionItem {
    /// Build the row the committer inserts.
    ///
    /// The reported assignee is never resolved to a user account here;
    /// when present and not the "unassigned" sentinel it is stamped
    /// into the task text. An unparseable due date becomes null rather
    /// than failing the commit.
    pub fn to_action_item(&self, meeting_id: &str) -> ActionItem {
        let task = match self.assignee.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() && !name.eq_ignore_ascii_case(UNASSIGNED_SENTINEL) => {
                format!("{} (Assigned to: {})", self.task, name)
            }
            _ => self.task.clone(),
        };

        let due_date = self.due_date.as_deref().and_then(parse_due_date);

        ActionItem::new(meeting_id.to_string(), task, due_date)
    }
}

/// Remove optional markdown code fences around the model's JSON.
///
/// The model sometimes wraps its output in a ```json block despite the
/// prompt; stripping is idempotent so already-clean payloads pass
/// through unchanged.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// Decode the (fence-stripped) response text against the insight schema.
/// This is the single validation boundary: malformed output fails here,
/// never as a field access somewhere downstream.
pub fn parse_insights(raw: &str) -> Result<MeetingInsights, serde_json::Error> {
    serde_json::from_str(&strip_code_fences(raw))
}

/// Parse an ISO calendar date, tolerating nothing else
pub fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}
