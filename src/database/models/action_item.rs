// Database models - ActionItem
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A task derived from meeting content.
///
/// Rows are created either by the processing pipeline (batch, inside the
/// completion transaction) or manually by a user. The pipeline never
/// links an assignee to a real user; it only stamps the reported name
/// into the task text. `assignee_id` is filled in later by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionItem {
    pub id: String,
    pub meeting_id: String,
    pub task: String,
    pub is_completed: bool,
    pub due_date: Option<NaiveDate>,
    pub assignee_id: Option<String>,
    pub created_at: String,
}

impl ActionItem {
    pub fn new(meeting_id: String, task: String, due_date: Option<NaiveDate>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            meeting_id,
            task,
            is_completed: false,
            due_date,
            assignee_id: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
