// Meetings repository for meeting-insights
// Handles CRUD operations for meetings and the pipeline's commit/fallback writes

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};

use super::models::{ActionItem, Meeting, MeetingStatus, TranscriptSegment};
use super::DatabaseManager;

impl DatabaseManager {
    /// Create a new meeting in PENDING state
    pub fn create_meeting(&self, meeting: &Meeting) -> Result<String> {
        self.with_connection(|conn| {
            create_meeting_impl(conn, meeting)
        })
    }

    /// Get a meeting by ID
    pub fn get_meeting(&self, id: &str) -> Result<Option<Meeting>> {
        self.with_connection(|conn| {
            get_meeting_impl(conn, id)
        })
    }

    /// Get all meetings for an organization (most recent first)
    pub fn list_meetings_for_org(&self, organization_id: &str) -> Result<Vec<Meeting>> {
        self.with_connection(|conn| {
            list_meetings_for_org_impl(conn, organization_id)
        })
    }

    /// Delete a meeting after verifying organization ownership.
    /// Action items are removed by the cascade. Returns false when the
    /// meeting does not exist or belongs to another organization.
    pub fn delete_meeting(&self, id: &str, organization_id: &str) -> Result<bool> {
        self.with_connection(|conn| {
            delete_meeting_impl(conn, id, organization_id)
        })
    }

    /// Record the uploaded audio URL and move the meeting into PROCESSING
    pub fn mark_meeting_processing(&self, id: &str, audio_url: &str) -> Result<()> {
        self.with_connection(|conn| {
            mark_meeting_processing_impl(conn, id, audio_url)
        })
    }

    /// Commit the pipeline's derived data as one unit.
    ///
    /// The status update and the action-item inserts share a single
    /// transaction: a reader never observes a COMPLETED meeting without
    /// its action items, or action items on a still-PROCESSING meeting.
    pub fn complete_meeting(
        &self,
        id: &str,
        summary: &str,
        transcript: &[TranscriptSegment],
        duration_seconds: i64,
        action_items: &[ActionItem],
    ) -> Result<()> {
        self.with_connection(|conn| {
            complete_meeting_impl(conn, id, summary, transcript, duration_seconds, action_items)
        })
    }

    /// Best-effort fallback write moving the meeting into FAILED.
    /// Deliberately not transactional with anything else; the caller
    /// logs and swallows any error since there is no further recovery.
    pub fn mark_meeting_failed(&self, id: &str) -> Result<()> {
        self.with_connection(|conn| {
            mark_meeting_failed_impl(conn, id)
        })
    }
}

fn create_meeting_impl(conn: &Connection, meeting: &Meeting) -> Result<String> {
    let transcript_json = meeting.transcript.as_ref()
        .map(serde_json::to_string)
        .transpose()
        .context("Failed to serialize transcript")?;

    conn.execute(
        r#"
        INSERT INTO meetings (
            id, title, description, scheduled_at, audio_url, duration_seconds,
            status, summary, transcript, organization_id, creator_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
        params![
            meeting.id,
            meeting.title,
            meeting.description,
            meeting.scheduled_at,
            meeting.audio_url,
            meeting.duration_seconds,
            meeting.status.as_str(),
            meeting.summary,
            transcript_json,
            meeting.organization_id,
            meeting.creator_id,
            meeting.created_at,
        ],
    ).context("Failed to create meeting")?;

    Ok(meeting.id.clone())
}

const MEETING_COLUMNS: &str = r#"
    id, title, description, scheduled_at, audio_url, duration_seconds,
    status, summary, transcript, organization_id, creator_id, created_at
"#;

fn meeting_from_row(row: &rusqlite::Row) -> rusqlite::Result<Meeting> {
    let status_str: String = row.get(6)?;
    let status = MeetingStatus::from_str(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            format!("unknown meeting status: {}", status_str).into(),
        )
    })?;

    let transcript_json: Option<String> = row.get(8)?;
    let transcript = match transcript_json {
        Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                8,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?),
        None => None,
    };

    Ok(Meeting {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        scheduled_at: row.get(3)?,
        audio_url: row.get(4)?,
        duration_seconds: row.get(5)?,
        status,
        summary: row.get(7)?,
        transcript,
        organization_id: row.get(9)?,
        creator_id: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn get_meeting_impl(conn: &Connection, id: &str) -> Result<Option<Meeting>> {
    let query = format!("SELECT {} FROM meetings WHERE id = ?", MEETING_COLUMNS);
    let mut stmt = conn.prepare(&query)
        .context("Failed to prepare get_meeting query")?;

    let result = stmt.query_row(params![id], meeting_from_row);

    match result {
        Ok(meeting) => Ok(Some(meeting)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).context("Failed to get meeting"),
    }
}

fn list_meetings_for_org_impl(conn: &Connection, organization_id: &str) -> Result<Vec<Meeting>> {
    let query = format!(
        "SELECT {} FROM meetings WHERE organization_id = ? ORDER BY scheduled_at DESC",
        MEETING_COLUMNS
    );
    let mut stmt = conn.prepare(&query)
        .context("Failed to prepare list_meetings_for_org query")?;

    let meetings = stmt.query_map(params![organization_id], meeting_from_row)
        .context("Failed to query meetings")?;

    meetings.collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect meetings")
}

fn delete_meeting_impl(conn: &Connection, id: &str, organization_id: &str) -> Result<bool> {
    let rows = conn.execute(
        "DELETE FROM meetings WHERE id = ? AND organization_id = ?",
        params![id, organization_id],
    ).context("Failed to delete meeting")?;

    Ok(rows > 0)
}

fn mark_meeting_processing_impl(conn: &Connection, id: &str, audio_url: &str) -> Result<()> {
    let rows = conn.execute(
        r#"
        UPDATE meetings
        SET status = 'PROCESSING',
            audio_url = ?,
            updated_at = datetime('now')
        WHERE id = ?
        "#,
        params![audio_url, id],
    ).context("Failed to mark meeting as processing")?;

    if rows == 0 {
        bail!("Meeting not found: {}", id);
    }

    Ok(())
}

fn complete_meeting_impl(
    conn: &Connection,
    id: &str,
    summary: &str,
    transcript: &[TranscriptSegment],
    duration_seconds: i64,
    action_items: &[ActionItem],
) -> Result<()> {
    let transcript_json = serde_json::to_string(transcript)
        .context("Failed to serialize transcript")?;

    let tx = conn.unchecked_transaction()
        .context("Failed to start completion transaction")?;

    let rows = tx.execute(
        r#"
        UPDATE meetings
        SET status = 'COMPLETED',
            summary = ?,
            transcript = ?,
            duration_seconds = ?,
            updated_at = datetime('now')
        WHERE id = ?
        "#,
        params![summary, transcript_json, duration_seconds, id],
    ).context("Failed to update meeting with insights")?;

    if rows == 0 {
        bail!("Meeting not found: {}", id);
    }

    for item in action_items {
        tx.execute(
            r#"
            INSERT INTO action_items (
                id, meeting_id, task, is_completed, due_date, assignee_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                item.id,
                item.meeting_id,
                item.task,
                item.is_completed as i32,
                item.due_date.map(|d| d.to_string()),
                item.assignee_id,
                item.created_at,
            ],
        ).context("Failed to insert action item")?;
    }

    tx.commit().context("Failed to commit meeting completion")?;
    Ok(())
}

fn mark_meeting_failed_impl(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        r#"
        UPDATE meetings
        SET status = 'FAILED',
            updated_at = datetime('now')
        WHERE id = ?
        "#,
        params![id],
    ).context("Failed to mark meeting as failed")?;

    Ok(())
}
