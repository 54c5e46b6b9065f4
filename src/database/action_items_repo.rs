// Action items repository for meeting-insights
// Handles the manual follow-up operations on derived action items.
// Batch creation happens inside the meeting completion transaction
// (see meetings_repo); the pipeline never touches rows after that.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use super::models::ActionItem;
use super::DatabaseManager;

impl DatabaseManager {
    /// Get all action items for a meeting (insertion order)
    pub fn list_action_items(&self, meeting_id: &str) -> Result<Vec<ActionItem>> {
        self.with_connection(|conn| {
            list_action_items_impl(conn, meeting_id)
        })
    }

    /// Set the completion flag on an action item
    pub fn set_action_item_completed(&self, id: &str, is_completed: bool) -> Result<()> {
        self.with_connection(|conn| {
            set_action_item_completed_impl(conn, id, is_completed)
        })
    }

    /// Link an action item to a real user, or clear the link with None.
    /// This is always a manual follow-up; the pipeline only stamps the
    /// reported name into the task text.
    pub fn assign_action_item(&self, id: &str, assignee_id: Option<&str>) -> Result<()> {
        self.with_connection(|conn| {
            assign_action_item_impl(conn, id, assignee_id)
        })
    }

    /// Delete an action item
    pub fn delete_action_item(&self, id: &str) -> Result<()> {
        self.with_connection(|conn| {
            delete_action_item_impl(conn, id)
        })
    }
}

fn list_action_items_impl(conn: &Connection, meeting_id: &str) -> Result<Vec<ActionItem>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, meeting_id, task, is_completed, due_date, assignee_id, created_at
        FROM action_items
        WHERE meeting_id = ?
        ORDER BY created_at ASC, rowid ASC
        "#
    ).context("Failed to prepare list_action_items query")?;

    let items = stmt.query_map(params![meeting_id], |row| {
        let due_date: Option<String> = row.get(4)?;
        Ok(ActionItem {
            id: row.get(0)?,
            meeting_id: row.get(1)?,
            task: row.get(2)?,
            is_completed: row.get::<_, i32>(3)? != 0,
            due_date: due_date.and_then(|d| d.parse().ok()),
            assignee_id: row.get(5)?,
            created_at: row.get(6)?,
        })
    }).context("Failed to query action items")?;

    items.collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect action items")
}

fn set_action_item_completed_impl(conn: &Connection, id: &str, is_completed: bool) -> Result<()> {
    conn.execute(
        "UPDATE action_items SET is_completed = ? WHERE id = ?",
        params![is_completed as i32, id],
    ).context("Failed to update action item completion")?;

    Ok(())
}

fn assign_action_item_impl(conn: &Connection, id: &str, assignee_id: Option<&str>) -> Result<()> {
    conn.execute(
        "UPDATE action_items SET assignee_id = ? WHERE id = ?",
        params![assignee_id, id],
    ).context("Failed to assign action item")?;

    Ok(())
}

fn delete_action_item_impl(conn: &Connection, id: &str) -> Result<()> {
    conn.execute("DELETE FROM action_items WHERE id = ?", params![id])
        .context("Failed to delete action item")?;

    Ok(())
}
