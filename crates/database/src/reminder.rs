//! Reminder CRUD operations.

use chrono::NaiveDateTime;
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::Reminder;

fn key(user_id: &str, reminder_id: &str) -> String {
    format!("{}/{}", user_id, reminder_id)
}

/// Create a reminder with content and no time yet.
pub async fn create_reminder(
    pool: &SqlitePool,
    user_id: &str,
    reminder_id: &str,
    content: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO reminders (user_id, reminder_id, content, scheduled_time)
        VALUES (?, ?, ?, NULL)
        "#,
    )
    .bind(user_id)
    .bind(reminder_id)
    .bind(content)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::on_insert(e, "Reminder", key(user_id, reminder_id)))?;

    Ok(())
}

/// Attach a fire time to a reminder.
pub async fn set_reminder_time(
    pool: &SqlitePool,
    user_id: &str,
    reminder_id: &str,
    time: NaiveDateTime,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE reminders
        SET scheduled_time = ?
        WHERE user_id = ? AND reminder_id = ?
        "#,
    )
    .bind(time)
    .bind(user_id)
    .bind(reminder_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Reminder", key(user_id, reminder_id)));
    }

    Ok(())
}

/// Get a single reminder.
pub async fn get_reminder(
    pool: &SqlitePool,
    user_id: &str,
    reminder_id: &str,
) -> Result<Option<Reminder>> {
    let reminder = sqlx::query_as::<_, Reminder>(
        r#"
        SELECT user_id, reminder_id, content, scheduled_time
        FROM reminders
        WHERE user_id = ? AND reminder_id = ?
        "#,
    )
    .bind(user_id)
    .bind(reminder_id)
    .fetch_optional(pool)
    .await?;

    Ok(reminder)
}

/// Delete a single reminder. Returns true if a row was removed.
pub async fn delete_reminder(pool: &SqlitePool, user_id: &str, reminder_id: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM reminders
        WHERE user_id = ? AND reminder_id = ?
        "#,
    )
    .bind(user_id)
    .bind(reminder_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete every reminder of a user whose content matches exactly.
///
/// Returns the ids of the deleted rows; its length is the deleted count.
pub async fn delete_reminders_by_content(
    pool: &SqlitePool,
    user_id: &str,
    content: &str,
) -> Result<Vec<String>> {
    let ids = sqlx::query_scalar::<_, String>(
        r#"
        DELETE FROM reminders
        WHERE user_id = ? AND content = ?
        RETURNING reminder_id
        "#,
    )
    .bind(user_id)
    .bind(content)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Delete all reminders of a user. Returns the number of removed rows.
pub async fn delete_user_reminders(pool: &SqlitePool, user_id: &str) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM reminders
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// List all reminders of a user, scheduled or not.
pub async fn list_reminders(pool: &SqlitePool, user_id: &str) -> Result<Vec<Reminder>> {
    let reminders = sqlx::query_as::<_, Reminder>(
        r#"
        SELECT user_id, reminder_id, content, scheduled_time
        FROM reminders
        WHERE user_id = ?
        ORDER BY scheduled_time IS NULL, scheduled_time, created_at
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(reminders)
}

/// List a user's reminders that fire strictly after `now`, soonest first.
pub async fn list_upcoming(
    pool: &SqlitePool,
    user_id: &str,
    now: NaiveDateTime,
) -> Result<Vec<Reminder>> {
    let reminders = sqlx::query_as::<_, Reminder>(
        r#"
        SELECT user_id, reminder_id, content, scheduled_time
        FROM reminders
        WHERE user_id = ? AND scheduled_time IS NOT NULL AND scheduled_time > ?
        ORDER BY scheduled_time
        "#,
    )
    .bind(user_id)
    .bind(now)
    .fetch_all(pool)
    .await?;

    Ok(reminders)
}

/// List every reminder that has a fire time, across all users.
pub async fn list_all_scheduled(pool: &SqlitePool) -> Result<Vec<Reminder>> {
    let reminders = sqlx::query_as::<_, Reminder>(
        r#"
        SELECT user_id, reminder_id, content, scheduled_time
        FROM reminders
        WHERE scheduled_time IS NOT NULL
        ORDER BY scheduled_time
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(reminders)
}
