//! Session CRUD operations.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::{ConversationState, Session, SessionRow, SessionStatus};

/// Get a user's session, or a fresh idle session if none is stored.
pub async fn get_session(pool: &SqlitePool, user_id: &str) -> Result<Session> {
    let row = sqlx::query_as::<_, SessionRow>(
        r#"
        SELECT user_id, status, pending_reminder_id, last_fired_reminder_id
        FROM sessions
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row
        .map(Session::from)
        .unwrap_or_else(|| Session::idle(user_id)))
}

/// Create an idle session unless one exists. Returns true if a row was inserted.
pub async fn create_session_if_absent(pool: &SqlitePool, user_id: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO sessions (user_id, status)
        VALUES (?, ?)
        ON CONFLICT(user_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(SessionStatus::Idle.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Store a user's conversation state.
///
/// Writes the status and pending reminder id together. The last fired
/// reminder is left untouched.
pub async fn set_state(pool: &SqlitePool, user_id: &str, state: &ConversationState) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sessions (user_id, status, pending_reminder_id)
        VALUES (?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            status = excluded.status,
            pending_reminder_id = excluded.pending_reminder_id,
            updated_at = datetime('now')
        "#,
    )
    .bind(user_id)
    .bind(state.status().as_str())
    .bind(state.pending_reminder_id())
    .execute(pool)
    .await?;

    Ok(())
}

/// Record the reminder that fired most recently for a user.
pub async fn set_last_fired(pool: &SqlitePool, user_id: &str, reminder_id: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sessions (user_id, status, last_fired_reminder_id)
        VALUES (?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            last_fired_reminder_id = excluded.last_fired_reminder_id,
            updated_at = datetime('now')
        "#,
    )
    .bind(user_id)
    .bind(SessionStatus::Idle.as_str())
    .bind(reminder_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete a user's session. Returns true if a row was removed.
pub async fn delete_session(pool: &SqlitePool, user_id: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM sessions
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Count stored sessions.
pub async fn count_sessions(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM sessions
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}
