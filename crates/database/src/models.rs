//! Database models.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::warn;

/// Stored conversation status of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Waiting for reminder content or a command.
    Idle,
    /// Reminder content captured, waiting for the date picker.
    AwaitingTime,
    /// Reminder list shown, waiting for the content to remove.
    AwaitingCancelSelection,
}

impl SessionStatus {
    /// Column value for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingTime => "awaiting_time",
            Self::AwaitingCancelSelection => "awaiting_cancel_selection",
        }
    }

    /// Parse a column value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "idle" => Some(Self::Idle),
            "awaiting_time" => Some(Self::AwaitingTime),
            "awaiting_cancel_selection" => Some(Self::AwaitingCancelSelection),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversation state with the data each status carries.
///
/// The pending reminder id only exists inside `AwaitingTime`, so a session can
/// never point at a pending reminder while in another status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversationState {
    Idle,
    AwaitingTime { pending_reminder_id: String },
    AwaitingCancelSelection,
}

impl ConversationState {
    /// Status column for this state.
    pub fn status(&self) -> SessionStatus {
        match self {
            Self::Idle => SessionStatus::Idle,
            Self::AwaitingTime { .. } => SessionStatus::AwaitingTime,
            Self::AwaitingCancelSelection => SessionStatus::AwaitingCancelSelection,
        }
    }

    /// The reminder being configured, if any.
    pub fn pending_reminder_id(&self) -> Option<&str> {
        match self {
            Self::AwaitingTime {
                pending_reminder_id,
            } => Some(pending_reminder_id),
            _ => None,
        }
    }

    /// Convenience constructor for `AwaitingTime`.
    pub fn awaiting_time(pending_reminder_id: impl Into<String>) -> Self {
        Self::AwaitingTime {
            pending_reminder_id: pending_reminder_id.into(),
        }
    }
}

/// Per-user conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque transport identity of the user.
    pub user_id: String,
    /// Current conversation state.
    pub state: ConversationState,
    /// Most recently fired reminder, kept for snooze.
    pub last_fired_reminder_id: Option<String>,
}

impl Session {
    /// The session a user has before any row is stored.
    pub fn idle(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            state: ConversationState::Idle,
            last_fired_reminder_id: None,
        }
    }

    /// Current status.
    pub fn status(&self) -> SessionStatus {
        self.state.status()
    }
}

/// Raw `sessions` row.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct SessionRow {
    pub user_id: String,
    pub status: String,
    pub pending_reminder_id: Option<String>,
    pub last_fired_reminder_id: Option<String>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        let state = match (SessionStatus::parse(&row.status), row.pending_reminder_id) {
            (Some(SessionStatus::Idle), _) => ConversationState::Idle,
            (Some(SessionStatus::AwaitingCancelSelection), _) => {
                ConversationState::AwaitingCancelSelection
            }
            (Some(SessionStatus::AwaitingTime), Some(pending_reminder_id)) => {
                ConversationState::AwaitingTime {
                    pending_reminder_id,
                }
            }
            (Some(SessionStatus::AwaitingTime), None) => {
                warn!(
                    "Session {} is awaiting a time without a pending reminder, treating as idle",
                    row.user_id
                );
                ConversationState::Idle
            }
            (None, _) => {
                warn!(
                    "Session {} has unknown status '{}', treating as idle",
                    row.user_id, row.status
                );
                ConversationState::Idle
            }
        };

        Self {
            user_id: row.user_id,
            state,
            last_fired_reminder_id: row.last_fired_reminder_id,
        }
    }
}

/// A reminder owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Reminder {
    /// Owner.
    pub user_id: String,
    /// Id of the inbound message that created it.
    pub reminder_id: String,
    /// Free text to send back when it fires.
    pub content: String,
    /// Local fire time; `None` until the user picks a date.
    pub scheduled_time: Option<NaiveDateTime>,
}

impl Reminder {
    /// Whether a fire time has been attached.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled_time.is_some()
    }

    /// Whether the fire time lies strictly after `now`.
    pub fn is_upcoming(&self, now: NaiveDateTime) -> bool {
        self.scheduled_time.is_some_and(|t| t > now)
    }
}
