//! Outbound message types.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A suggested reply the user can tap instead of typing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickAction {
    /// Button label.
    pub label: String,
    /// Text sent back as the user's message when tapped.
    pub text: String,
}

impl QuickAction {
    /// Create an action whose label and text differ.
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }

    /// Create an action that sends its own label.
    pub fn echo(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            text: label.clone(),
            label,
        }
    }
}

/// Selectable range of a date picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickerBounds {
    /// Earliest selectable time.
    pub min: NaiveDateTime,
    /// Latest selectable time.
    pub max: NaiveDateTime,
    /// Preselected time.
    pub initial: NaiveDateTime,
}

/// A message sent to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Plain text.
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        quick_actions: Vec<QuickAction>,
    },
    /// Structured date-time picker; the selection comes back as a postback.
    DatePicker {
        label: String,
        bounds: PickerBounds,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        quick_actions: Vec<QuickAction>,
    },
}

impl OutboundMessage {
    /// Plain text message without quick actions.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            quick_actions: Vec::new(),
        }
    }

    /// Date picker without quick actions.
    pub fn date_picker(label: impl Into<String>, bounds: PickerBounds) -> Self {
        Self::DatePicker {
            label: label.into(),
            bounds,
            quick_actions: Vec::new(),
        }
    }

    /// Attach quick actions, replacing any already present.
    pub fn with_quick_actions(mut self, actions: impl IntoIterator<Item = QuickAction>) -> Self {
        let actions = actions.into_iter().collect();
        match &mut self {
            Self::Text { quick_actions, .. } | Self::DatePicker { quick_actions, .. } => {
                *quick_actions = actions;
            }
        }
        self
    }

    /// Human-readable body: the text, or the picker label.
    pub fn body(&self) -> &str {
        match self {
            Self::Text { text, .. } => text,
            Self::DatePicker { label, .. } => label,
        }
    }

    /// Quick actions offered with this message.
    pub fn quick_actions(&self) -> &[QuickAction] {
        match self {
            Self::Text { quick_actions, .. } | Self::DatePicker { quick_actions, .. } => {
                quick_actions
            }
        }
    }

    /// Whether this is a date picker prompt.
    pub fn is_date_picker(&self) -> bool {
        matches!(self, Self::DatePicker { .. })
    }
}

/// Where a reply goes: the triggering user plus the transport's reply token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyContext {
    /// User that triggered the event.
    pub user_id: String,
    /// Token tying the reply to the inbound event, if the transport issued one.
    pub reply_token: Option<String>,
}

impl ReplyContext {
    /// Create a reply context.
    pub fn new(user_id: impl Into<String>, reply_token: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            reply_token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bounds() -> PickerBounds {
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        PickerBounds {
            min: day.and_hms_opt(8, 12, 0).unwrap(),
            max: NaiveDate::from_ymd_opt(2026, 12, 31)
                .unwrap()
                .and_hms_opt(23, 59, 0)
                .unwrap(),
            initial: day.and_hms_opt(9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_text_serializes_without_empty_actions() {
        let json = serde_json::to_value(OutboundMessage::text("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "text", "text": "hi"}));
    }

    #[test]
    fn test_date_picker_serialization() {
        let message = OutboundMessage::date_picker("Pick a time", bounds())
            .with_quick_actions([QuickAction::echo("cancel")]);
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["type"], "date_picker");
        assert_eq!(json["bounds"]["initial"], "2025-01-01T09:00:00");
        assert_eq!(json["quick_actions"][0]["text"], "cancel");

        let back: OutboundMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, message);
    }

    #[test]
    fn test_accessors() {
        let message =
            OutboundMessage::text("body").with_quick_actions([QuickAction::new("Go", "go")]);
        assert_eq!(message.body(), "body");
        assert_eq!(message.quick_actions()[0].label, "Go");
        assert!(!message.is_date_picker());
        assert!(OutboundMessage::date_picker("x", bounds()).is_date_picker());
    }
}
