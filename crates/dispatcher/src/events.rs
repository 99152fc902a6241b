//! Inbound events.
//!
//! [`RawEvent`] is the wire record delivered by the transport; it is
//! validated into an [`InboundEvent`] before dispatch.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

/// Wire format of the transport's datetime picker.
const POSTBACK_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Date selection carried by a postback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Postback {
    /// Individual fields.
    Fields {
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
    },
    /// Picker string, e.g. `2025-01-01T09:00`.
    Datetime { datetime: String },
}

impl Postback {
    /// The selected local time.
    pub fn to_datetime(&self) -> Result<NaiveDateTime> {
        match self {
            Self::Fields {
                year,
                month,
                day,
                hour,
                minute,
            } => NaiveDate::from_ymd_opt(*year, *month, *day)
                .and_then(|date| date.and_hms_opt(*hour, *minute, 0))
                .ok_or_else(|| {
                    DispatchError::MalformedEvent(format!(
                        "invalid date {}-{}-{} {}:{}",
                        year, month, day, hour, minute
                    ))
                }),
            Self::Datetime { datetime } => POSTBACK_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(datetime, format).ok())
                .ok_or_else(|| {
                    DispatchError::MalformedEvent(format!("invalid datetime '{}'", datetime))
                }),
        }
    }
}

/// An event record as delivered by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// `message`, `follow`, `unfollow` or `postback`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub postback: Option<Postback>,
}

impl RawEvent {
    /// Validate into an [`InboundEvent`].
    ///
    /// Returns `Ok(None)` for event types the bot does not handle.
    pub fn into_event(self) -> Result<Option<InboundEvent>> {
        let kind = self.kind.as_str();
        if !matches!(kind, "message" | "follow" | "unfollow" | "postback") {
            return Ok(None);
        }

        let user_id = self
            .user_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DispatchError::MalformedEvent(format!("{} event without user_id", kind)))?;
        let reply_token = self.reply_token;

        let event = match kind {
            "message" => {
                let message_id = self.message_id.ok_or_else(|| {
                    DispatchError::MalformedEvent("message event without message_id".into())
                })?;
                let text = self.text.ok_or_else(|| {
                    DispatchError::MalformedEvent("message event without text".into())
                })?;
                InboundEvent::Text {
                    user_id,
                    message_id,
                    text,
                    reply_token,
                }
            }
            "follow" => InboundEvent::Follow {
                user_id,
                reply_token,
            },
            "unfollow" => InboundEvent::Unfollow {
                user_id,
                reply_token,
            },
            _ => {
                let postback = self.postback.ok_or_else(|| {
                    DispatchError::MalformedEvent("postback event without payload".into())
                })?;
                InboundEvent::DateSelected {
                    user_id,
                    time: postback.to_datetime()?,
                    reply_token,
                }
            }
        };

        Ok(Some(event))
    }
}

/// One record or a batch, as accepted by the event feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventBatch {
    Many { events: Vec<RawEvent> },
    One(RawEvent),
}

impl EventBatch {
    pub fn into_events(self) -> Vec<RawEvent> {
        match self {
            Self::Many { events } => events,
            Self::One(event) => vec![event],
        }
    }
}

/// A validated event driving the conversation state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Text {
        user_id: String,
        message_id: String,
        text: String,
        reply_token: Option<String>,
    },
    Follow {
        user_id: String,
        reply_token: Option<String>,
    },
    Unfollow {
        user_id: String,
        reply_token: Option<String>,
    },
    DateSelected {
        user_id: String,
        time: NaiveDateTime,
        reply_token: Option<String>,
    },
}

impl InboundEvent {
    pub fn text(user_id: &str, message_id: &str, text: &str) -> Self {
        Self::Text {
            user_id: user_id.to_string(),
            message_id: message_id.to_string(),
            text: text.to_string(),
            reply_token: None,
        }
    }

    pub fn follow(user_id: &str) -> Self {
        Self::Follow {
            user_id: user_id.to_string(),
            reply_token: None,
        }
    }

    pub fn unfollow(user_id: &str) -> Self {
        Self::Unfollow {
            user_id: user_id.to_string(),
            reply_token: None,
        }
    }

    pub fn date_selected(user_id: &str, time: NaiveDateTime) -> Self {
        Self::DateSelected {
            user_id: user_id.to_string(),
            time,
            reply_token: None,
        }
    }

    /// User the event belongs to.
    pub fn user_id(&self) -> &str {
        match self {
            Self::Text { user_id, .. }
            | Self::Follow { user_id, .. }
            | Self::Unfollow { user_id, .. }
            | Self::DateSelected { user_id, .. } => user_id,
        }
    }

    /// Transport reply token, if any.
    pub fn reply_token(&self) -> Option<&str> {
        match self {
            Self::Text { reply_token, .. }
            | Self::Follow { reply_token, .. }
            | Self::Unfollow { reply_token, .. }
            | Self::DateSelected { reply_token, .. } => reply_token.as_deref(),
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Follow { .. } => "follow",
            Self::Unfollow { .. } => "unfollow",
            Self::DateSelected { .. } => "date_selected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<Option<InboundEvent>> {
        serde_json::from_value::<RawEvent>(value).unwrap().into_event()
    }

    #[test]
    fn test_message_event() {
        let event = parse(json!({
            "type": "message",
            "user_id": "U1",
            "message_id": "m1",
            "text": "buy milk",
            "reply_token": "rt"
        }))
        .unwrap()
        .unwrap();

        assert_eq!(
            event,
            InboundEvent::Text {
                user_id: "U1".into(),
                message_id: "m1".into(),
                text: "buy milk".into(),
                reply_token: Some("rt".into()),
            }
        );
        assert_eq!(event.reply_token(), Some("rt"));
    }

    #[test]
    fn test_postback_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();

        let from_string = parse(json!({
            "type": "postback",
            "user_id": "U1",
            "postback": {"datetime": "2025-01-01T09:00"}
        }))
        .unwrap()
        .unwrap();
        assert_eq!(from_string, InboundEvent::date_selected("U1", expected));

        let from_fields = parse(json!({
            "type": "postback",
            "user_id": "U1",
            "postback": {"year": 2025, "month": 1, "day": 1, "hour": 9, "minute": 0}
        }))
        .unwrap()
        .unwrap();
        assert_eq!(from_fields, InboundEvent::date_selected("U1", expected));
    }

    #[test]
    fn test_invalid_postback_is_malformed() {
        let result = parse(json!({
            "type": "postback",
            "user_id": "U1",
            "postback": {"year": 2025, "month": 2, "day": 30, "hour": 9, "minute": 0}
        }));
        assert!(matches!(result, Err(DispatchError::MalformedEvent(_))));

        let result = parse(json!({
            "type": "postback",
            "user_id": "U1",
            "postback": {"datetime": "tomorrow"}
        }));
        assert!(matches!(result, Err(DispatchError::MalformedEvent(_))));
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        assert!(parse(json!({"type": "follow"})).is_err());
        assert!(parse(json!({"type": "message", "user_id": "U1", "text": "x"})).is_err());
        assert!(parse(json!({"type": "message", "user_id": "U1", "message_id": "m1"})).is_err());
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        assert_eq!(parse(json!({"type": "beacon", "user_id": "U1"})).unwrap(), None);
    }

    #[test]
    fn test_batch_shapes() {
        let one: EventBatch =
            serde_json::from_value(json!({"type": "follow", "user_id": "U1"})).unwrap();
        assert_eq!(one.into_events().len(), 1);

        let many: EventBatch = serde_json::from_value(json!({
            "events": [
                {"type": "follow", "user_id": "U1"},
                {"type": "unfollow", "user_id": "U2"}
            ]
        }))
        .unwrap();
        let events = many.into_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, "unfollow");
    }
}
