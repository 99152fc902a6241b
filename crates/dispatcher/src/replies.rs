//! Reply texts and prompt builders.

use chrono::NaiveDateTime;
use gateway::format::{display_time, picker_bounds};
use gateway::OutboundMessage;

use crate::commands::Command;

/// Usage text for the help command.
pub const HELP_TEXT: &str = r#"Tell me what you'd like to be reminded about, then pick a date and time.

Commands:
• "list" (一覧) - Show upcoming reminders
• "cancel-list" (取り消し) - Remove a reminder
• "snooze" (スヌーズ) - Set the last reminder again
• "help" (使い方) - Show this message"#;

pub const WELCOME: &str = "Thanks for adding me! This bot is a demo, so please don't register personal information.";
pub const WELCOME_HELP: &str = "Send \"help\" to see how to use it.";

pub const NO_REMINDERS: &str = "You have no reminders.";
pub const CANCEL_PROMPT: &str = "Which reminder should be removed? Send its content.";
pub const SAME_CONTENT_NOTE: &str = "Every reminder with the same content will be removed.";
pub const CANCEL_HINT: &str = "Press \"cancel\" to stop.";
pub const NO_SUCH_REMINDER: &str = "There is no such reminder.\nPress \"cancel\" to stop.";
pub const REMOVED: &str = "Reminder removed!";
pub const CANCELLED: &str = "Cancelled.";

pub const PICKER_LABEL: &str = "Pick a reminder date and time";
pub const USE_PICKER: &str = "Please choose the reminder time with the date picker.";
pub const RESEND_OR_CANCEL: &str = "Press \"resend\" to get the picker again, or \"cancel\" to stop.";
pub const INVALID_ACTION: &str = "That date selection is no longer valid.";
pub const PAST_TIME: &str = "That time has already passed. Please pick a time in the future.";
pub const PENDING_GONE: &str = "That reminder no longer exists. Please send it again.";

pub const NOTHING_TO_SNOOZE: &str = "There is no recent reminder to snooze.";
pub const SNOOZE_EXPIRED: &str = "The last reminder has expired and can no longer be snoozed.";

pub const TRY_AGAIN: &str = "Something went wrong on our side. Please try again in a moment.";

pub const SERVICE_STARTED: &str = "Reminder service started.";

/// Confirmation after a time was picked.
pub fn scheduled(time: NaiveDateTime) -> String {
    format!("Reminder set!\nI'll remind you at {}.", display_time(time))
}

/// Confirmation after a snooze.
pub fn snoozed(content: &str) -> String {
    format!("Snoozed 「{}」.", content)
}

pub fn user_followed(user_id: &str) -> String {
    format!("User {} followed the bot.", user_id)
}

pub fn user_unfollowed(user_id: &str) -> String {
    format!("User {} unfollowed the bot.", user_id)
}

/// Date picker prompt with a cancel quick action.
pub fn date_picker(now: NaiveDateTime, horizon_years: i32) -> OutboundMessage {
    OutboundMessage::date_picker(PICKER_LABEL, picker_bounds(now, horizon_years))
        .with_quick_actions([Command::Cancel.quick_action()])
}

pub fn help() -> OutboundMessage {
    OutboundMessage::text(HELP_TEXT).with_quick_actions([
        Command::List.quick_action(),
        Command::CancelList.quick_action(),
        Command::Snooze.quick_action(),
    ])
}

pub fn welcome() -> Vec<OutboundMessage> {
    vec![
        OutboundMessage::text(WELCOME),
        OutboundMessage::text(WELCOME_HELP).with_quick_actions([Command::Help.quick_action()]),
    ]
}

/// Guidance while a time is awaited.
pub fn use_picker() -> Vec<OutboundMessage> {
    vec![
        OutboundMessage::text(USE_PICKER),
        OutboundMessage::text(RESEND_OR_CANCEL).with_quick_actions([
            Command::Cancel.quick_action(),
            Command::Resend.quick_action(),
        ]),
    ]
}

/// Listing plus the removal prompt.
pub fn cancel_selection(listing: String) -> Vec<OutboundMessage> {
    vec![
        OutboundMessage::text(listing),
        OutboundMessage::text(CANCEL_PROMPT),
        OutboundMessage::text(SAME_CONTENT_NOTE),
        OutboundMessage::text(CANCEL_HINT).with_quick_actions([Command::Cancel.quick_action()]),
    ]
}

pub fn no_such_reminder() -> OutboundMessage {
    OutboundMessage::text(NO_SUCH_REMINDER).with_quick_actions([Command::Cancel.quick_action()])
}
