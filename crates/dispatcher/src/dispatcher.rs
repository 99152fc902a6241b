//! Conversation state machine.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use database::{reminder, session, ConversationState, Database, DatabaseError, Session, SessionStatus};
use gateway::format::reminder_list;
use gateway::{MessageGateway, OutboundMessage, ReplyContext};
use scheduler::{JobKind, JobScheduler};
use tracing::{debug, error, info, warn};

use crate::commands::Command;
use crate::error::{DispatchError, Result};
use crate::events::InboundEvent;
use crate::replies;

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// The date picker allows dates up to the end of `now.year + horizon`.
    pub picker_horizon_years: i32,
    /// Operator account that receives follow/unfollow notices.
    pub admin_user_id: Option<String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            picker_horizon_years: 1,
            admin_user_id: None,
        }
    }
}

/// Why an event was answered without any state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Date selection outside of `AWAITING_TIME`.
    InvalidAction,
    /// Selected time is not in the future.
    PastTime,
    /// The pending reminder disappeared; the session was reset.
    PendingGone,
    /// Cancel selection matched no reminder.
    NoSuchReminder,
    /// Snooze without a live fired reminder.
    NothingToSnooze,
}

/// What handling an event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Event processed; the user is now in this status.
    Handled(SessionStatus),
    /// Event answered with an explanation.
    Rejected(Rejection),
    /// The user's data was removed.
    Removed,
    /// The message was already processed.
    Duplicate,
}

/// Routes inbound events through the per-user conversation state machine.
///
/// All work for a user runs under that user's lock from the scheduler's
/// [`scheduler::UserLocks`], so scheduler callbacks and events for the same
/// user never interleave.
pub struct Dispatcher {
    database: Database,
    gateway: Arc<dyn MessageGateway>,
    scheduler: JobScheduler,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        database: Database,
        gateway: Arc<dyn MessageGateway>,
        scheduler: JobScheduler,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            database,
            gateway,
            scheduler,
            config,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Handle an event at the current local time.
    pub async fn handle(&self, event: InboundEvent) -> Result<DispatchOutcome> {
        self.handle_at(event, Local::now().naive_local()).await
    }

    /// Handle an event as if it arrived at `now`.
    pub async fn handle_at(&self, event: InboundEvent, now: NaiveDateTime) -> Result<DispatchOutcome> {
        let context = ReplyContext::new(event.user_id(), event.reply_token().map(str::to_string));
        let locks = self.scheduler.locks();

        let result = {
            let _guard = locks.lock(&context.user_id).await;

            debug!("Handling {} event from {}", event.kind(), context.user_id);
            let result = self.dispatch(event, &context, now).await;

            if let Err(DispatchError::RepositoryUnavailable(e)) = &result {
                error!("Aborted event for {}: {}", context.user_id, e);
                self.reply(&context, vec![OutboundMessage::text(replies::TRY_AGAIN)])
                    .await;
            }
            result
        };

        // Only prunes when nothing else is queued on the user's lock
        if matches!(result, Ok(DispatchOutcome::Removed)) && locks.forget(&context.user_id) {
            debug!("Released lock entry for {}", context.user_id);
        }
        result
    }

    async fn dispatch(
        &self,
        event: InboundEvent,
        context: &ReplyContext,
        now: NaiveDateTime,
    ) -> Result<DispatchOutcome> {
        match event {
            InboundEvent::Follow { .. } => self.on_follow(context).await,
            InboundEvent::Unfollow { .. } => self.on_unfollow(&context.user_id).await,
            InboundEvent::DateSelected { time, .. } => {
                self.on_date_selected(context, time, now).await
            }
            InboundEvent::Text {
                message_id, text, ..
            } => self.on_text(context, &message_id, &text, now).await,
        }
    }

    async fn on_text(
        &self,
        context: &ReplyContext,
        message_id: &str,
        text: &str,
        now: NaiveDateTime,
    ) -> Result<DispatchOutcome> {
        let current = session::get_session(self.database.pool(), &context.user_id).await?;
        let status = current.status();
        let command = Command::parse(text);

        match command {
            Some(Command::Help) => {
                self.reply(context, vec![replies::help()]).await;
                return Ok(DispatchOutcome::Handled(status));
            }
            Some(Command::List) => {
                self.list(context, now).await?;
                return Ok(DispatchOutcome::Handled(status));
            }
            _ => {}
        }

        match &current.state {
            ConversationState::Idle => match command {
                Some(Command::CancelList) => self.start_cancel_selection(context, now).await,
                Some(Command::Snooze) => self.snooze(context, &current, message_id, now).await,
                _ => self.capture(context, message_id, text, now).await,
            },
            ConversationState::AwaitingTime { pending_reminder_id } => match command {
                Some(Command::Cancel) => {
                    self.cancel_pending(context, pending_reminder_id).await
                }
                Some(Command::Resend) => {
                    self.reply(context, vec![self.date_picker(now)]).await;
                    Ok(DispatchOutcome::Handled(status))
                }
                _ => {
                    self.reply(context, replies::use_picker()).await;
                    Ok(DispatchOutcome::Handled(status))
                }
            },
            ConversationState::AwaitingCancelSelection => match command {
                Some(Command::Cancel) => {
                    self.set_state(&context.user_id, &ConversationState::Idle).await?;
                    self.reply(context, vec![OutboundMessage::text(replies::CANCELLED)])
                        .await;
                    Ok(DispatchOutcome::Handled(SessionStatus::Idle))
                }
                _ => self.remove_by_content(context, text).await,
            },
        }
    }

    /// Reply with upcoming reminders.
    async fn list(&self, context: &ReplyContext, now: NaiveDateTime) -> Result<()> {
        let text = self
            .upcoming_listing(&context.user_id, now)
            .await?
            .unwrap_or_else(|| replies::NO_REMINDERS.to_string());
        self.reply(context, vec![OutboundMessage::text(text)]).await;
        Ok(())
    }

    async fn upcoming_listing(&self, user_id: &str, now: NaiveDateTime) -> Result<Option<String>> {
        let upcoming = reminder::list_upcoming(self.database.pool(), user_id, now).await?;
        Ok(reminder_list(upcoming.iter().filter_map(|r| {
            r.scheduled_time.map(|time| (time, r.content.as_str()))
        })))
    }

    async fn start_cancel_selection(
        &self,
        context: &ReplyContext,
        now: NaiveDateTime,
    ) -> Result<DispatchOutcome> {
        let Some(listing) = self.upcoming_listing(&context.user_id, now).await? else {
            self.reply(context, vec![OutboundMessage::text(replies::NO_REMINDERS)])
                .await;
            return Ok(DispatchOutcome::Handled(SessionStatus::Idle));
        };

        self.set_state(&context.user_id, &ConversationState::AwaitingCancelSelection)
            .await?;
        self.reply(context, replies::cancel_selection(listing)).await;
        Ok(DispatchOutcome::Handled(SessionStatus::AwaitingCancelSelection))
    }

    /// Store free text as a new reminder and ask for its time.
    async fn capture(
        &self,
        context: &ReplyContext,
        message_id: &str,
        text: &str,
        now: NaiveDateTime,
    ) -> Result<DispatchOutcome> {
        let pool = self.database.pool();
        match reminder::create_reminder(pool, &context.user_id, message_id, text).await {
            Ok(()) => {}
            Err(DatabaseError::AlreadyExists { .. }) => {
                debug!("Message {} from {} already captured", message_id, context.user_id);
                return Ok(DispatchOutcome::Duplicate);
            }
            Err(e) => return Err(e.into()),
        }

        self.set_state(&context.user_id, &ConversationState::awaiting_time(message_id))
            .await?;
        self.reply(context, vec![self.date_picker(now)]).await;
        Ok(DispatchOutcome::Handled(SessionStatus::AwaitingTime))
    }

    async fn cancel_pending(
        &self,
        context: &ReplyContext,
        pending_reminder_id: &str,
    ) -> Result<DispatchOutcome> {
        reminder::delete_reminder(self.database.pool(), &context.user_id, pending_reminder_id)
            .await?;
        self.set_state(&context.user_id, &ConversationState::Idle).await?;
        self.reply(context, vec![OutboundMessage::text(replies::CANCELLED)])
            .await;
        Ok(DispatchOutcome::Handled(SessionStatus::Idle))
    }

    async fn remove_by_content(&self, context: &ReplyContext, content: &str) -> Result<DispatchOutcome> {
        let user_id = &context.user_id;
        let removed =
            reminder::delete_reminders_by_content(self.database.pool(), user_id, content).await?;

        if removed.is_empty() {
            self.reply(context, vec![replies::no_such_reminder()]).await;
            return Ok(DispatchOutcome::Rejected(Rejection::NoSuchReminder));
        }

        for reminder_id in &removed {
            self.scheduler.cancel(user_id, reminder_id, JobKind::Fire);
            self.scheduler.cancel(user_id, reminder_id, JobKind::Expire);
        }
        self.set_state(user_id, &ConversationState::Idle).await?;

        info!("Removed {} reminders for {}", removed.len(), user_id);
        self.reply(context, vec![OutboundMessage::text(replies::REMOVED)])
            .await;
        Ok(DispatchOutcome::Handled(SessionStatus::Idle))
    }

    async fn on_date_selected(
        &self,
        context: &ReplyContext,
        time: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<DispatchOutcome> {
        let user_id = &context.user_id;
        let current = session::get_session(self.database.pool(), user_id).await?;

        let pending_reminder_id = match current.state {
            ConversationState::AwaitingTime { pending_reminder_id } => pending_reminder_id,
            other => {
                debug!("Stale date selection from {} in {}", user_id, other.status());
                self.reply(context, vec![OutboundMessage::text(replies::INVALID_ACTION)])
                    .await;
                return Ok(DispatchOutcome::Rejected(Rejection::InvalidAction));
            }
        };

        if time <= now {
            self.reply(
                context,
                vec![OutboundMessage::text(replies::PAST_TIME), self.date_picker(now)],
            )
            .await;
            return Ok(DispatchOutcome::Rejected(Rejection::PastTime));
        }

        match reminder::set_reminder_time(self.database.pool(), user_id, &pending_reminder_id, time)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!("Pending reminder {} of {} is gone; resetting", pending_reminder_id, user_id);
                self.set_state(user_id, &ConversationState::Idle).await?;
                self.reply(context, vec![OutboundMessage::text(replies::PENDING_GONE)])
                    .await;
                return Ok(DispatchOutcome::Rejected(Rejection::PendingGone));
            }
            Err(e) => return Err(e.into()),
        }

        self.set_state(user_id, &ConversationState::Idle).await?;
        self.scheduler
            .schedule(user_id, &pending_reminder_id, time - now, JobKind::Fire);

        info!("Scheduled reminder {} for {} at {}", pending_reminder_id, user_id, time);
        self.reply(context, vec![OutboundMessage::text(replies::scheduled(time))])
            .await;
        Ok(DispatchOutcome::Handled(SessionStatus::Idle))
    }

    /// Re-create the last fired reminder under the snooze message's id.
    async fn snooze(
        &self,
        context: &ReplyContext,
        current: &Session,
        message_id: &str,
        now: NaiveDateTime,
    ) -> Result<DispatchOutcome> {
        let user_id = &context.user_id;
        let pool = self.database.pool();

        let Some(last_fired) = current.last_fired_reminder_id.as_deref() else {
            self.reply(context, vec![OutboundMessage::text(replies::NOTHING_TO_SNOOZE)])
                .await;
            return Ok(DispatchOutcome::Rejected(Rejection::NothingToSnooze));
        };
        let Some(fired) = reminder::get_reminder(pool, user_id, last_fired).await? else {
            self.reply(context, vec![OutboundMessage::text(replies::SNOOZE_EXPIRED)])
                .await;
            return Ok(DispatchOutcome::Rejected(Rejection::NothingToSnooze));
        };

        self.scheduler.cancel(user_id, last_fired, JobKind::Expire);
        reminder::delete_reminder(pool, user_id, last_fired).await?;
        reminder::create_reminder(pool, user_id, message_id, &fired.content).await?;
        self.set_state(user_id, &ConversationState::awaiting_time(message_id))
            .await?;

        info!("Snoozed reminder {} of {} as {}", last_fired, user_id, message_id);
        self.reply(
            context,
            vec![
                OutboundMessage::text(replies::snoozed(&fired.content)),
                self.date_picker(now),
            ],
        )
        .await;
        Ok(DispatchOutcome::Handled(SessionStatus::AwaitingTime))
    }

    async fn on_follow(&self, context: &ReplyContext) -> Result<DispatchOutcome> {
        let user_id = &context.user_id;
        let pool = self.database.pool();

        if session::create_session_if_absent(pool, user_id).await? {
            info!("New follower {}", user_id);
        }
        let status = session::get_session(pool, user_id).await?.status();

        self.reply(context, replies::welcome()).await;
        self.notify_operator(&replies::user_followed(user_id)).await;
        Ok(DispatchOutcome::Handled(status))
    }

    async fn on_unfollow(&self, user_id: &str) -> Result<DispatchOutcome> {
        let pool = self.database.pool();

        let reminders = reminder::delete_user_reminders(pool, user_id).await?;
        session::delete_session(pool, user_id).await?;
        let jobs = self.scheduler.cancel_user(user_id);

        info!(
            "Removed {} after unfollow ({} reminders, {} jobs)",
            user_id, reminders, jobs
        );
        self.notify_operator(&replies::user_unfollowed(user_id)).await;
        Ok(DispatchOutcome::Removed)
    }

    /// Push a notice to the operator account, if one is configured.
    pub async fn notify_operator(&self, text: &str) {
        let Some(admin) = &self.config.admin_user_id else {
            return;
        };
        if let Err(e) = self.gateway.push_text(admin, text).await {
            warn!("Failed to notify operator: {}", e);
        }
    }

    fn date_picker(&self, now: NaiveDateTime) -> OutboundMessage {
        replies::date_picker(now, self.config.picker_horizon_years)
    }

    async fn set_state(&self, user_id: &str, state: &ConversationState) -> Result<()> {
        session::set_state(self.database.pool(), user_id, state).await?;
        debug!("{} -> {}", user_id, state.status());
        Ok(())
    }

    async fn reply(&self, context: &ReplyContext, messages: Vec<OutboundMessage>) {
        if let Err(e) = self.gateway.reply(context, &messages).await {
            warn!("Failed to reply to {}: {}", context.user_id, e);
        }
    }
}
