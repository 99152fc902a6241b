//! Job registry and callbacks.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{Local, NaiveDateTime, TimeDelta};
use database::{reminder, session, Database};
use futures::future::join_all;
use gateway::format::reminder_due;
use gateway::{MessageGateway, OutboundMessage, QuickAction};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::locks::UserLocks;

/// Longest wait a job can be registered with.
const MAX_WAIT: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// What happens when a job comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Notify the user, then start the grace window.
    Fire,
    /// Delete the reminder row.
    Expire,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fire => write!(f, "fire"),
            Self::Expire => write!(f, "expire"),
        }
    }
}

/// Result of [`JobScheduler::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// The job was registered as requested.
    Scheduled,
    /// The fire time had already passed; the reminder is queued for deletion.
    Discarded,
}

/// Counts from a startup rehydration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RehydrationReport {
    /// Future reminders re-armed.
    pub scheduled: usize,
    /// Past-due reminders deleted without firing.
    pub discarded: usize,
}

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How long a fired reminder stays snoozable before it is deleted.
    pub grace_period: Duration,
    /// Polling granularity of the background loop.
    pub tick: Duration,
    /// Quick actions attached to the fire notification.
    pub fire_quick_actions: Vec<QuickAction>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(24 * 60 * 60),
            tick: Duration::from_secs(1),
            fire_quick_actions: Vec::new(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_fire_quick_actions(mut self, actions: Vec<QuickAction>) -> Self {
        self.fire_quick_actions = actions;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct JobKey {
    user_id: String,
    reminder_id: String,
}

#[derive(Debug, Clone, Copy)]
struct Job {
    kind: JobKind,
    due: Instant,
}

struct Inner {
    database: Database,
    gateway: Arc<dyn MessageGateway>,
    locks: UserLocks,
    config: SchedulerConfig,
    jobs: Mutex<HashMap<JobKey, Job>>,
}

/// Timer registry keyed by `(user, reminder)`, at most one job per key.
///
/// Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct JobScheduler {
    inner: Arc<Inner>,
}

impl JobScheduler {
    pub fn new(
        database: Database,
        gateway: Arc<dyn MessageGateway>,
        locks: UserLocks,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                database,
                gateway,
                locks,
                config,
                jobs: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The lock registry shared with the dispatcher.
    pub fn locks(&self) -> &UserLocks {
        &self.inner.locks
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Register a job `delay` from now, replacing any job for the key.
    ///
    /// A `Fire` job whose delay is not positive is never fired late: an
    /// immediate `Expire` is registered instead and `Discarded` is returned.
    pub fn schedule(
        &self,
        user_id: &str,
        reminder_id: &str,
        delay: TimeDelta,
        kind: JobKind,
    ) -> ScheduleOutcome {
        if delay <= TimeDelta::zero() {
            self.register(user_id, reminder_id, Duration::ZERO, JobKind::Expire);
            if kind == JobKind::Fire {
                debug!(
                    "Reminder {}/{} is past due; queued for deletion",
                    user_id, reminder_id
                );
                return ScheduleOutcome::Discarded;
            }
            return ScheduleOutcome::Scheduled;
        }

        let wait = delay.to_std().unwrap_or(Duration::ZERO);
        self.register(user_id, reminder_id, wait, kind);
        ScheduleOutcome::Scheduled
    }

    fn register(&self, user_id: &str, reminder_id: &str, wait: Duration, kind: JobKind) {
        let now = Instant::now();
        let due = now
            .checked_add(wait.min(MAX_WAIT))
            .unwrap_or(now + MAX_WAIT);
        let key = JobKey {
            user_id: user_id.to_string(),
            reminder_id: reminder_id.to_string(),
        };

        debug!("Scheduled {} for {}/{} in {:?}", kind, user_id, reminder_id, wait);
        self.jobs().insert(key, Job { kind, due });
    }

    /// Remove the job for a key if it is of `kind`. Returns true if removed.
    pub fn cancel(&self, user_id: &str, reminder_id: &str, kind: JobKind) -> bool {
        let key = JobKey {
            user_id: user_id.to_string(),
            reminder_id: reminder_id.to_string(),
        };
        let mut jobs = self.jobs();
        match jobs.get(&key) {
            Some(job) if job.kind == kind => {
                jobs.remove(&key);
                debug!("Cancelled {} for {}/{}", kind, user_id, reminder_id);
                true
            }
            _ => false,
        }
    }

    /// Remove every job of a user. Returns how many were dropped.
    pub fn cancel_user(&self, user_id: &str) -> usize {
        let mut jobs = self.jobs();
        let before = jobs.len();
        jobs.retain(|key, _| key.user_id != user_id);
        before - jobs.len()
    }

    /// Kind of the job registered for a key, if any.
    pub fn pending(&self, user_id: &str, reminder_id: &str) -> Option<JobKind> {
        let key = JobKey {
            user_id: user_id.to_string(),
            reminder_id: reminder_id.to_string(),
        };
        self.jobs().get(&key).map(|job| job.kind)
    }

    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<JobKey, Job>> {
        self.inner.jobs.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Notify the user that a reminder is due and start its grace window.
    ///
    /// The session and the expire job are committed under the user's lock;
    /// the notification is pushed after the lock is released.
    ///
    /// Returns false when the reminder no longer exists.
    pub async fn on_fire(&self, user_id: &str, reminder_id: &str) -> Result<bool> {
        let content = {
            let _guard = self.inner.locks.lock(user_id).await;
            let pool = self.inner.database.pool();

            let Some(found) = reminder::get_reminder(pool, user_id, reminder_id).await? else {
                debug!("Reminder {}/{} is gone; nothing to fire", user_id, reminder_id);
                return Ok(false);
            };

            session::set_last_fired(pool, user_id, reminder_id).await?;
            self.register(
                user_id,
                reminder_id,
                self.inner.config.grace_period,
                JobKind::Expire,
            );
            found.content
        };

        let notification = OutboundMessage::text(reminder_due(&content))
            .with_quick_actions(self.inner.config.fire_quick_actions.clone());
        if let Err(e) = self.inner.gateway.push(user_id, &[notification]).await {
            warn!("Failed to deliver reminder {}/{}: {}", user_id, reminder_id, e);
        }

        info!("Fired reminder {}/{}", user_id, reminder_id);
        Ok(true)
    }

    /// Delete a reminder row. Returns true if a row was removed.
    pub async fn on_expire(&self, user_id: &str, reminder_id: &str) -> Result<bool> {
        let _guard = self.inner.locks.lock(user_id).await;

        let deleted =
            reminder::delete_reminder(self.inner.database.pool(), user_id, reminder_id).await?;
        if deleted {
            debug!("Expired reminder {}/{}", user_id, reminder_id);
        }
        Ok(deleted)
    }

    /// Re-arm persisted reminders after a restart.
    pub async fn rehydrate(&self) -> Result<RehydrationReport> {
        self.rehydrate_at(Local::now().naive_local()).await
    }

    /// Re-arm persisted reminders relative to `now`.
    ///
    /// Future reminders get a `Fire` job; past ones are deleted without firing.
    pub async fn rehydrate_at(&self, now: NaiveDateTime) -> Result<RehydrationReport> {
        let pool = self.inner.database.pool();
        let mut report = RehydrationReport::default();

        for row in reminder::list_all_scheduled(pool).await? {
            let Some(time) = row.scheduled_time else {
                continue;
            };

            let delay = time - now;
            if delay > TimeDelta::zero() {
                self.schedule(&row.user_id, &row.reminder_id, delay, JobKind::Fire);
                report.scheduled += 1;
            } else {
                let _guard = self.inner.locks.lock(&row.user_id).await;
                reminder::delete_reminder(pool, &row.user_id, &row.reminder_id).await?;
                report.discarded += 1;
            }
        }

        info!(
            "Rehydrated scheduler: {} scheduled, {} discarded",
            report.scheduled, report.discarded
        );
        Ok(report)
    }

    /// Run every job due at `now`. Returns how many ran.
    ///
    /// Due jobs are removed from the registry before their callbacks run, and
    /// callbacks run concurrently.
    pub async fn run_due(&self, now: Instant) -> usize {
        let due: Vec<(JobKey, JobKind)> = {
            let mut jobs = self.jobs();
            let keys: Vec<JobKey> = jobs
                .iter()
                .filter(|(_, job)| job.due <= now)
                .map(|(key, _)| key.clone())
                .collect();
            keys.into_iter()
                .filter_map(|key| jobs.remove(&key).map(|job| (key, job.kind)))
                .collect()
        };

        let count = due.len();
        join_all(due.into_iter().map(|(key, kind)| self.run_job(key, kind))).await;
        count
    }

    async fn run_job(&self, key: JobKey, kind: JobKind) {
        let result = match kind {
            JobKind::Fire => self.on_fire(&key.user_id, &key.reminder_id).await,
            JobKind::Expire => self.on_expire(&key.user_id, &key.reminder_id).await,
        };
        if let Err(e) = result {
            warn!(
                "{} job for {}/{} failed: {}",
                kind, key.user_id, key.reminder_id, e
            );
        }
    }

    /// Drive the registry until `shutdown` resolves.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let mut ticker = tokio::time::interval(self.inner.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);

        info!("Scheduler running (tick {:?})", self.inner.config.tick);
        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!("Scheduler stopping with {} pending jobs", self.len());
                    return;
                }

                _ = ticker.tick() => {
                    self.run_due(Instant::now()).await;
                }
            }
        }
    }

    /// Start the background loop on the current runtime.
    pub fn spawn(&self) -> SchedulerHandle {
        let (stop, stopped) = oneshot::channel::<()>();
        let scheduler = self.clone();
        let task = tokio::spawn(async move {
            scheduler
                .run_until(async {
                    let _ = stopped.await;
                })
                .await;
        });
        SchedulerHandle { stop, task }
    }
}

/// Handle to a spawned scheduler loop.
pub struct SchedulerHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the loop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.task.await {
            warn!("Scheduler task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gateway::{GatewayError, RecordingGateway, ReplyContext};

    async fn setup() -> (JobScheduler, Database, RecordingGateway) {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let gateway = RecordingGateway::new();
        let config = SchedulerConfig::default()
            .with_fire_quick_actions(vec![QuickAction::echo("snooze")]);
        let scheduler =
            JobScheduler::new(db.clone(), Arc::new(gateway.clone()), UserLocks::new(), config);
        (scheduler, db, gateway)
    }

    async fn seed(db: &Database, user: &str, id: &str, content: &str, at: Option<NaiveDateTime>) {
        reminder::create_reminder(db.pool(), user, id, content)
            .await
            .unwrap();
        if let Some(at) = at {
            reminder::set_reminder_time(db.pool(), user, id, at)
                .await
                .unwrap();
        }
    }

    fn later(secs: u64) -> Instant {
        Instant::now() + Duration::from_secs(secs)
    }

    #[tokio::test]
    async fn test_fire_notifies_and_starts_grace() {
        let (scheduler, db, gateway) = setup().await;
        seed(&db, "U1", "m1", "buy milk", None).await;

        let outcome = scheduler.schedule("U1", "m1", TimeDelta::minutes(5), JobKind::Fire);
        assert_eq!(outcome, ScheduleOutcome::Scheduled);
        assert_eq!(scheduler.pending("U1", "m1"), Some(JobKind::Fire));

        // Not due yet
        assert_eq!(scheduler.run_due(Instant::now()).await, 0);
        assert!(gateway.deliveries().is_empty());

        assert_eq!(scheduler.run_due(later(301)).await, 1);

        let pushed = gateway.pushes_to("U1");
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].body(), "It's time: 「buy milk」");
        assert_eq!(pushed[0].quick_actions()[0].text, "snooze");

        let fetched = session::get_session(db.pool(), "U1").await.unwrap();
        assert_eq!(fetched.last_fired_reminder_id.as_deref(), Some("m1"));
        assert_eq!(scheduler.pending("U1", "m1"), Some(JobKind::Expire));

        // Row survives the grace window start, then expires
        assert!(reminder::get_reminder(db.pool(), "U1", "m1")
            .await
            .unwrap()
            .is_some());
        assert_eq!(scheduler.run_due(later(24 * 60 * 60 + 1)).await, 1);
        assert!(reminder::get_reminder(db.pool(), "U1", "m1")
            .await
            .unwrap()
            .is_none());
        assert!(scheduler.is_empty());
    }

    #[tokio::test]
    async fn test_past_due_fire_is_discarded() {
        let (scheduler, db, gateway) = setup().await;
        seed(&db, "U1", "m1", "too late", None).await;

        let outcome = scheduler.schedule("U1", "m1", TimeDelta::seconds(-10), JobKind::Fire);
        assert_eq!(outcome, ScheduleOutcome::Discarded);
        assert_eq!(scheduler.pending("U1", "m1"), Some(JobKind::Expire));

        scheduler.run_due(Instant::now()).await;
        assert!(gateway.deliveries().is_empty());
        assert!(reminder::get_reminder(db.pool(), "U1", "m1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_cancel_matches_kind() {
        let (scheduler, _db, _gateway) = setup().await;

        scheduler.schedule("U1", "m1", TimeDelta::hours(1), JobKind::Fire);
        assert!(!scheduler.cancel("U1", "m1", JobKind::Expire));
        assert_eq!(scheduler.pending("U1", "m1"), Some(JobKind::Fire));

        assert!(scheduler.cancel("U1", "m1", JobKind::Fire));
        assert!(!scheduler.cancel("U1", "m1", JobKind::Fire));
        assert_eq!(scheduler.pending("U1", "m1"), None);
    }

    #[tokio::test]
    async fn test_schedule_replaces_existing_job() {
        let (scheduler, _db, _gateway) = setup().await;

        scheduler.schedule("U1", "m1", TimeDelta::hours(1), JobKind::Fire);
        scheduler.schedule("U1", "m1", TimeDelta::hours(2), JobKind::Expire);

        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.pending("U1", "m1"), Some(JobKind::Expire));
    }

    #[tokio::test]
    async fn test_fire_for_missing_row_is_noop() {
        let (scheduler, db, gateway) = setup().await;

        assert!(!scheduler.on_fire("U1", "ghost").await.unwrap());
        assert!(gateway.deliveries().is_empty());
        assert!(scheduler.is_empty());

        let fetched = session::get_session(db.pool(), "U1").await.unwrap();
        assert!(fetched.last_fired_reminder_id.is_none());
    }

    #[tokio::test]
    async fn test_expire_is_idempotent() {
        let (scheduler, db, _gateway) = setup().await;
        seed(&db, "U1", "m1", "x", None).await;

        assert!(scheduler.on_expire("U1", "m1").await.unwrap());
        assert!(!scheduler.on_expire("U1", "m1").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_push_still_starts_grace() {
        let (scheduler, db, gateway) = setup().await;
        seed(&db, "U1", "m1", "x", None).await;
        gateway.set_failing(true);

        assert!(scheduler.on_fire("U1", "m1").await.unwrap());
        assert_eq!(scheduler.pending("U1", "m1"), Some(JobKind::Expire));
    }

    /// Records whether the user's lock was free while a push was in flight.
    struct LockCheckingGateway {
        locks: UserLocks,
        free_during_push: Arc<Mutex<Vec<bool>>>,
    }

    #[async_trait]
    impl MessageGateway for LockCheckingGateway {
        async fn reply(
            &self,
            _context: &ReplyContext,
            _messages: &[OutboundMessage],
        ) -> std::result::Result<(), GatewayError> {
            Ok(())
        }

        async fn push(
            &self,
            user_id: &str,
            _messages: &[OutboundMessage],
        ) -> std::result::Result<(), GatewayError> {
            let free = tokio::time::timeout(Duration::from_millis(50), self.locks.lock(user_id))
                .await
                .is_ok();
            self.free_during_push.lock().unwrap().push(free);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_fire_pushes_outside_user_lock() {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        seed(&db, "U1", "m1", "buy milk", None).await;

        let locks = UserLocks::new();
        let free_during_push = Arc::new(Mutex::new(Vec::new()));
        let gateway = LockCheckingGateway {
            locks: locks.clone(),
            free_during_push: free_during_push.clone(),
        };
        let scheduler = JobScheduler::new(
            db.clone(),
            Arc::new(gateway),
            locks,
            SchedulerConfig::default(),
        );

        assert!(scheduler.on_fire("U1", "m1").await.unwrap());
        assert_eq!(*free_during_push.lock().unwrap(), vec![true]);

        // State was committed before the push
        let fetched = session::get_session(db.pool(), "U1").await.unwrap();
        assert_eq!(fetched.last_fired_reminder_id.as_deref(), Some("m1"));
        assert_eq!(scheduler.pending("U1", "m1"), Some(JobKind::Expire));
    }

    #[tokio::test]
    async fn test_rehydrate_splits_future_and_past() {
        let (scheduler, db, gateway) = setup().await;
        let now = Local::now().naive_local();

        seed(&db, "U1", "future", "later", Some(now + TimeDelta::hours(1))).await;
        seed(&db, "U2", "past", "missed", Some(now - TimeDelta::hours(1))).await;
        seed(&db, "U1", "draft", "no time", None).await;

        let report = scheduler.rehydrate_at(now).await.unwrap();
        assert_eq!(
            report,
            RehydrationReport {
                scheduled: 1,
                discarded: 1
            }
        );

        assert_eq!(scheduler.pending("U1", "future"), Some(JobKind::Fire));
        assert_eq!(scheduler.pending("U1", "draft"), None);
        assert!(reminder::get_reminder(db.pool(), "U2", "past")
            .await
            .unwrap()
            .is_none());

        scheduler.run_due(later(3601)).await;
        assert_eq!(gateway.pushes_to("U1").len(), 1);
        assert!(gateway.pushes_to("U2").is_empty());
    }

    #[tokio::test]
    async fn test_cancel_user_drops_only_that_user() {
        let (scheduler, _db, _gateway) = setup().await;

        scheduler.schedule("U1", "m1", TimeDelta::hours(1), JobKind::Fire);
        scheduler.schedule("U1", "m2", TimeDelta::hours(1), JobKind::Expire);
        scheduler.schedule("U2", "m1", TimeDelta::hours(1), JobKind::Fire);

        assert_eq!(scheduler.cancel_user("U1"), 2);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.pending("U2", "m1"), Some(JobKind::Fire));
    }

    #[tokio::test]
    async fn test_run_until_stops_on_shutdown() {
        let (scheduler, _db, _gateway) = setup().await;
        scheduler.schedule("U1", "m1", TimeDelta::hours(1), JobKind::Fire);

        scheduler.run_until(async {}).await;
        assert_eq!(scheduler.len(), 1);

        let handle = scheduler.spawn();
        handle.shutdown().await;
    }
}
