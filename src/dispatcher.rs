use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::sync::watch;
use uuid::Uuid;

use crate::models::{Event, Notification, ScheduledNotification};
use crate::reminders;
use crate::repository::EventRepository;

/// Where a due reminder ends up once it fires.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn create_notification(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Stores delivered reminders in the user's inbox.
pub struct InboxSink {
    repo: Arc<dyn EventRepository>,
}

impl InboxSink {
    pub fn new(repo: Arc<dyn EventRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl NotificationSink for InboxSink {
    async fn create_notification(&self, notification: &Notification) -> anyhow::Result<()> {
        self.repo.insert_notification(notification).await
    }
}

enum EventLookup {
    Found(Event),
    Missing,
    Unreadable,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub dispatched: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub struct NotificationDispatcher {
    repo: Arc<dyn EventRepository>,
    sink: Arc<dyn NotificationSink>,
    period: Duration,
}

impl NotificationDispatcher {
    pub fn new(repo: Arc<dyn EventRepository>, sink: Arc<dyn NotificationSink>, period: Duration) -> Self {
        Self { repo, sink, period }
    }

    /// Delivers every due, unsent reminder once and marks it sent.
    pub async fn tick(&self, now: DateTime<Utc>) -> anyhow::Result<DispatchReport> {
        let due = self.repo.due_notifications(now).await?;
        let mut report = DispatchReport::default();
        let mut events: HashMap<Uuid, EventLookup> = HashMap::new();

        for record in due {
            if !events.contains_key(&record.event_id) {
                let lookup = match self.repo.get_event(record.event_id).await {
                    Ok(Some(event)) => EventLookup::Found(event),
                    Ok(None) => EventLookup::Missing,
                    Err(err) => {
                        warn!("Cannot load event {} for reminders: {err:#}", record.event_id);
                        EventLookup::Unreadable
                    }
                };
                events.insert(record.event_id, lookup);
            }

            let event = match events.get(&record.event_id) {
                Some(EventLookup::Found(event)) => event,
                Some(EventLookup::Missing) | None => {
                    warn!(
                        "Dropping reminder {} for missing event {}",
                        record.id, record.event_id
                    );
                    if let Err(err) = self.repo.mark_notification_sent(record.id, now).await {
                        warn!("Failed to mark reminder {} as sent: {err:#}", record.id);
                    }
                    report.skipped += 1;
                    continue;
                }
                // Left unsent so a readable event is picked up again later.
                Some(EventLookup::Unreadable) => {
                    report.skipped += 1;
                    continue;
                }
            };

            let notification = build_notification(&record, event, now);
            if let Err(err) = self.sink.create_notification(&notification).await {
                warn!("Failed to deliver reminder {} to {}: {err:#}", record.id, record.user_id);
                report.failed += 1;
                continue;
            }

            if let Err(err) = self.repo.mark_notification_sent(record.id, now).await {
                warn!("Delivered reminder {} but could not mark it sent: {err:#}", record.id);
                report.failed += 1;
                continue;
            }
            debug!(
                "Sent {} reminder for {} to {}",
                record.kind.as_str(),
                event.title,
                record.user_id
            );
            report.dispatched += 1;
        }

        if report.dispatched > 0 || report.failed > 0 || report.skipped > 0 {
            info!(
                "Reminder tick: {} sent, {} failed, {} skipped",
                report.dispatched, report.failed, report.skipped
            );
        }
        Ok(report)
    }

    /// Polls on a fixed interval until `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!("Reminder dispatcher started (interval: {}s)", self.period.as_secs());

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(err) = self.tick(Utc::now()).await {
                        error!("Reminder tick failed: {err:#}");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Reminder dispatcher stopped");
    }
}

fn build_notification(record: &ScheduledNotification, event: &Event, now: DateTime<Utc>) -> Notification {
    Notification {
        id: Uuid::new_v4(),
        user_id: record.user_id.clone(),
        event_id: Some(event.id),
        title: reminders::reminder_title(record.kind, event),
        message: reminders::reminder_message(record.kind, event),
        created_at: now,
        read: false,
    }
}
