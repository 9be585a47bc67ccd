use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Event, EventRegistration, NewEvent, Notification, ScheduledNotification, UserInterest,
};

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("event {0} does not exist")]
    UnknownEvent(Uuid),
    #[error("event {0} is closed for registration")]
    Closed(Uuid),
    #[error("event {0} has no seats left")]
    Full(Uuid),
    #[error("{email} is already registered for event {event_id}")]
    AlreadyRegistered { event_id: Uuid, email: String },
    #[error("invalid email address: {0:?}")]
    InvalidEmail(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Typed persistence for the event subsystem.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Events ordered by `starts_at`, oldest first.
    async fn list_events(&self) -> anyhow::Result<Vec<Event>>;

    async fn get_event(&self, id: Uuid) -> anyhow::Result<Option<Event>>;

    /// Returns `None` when an event with the same `source_key` already exists.
    async fn insert_event(&self, event: NewEvent) -> anyhow::Result<Option<Event>>;

    async fn load_interest(&self, user_id: &str) -> anyhow::Result<Option<UserInterest>>;

    async fn save_interest(&self, interest: &UserInterest) -> anyhow::Result<()>;

    /// Atomically checks the registration rules, increments `registered`,
    /// stores the registration and its reminders. Returns the updated event.
    async fn register(
        &self,
        registration: &EventRegistration,
        reminders: &[ScheduledNotification],
        now: DateTime<Utc>,
    ) -> Result<Event, RegistrationError>;

    async fn registrations_for(&self, event_id: Uuid) -> anyhow::Result<Vec<EventRegistration>>;

    /// Unsent notifications with `scheduled_for <= now`, earliest first.
    async fn due_notifications(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<ScheduledNotification>>;

    async fn pending_notifications(&self) -> anyhow::Result<Vec<ScheduledNotification>>;

    /// Flips `sent` to true; a record already sent is left untouched.
    async fn mark_notification_sent(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()>;

    async fn insert_notification(&self, notification: &Notification) -> anyhow::Result<()>;

    async fn notifications_for(&self, user_id: &str) -> anyhow::Result<Vec<Notification>>;
}

/// Shared registration rules used by every backend before it writes.
pub(crate) fn check_registration(
    event: Option<&Event>,
    registration: &EventRegistration,
    already_registered: bool,
    now: DateTime<Utc>,
) -> Result<(), RegistrationError> {
    let event = event.ok_or(RegistrationError::UnknownEvent(registration.event_id))?;
    if !event.active || event.starts_at <= now {
        return Err(RegistrationError::Closed(event.id));
    }
    if already_registered {
        return Err(RegistrationError::AlreadyRegistered {
            event_id: event.id,
            email: registration.email.clone(),
        });
    }
    if event.is_full() {
        return Err(RegistrationError::Full(event.id));
    }
    Ok(())
}
