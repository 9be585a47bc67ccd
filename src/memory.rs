use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Event, EventRegistration, NewEvent, Notification, ScheduledNotification, UserInterest,
};
use crate::repository::{check_registration, EventRepository, RegistrationError};

#[derive(Default)]
struct State {
    events: Vec<Event>,
    interests: HashMap<String, UserInterest>,
    registrations: Vec<EventRegistration>,
    scheduled: Vec<ScheduledNotification>,
    notifications: Vec<Notification>,
}

/// Process-local repository used when no database is configured.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_events(events: Vec<Event>) -> Self {
        let repo = Self::new();
        if let Ok(mut state) = repo.state.lock() {
            state.events = events;
        }
        repo
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| anyhow::anyhow!("memory repository lock poisoned"))
    }

    #[cfg(test)]
    pub fn insert_scheduled(&self, notification: ScheduledNotification) {
        self.state.lock().unwrap().scheduled.push(notification);
    }

    #[cfg(test)]
    pub fn scheduled(&self) -> Vec<ScheduledNotification> {
        self.state.lock().unwrap().scheduled.clone()
    }
}

#[async_trait]
impl EventRepository for MemoryRepository {
    async fn list_events(&self) -> anyhow::Result<Vec<Event>> {
        let mut events = self.lock()?.events.clone();
        events.sort_by(|a, b| a.starts_at.cmp(&b.starts_at));
        Ok(events)
    }

    async fn get_event(&self, id: Uuid) -> anyhow::Result<Option<Event>> {
        Ok(self.lock()?.events.iter().find(|e| e.id == id).cloned())
    }

    async fn insert_event(&self, event: NewEvent) -> anyhow::Result<Option<Event>> {
        let mut state = self.lock()?;
        if let Some(key) = event.source_key.as_deref() {
            if state.events.iter().any(|e| e.source_key.as_deref() == Some(key)) {
                return Ok(None);
            }
        }
        let event = event.into_event();
        state.events.push(event.clone());
        Ok(Some(event))
    }

    async fn load_interest(&self, user_id: &str) -> anyhow::Result<Option<UserInterest>> {
        Ok(self.lock()?.interests.get(user_id).cloned())
    }

    async fn save_interest(&self, interest: &UserInterest) -> anyhow::Result<()> {
        self.lock()?
            .interests
            .insert(interest.user_id.clone(), interest.clone());
        Ok(())
    }

    async fn register(
        &self,
        registration: &EventRegistration,
        reminders: &[ScheduledNotification],
        now: DateTime<Utc>,
    ) -> Result<Event, RegistrationError> {
        let mut state = self.lock()?;
        let already_registered = state
            .registrations
            .iter()
            .any(|r| r.event_id == registration.event_id && r.email == registration.email);
        let position = state.events.iter().position(|e| e.id == registration.event_id);

        check_registration(
            position.map(|idx| &state.events[idx]),
            registration,
            already_registered,
            now,
        )?;
        let idx = position.ok_or(RegistrationError::UnknownEvent(registration.event_id))?;

        state.events[idx].registered += 1;
        let event = state.events[idx].clone();
        state.registrations.push(registration.clone());
        state.scheduled.extend_from_slice(reminders);
        Ok(event)
    }

    async fn registrations_for(&self, event_id: Uuid) -> anyhow::Result<Vec<EventRegistration>> {
        Ok(self
            .lock()?
            .registrations
            .iter()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn due_notifications(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<ScheduledNotification>> {
        let mut due: Vec<ScheduledNotification> = self
            .lock()?
            .scheduled
            .iter()
            .filter(|n| n.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.scheduled_for.cmp(&b.scheduled_for));
        Ok(due)
    }

    async fn pending_notifications(&self) -> anyhow::Result<Vec<ScheduledNotification>> {
        let mut pending: Vec<ScheduledNotification> = self
            .lock()?
            .scheduled
            .iter()
            .filter(|n| !n.sent)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.scheduled_for.cmp(&b.scheduled_for));
        Ok(pending)
    }

    async fn mark_notification_sent(&self, id: Uuid, _at: DateTime<Utc>) -> anyhow::Result<()> {
        let mut state = self.lock()?;
        match state.scheduled.iter_mut().find(|n| n.id == id) {
            Some(record) => {
                record.sent = true;
                Ok(())
            }
            None => anyhow::bail!("scheduled notification {id} not found"),
        }
    }

    async fn insert_notification(&self, notification: &Notification) -> anyhow::Result<()> {
        self.lock()?.notifications.push(notification.clone());
        Ok(())
    }

    async fn notifications_for(&self, user_id: &str) -> anyhow::Result<Vec<Notification>> {
        let mut items: Vec<Notification> = self
            .lock()?
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }
}
