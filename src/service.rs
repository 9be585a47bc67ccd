use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use uuid::Uuid;

use crate::interest::{self, Interaction};
use crate::models::{Event, EventRegistration, NewEvent, ScoredEvent, UserInterest};
use crate::relevance;
use crate::reminders;
use crate::repository::{EventRepository, RegistrationError};

/// Registration, interest tracking and recommendations over one repository.
#[derive(Clone)]
pub struct EventService {
    repo: Arc<dyn EventRepository>,
}

impl EventService {
    pub fn new(repo: Arc<dyn EventRepository>) -> Self {
        Self { repo }
    }

    pub async fn create_event(&self, mut event: NewEvent) -> anyhow::Result<Option<Event>> {
        event.area = interest::normalize_area(&event.area);
        if event.area.is_empty() {
            anyhow::bail!("event area must not be empty");
        }
        if event.title.trim().is_empty() {
            anyhow::bail!("event title must not be empty");
        }
        if event.capacity < 0 || event.duration_minutes <= 0 {
            anyhow::bail!("capacity must be >= 0 and duration must be > 0");
        }
        self.repo.insert_event(event).await
    }

    pub async fn list_events(&self) -> anyhow::Result<Vec<Event>> {
        self.repo.list_events().await
    }

    pub async fn interest(&self, user_id: &str) -> anyhow::Result<UserInterest> {
        Ok(self
            .repo
            .load_interest(user_id)
            .await?
            .unwrap_or_else(|| UserInterest::empty(user_id)))
    }

    pub async fn track(
        &self,
        user_id: &str,
        interaction: Interaction,
        now: DateTime<Utc>,
    ) -> anyhow::Result<UserInterest> {
        let mut profile = self.interest(user_id).await?;
        interest::apply(&mut profile, &interaction, now);
        self.repo.save_interest(&profile).await?;
        debug!("Tracked {interaction:?} for {user_id}");
        Ok(profile)
    }

    pub async fn recommended_events(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<ScoredEvent>> {
        let profile = self.interest(user_id).await?;
        let events = self.repo.list_events().await?;
        Ok(relevance::rank_events(&events, &profile, now))
    }

    pub async fn register(
        &self,
        event_id: Uuid,
        user_id: &str,
        name: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<EventRegistration, RegistrationError> {
        let email = normalize_email(email)?;
        let event = self
            .repo
            .get_event(event_id)
            .await?
            .ok_or(RegistrationError::UnknownEvent(event_id))?;

        let registration = EventRegistration {
            id: Uuid::new_v4(),
            event_id,
            user_id: user_id.to_string(),
            name: name.trim().to_string(),
            email,
            registered_at: now,
        };
        let batch = reminders::reminder_batch(&event, user_id);

        let updated = self.repo.register(&registration, &batch, now).await?;
        info!(
            "Registered {} for {} ({}/{} seats, {} reminders)",
            registration.email,
            updated.title,
            updated.registered,
            updated.capacity,
            batch.len()
        );

        // The registration already stands; a lost interest bump is not worth failing it.
        let signal = Interaction::EventRegistration { area: updated.area.clone() };
        if let Err(err) = self.track(user_id, signal, now).await {
            warn!("Failed to record registration interest for {user_id}: {err:#}");
        }

        Ok(registration)
    }
}

fn normalize_email(email: &str) -> Result<String, RegistrationError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(RegistrationError::InvalidEmail(email)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRepository;
    use crate::models::EventType;
    use chrono::Duration;

    fn new_event(area: &str, capacity: i32, starts_in: Duration) -> NewEvent {
        NewEvent {
            title: "Soldadura MIG avanzada".to_string(),
            event_type: EventType::Webinar,
            area: area.to_string(),
            starts_at: Utc::now() + starts_in,
            duration_minutes: 60,
            capacity,
            related_courses: vec!["sol-110".to_string()],
            tags: vec!["mig".to_string()],
            source_key: None,
        }
    }

    async fn service_with(event: NewEvent) -> (EventService, Arc<MemoryRepository>, Event) {
        let repo = Arc::new(MemoryRepository::new());
        let service = EventService::new(repo.clone());
        let event = service.create_event(event).await.unwrap().unwrap();
        (service, repo, event)
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_without_increment() {
        let (service, repo, event) = service_with(new_event("soldadura", 10, Duration::days(2))).await;
        let now = Utc::now();

        service
            .register(event.id, "u-1", "Ana", "ana@example.com", now)
            .await
            .unwrap();
        let second = service
            .register(event.id, "u-1", "Ana", " ANA@example.com ", now)
            .await;

        assert!(matches!(second, Err(RegistrationError::AlreadyRegistered { .. })));
        let stored = repo.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(stored.registered, 1);
        assert_eq!(repo.registrations_for(event.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn registration_schedules_four_reminders_and_bumps_interest() {
        let (service, repo, event) = service_with(new_event("soldadura", 10, Duration::days(2))).await;
        let now = Utc::now();

        service
            .register(event.id, "u-2", "Luis", "luis@example.com", now)
            .await
            .unwrap();

        let scheduled = repo.scheduled();
        assert_eq!(scheduled.len(), 4);
        assert!(scheduled.iter().all(|n| n.user_id == "u-2" && !n.sent));

        let profile = service.interest("u-2").await.unwrap();
        assert_eq!(profile.area_scores["soldadura"], interest::REGISTRATION_POINTS);
    }

    #[tokio::test]
    async fn full_closed_and_unknown_events_reject() {
        let (service, _repo, full) = service_with(new_event("soldadura", 1, Duration::days(2))).await;
        let now = Utc::now();
        service.register(full.id, "a", "A", "a@example.com", now).await.unwrap();
        let result = service.register(full.id, "b", "B", "b@example.com", now).await;
        assert!(matches!(result, Err(RegistrationError::Full(_))));

        let started = service
            .create_event(new_event("soldadura", 10, -Duration::minutes(5)))
            .await
            .unwrap()
            .unwrap();
        let result = service.register(started.id, "c", "C", "c@example.com", now).await;
        assert!(matches!(result, Err(RegistrationError::Closed(_))));

        let result = service.register(Uuid::new_v4(), "d", "D", "d@example.com", now).await;
        assert!(matches!(result, Err(RegistrationError::UnknownEvent(_))));
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let (service, repo, event) = service_with(new_event("soldadura", 10, Duration::days(2))).await;
        let result = service.register(event.id, "u", "U", "not-an-email", Utc::now()).await;
        assert!(matches!(result, Err(RegistrationError::InvalidEmail(_))));
        assert_eq!(repo.get_event(event.id).await.unwrap().unwrap().registered, 0);
    }

    #[tokio::test]
    async fn recommendations_follow_tracked_interest() {
        let (service, _repo, welding) = service_with(new_event("soldadura", 10, Duration::days(2))).await;
        let mut wiring = new_event("electricidad", 10, Duration::days(3));
        wiring.related_courses = vec!["ele-100".to_string()];
        wiring.tags = vec!["cuadros eléctricos".to_string()];
        service.create_event(wiring).await.unwrap();
        let now = Utc::now();

        assert!(service.recommended_events("u-3", now).await.unwrap().is_empty());

        service
            .track(
                "u-3",
                Interaction::CourseView { course_id: "sol-110".into(), area: "soldadura".into() },
                now,
            )
            .await
            .unwrap();
        service
            .track("u-3", Interaction::Search { term: "MIG".into() }, now)
            .await
            .unwrap();

        let ranked = service.recommended_events("u-3", now).await.unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].event.id, welding.id);
        assert_eq!(ranked[0].score, 10 + 20 + 10);
    }

    #[tokio::test]
    async fn area_casing_does_not_break_matching() {
        let (service, _repo, event) = service_with(new_event(" Metalurgia", 10, Duration::days(2))).await;
        assert_eq!(event.area, "metalurgia");
        let now = Utc::now();

        service
            .track("u-4", Interaction::AreaVisit { area: "METALURGIA".into() }, now)
            .await
            .unwrap();

        let ranked = service.recommended_events("u-4", now).await.unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].score, interest::AREA_VISIT_POINTS);
    }

    #[tokio::test]
    async fn create_event_validates_input() {
        let repo = Arc::new(MemoryRepository::new());
        let service = EventService::new(repo);
        let mut event = new_event("soldadura", 10, Duration::days(1));
        event.title = "  ".to_string();
        assert!(service.create_event(event).await.is_err());
    }
}
