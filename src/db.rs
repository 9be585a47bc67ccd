use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    Event, EventRegistration, EventType, NewEvent, Notification, ReminderKind,
    ScheduledNotification, UserInterest,
};
use crate::interest;
use crate::repository::{check_registration, EventRepository, RegistrationError};
use crate::seed;

const EVENT_COLUMNS: &str = "id, title, event_type, area, starts_at, duration_minutes, capacity, \
     registered, related_courses, tags, active, source_key";

const SCHEDULED_COLUMNS: &str = "id, event_id, user_id, scheduled_for, kind, sent";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(repo: &dyn EventRepository) -> anyhow::Result<usize> {
    let mut inserted = 0usize;
    for event in seed::sample_events(Utc::now()) {
        if repo.insert_event(event).await?.is_some() {
            inserted += 1;
        }
    }
    Ok(inserted)
}

pub async fn import_csv(repo: &dyn EventRepository, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        title: String,
        event_type: String,
        area: String,
        starts_at: DateTime<Utc>,
        duration_minutes: i32,
        capacity: i32,
        related_courses: Option<String>,
        tags: Option<String>,
        source_key: Option<String>,
    }

    fn split_list(value: Option<String>) -> Vec<String> {
        value
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let event_type: EventType = row
            .event_type
            .parse()
            .with_context(|| format!("row {}: bad event_type", line + 1))?;

        let event = NewEvent {
            title: row.title,
            event_type,
            area: interest::normalize_area(&row.area),
            starts_at: row.starts_at,
            duration_minutes: row.duration_minutes,
            capacity: row.capacity.max(0),
            related_courses: split_list(row.related_courses),
            tags: split_list(row.tags),
            source_key: row.source_key.filter(|k| !k.trim().is_empty()),
        };

        if repo.insert_event(event).await?.is_some() {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn event_from_row(row: &PgRow) -> anyhow::Result<Event> {
    let event_type: String = row.try_get("event_type")?;
    Ok(Event {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        event_type: event_type.parse()?,
        area: row.try_get("area")?,
        starts_at: row.try_get("starts_at")?,
        duration_minutes: row.try_get("duration_minutes")?,
        capacity: row.try_get("capacity")?,
        registered: row.try_get("registered")?,
        related_courses: row.try_get("related_courses")?,
        tags: row.try_get("tags")?,
        active: row.try_get("active")?,
        source_key: row.try_get("source_key")?,
    })
}

fn scheduled_from_row(row: &PgRow) -> anyhow::Result<ScheduledNotification> {
    let kind: String = row.try_get("kind")?;
    Ok(ScheduledNotification {
        id: row.try_get("id")?,
        event_id: row.try_get("event_id")?,
        user_id: row.try_get("user_id")?,
        scheduled_for: row.try_get("scheduled_for")?,
        kind: kind.parse::<ReminderKind>()?,
        sent: row.try_get("sent")?,
    })
}

fn decode_scheduled(rows: Vec<PgRow>) -> Vec<ScheduledNotification> {
    rows.iter()
        .filter_map(|row| match scheduled_from_row(row) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!("Skipping malformed scheduled notification: {err:#}");
                None
            }
        })
        .collect()
}

fn storage(err: sqlx::Error) -> RegistrationError {
    RegistrationError::Storage(err.into())
}

#[async_trait]
impl EventRepository for PgRepository {
    async fn list_events(&self) -> anyhow::Result<Vec<Event>> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM learning_events.events ORDER BY starts_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            match event_from_row(row) {
                Ok(event) => events.push(event),
                Err(err) => warn!("Skipping malformed event row: {err:#}"),
            }
        }
        Ok(events)
    }

    async fn get_event(&self, id: Uuid) -> anyhow::Result<Option<Event>> {
        let row = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM learning_events.events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(event_from_row).transpose()
    }

    async fn insert_event(&self, event: NewEvent) -> anyhow::Result<Option<Event>> {
        let event = event.into_event();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO learning_events.events ({EVENT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (source_key) DO NOTHING
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(event.id)
        .bind(&event.title)
        .bind(event.event_type.as_str())
        .bind(&event.area)
        .bind(event.starts_at)
        .bind(event.duration_minutes)
        .bind(event.capacity)
        .bind(event.registered)
        .bind(&event.related_courses)
        .bind(&event.tags)
        .bind(event.active)
        .bind(&event.source_key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let event = event_from_row(&row)?;
                info!("Created {} event {} ({})", event.event_type, event.id, event.title);
                Ok(Some(event))
            }
            None => Ok(None),
        }
    }

    async fn load_interest(&self, user_id: &str) -> anyhow::Result<Option<UserInterest>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, area_scores, viewed_courses, search_terms, updated_at
            FROM learning_events.user_interests
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        // A profile with a broken score map still keeps its lists.
        let area_scores = match row.try_get::<Json<HashMap<String, i64>>, _>("area_scores") {
            Ok(Json(scores)) => scores,
            Err(err) => {
                warn!("Resetting unreadable area scores for {user_id}: {err}");
                HashMap::new()
            }
        };

        Ok(Some(UserInterest {
            user_id: row.try_get("user_id")?,
            area_scores,
            viewed_courses: row.try_get("viewed_courses")?,
            search_terms: row.try_get("search_terms")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    async fn save_interest(&self, interest: &UserInterest) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO learning_events.user_interests
            (user_id, area_scores, viewed_courses, search_terms, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE
            SET area_scores = EXCLUDED.area_scores,
                viewed_courses = EXCLUDED.viewed_courses,
                search_terms = EXCLUDED.search_terms,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&interest.user_id)
        .bind(Json(&interest.area_scores))
        .bind(&interest.viewed_courses)
        .bind(&interest.search_terms)
        .bind(interest.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn register(
        &self,
        registration: &EventRegistration,
        reminders: &[ScheduledNotification],
        now: DateTime<Utc>,
    ) -> Result<Event, RegistrationError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let row = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM learning_events.events WHERE id = $1 FOR UPDATE"
        ))
        .bind(registration.event_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?;
        let event = row.as_ref().map(event_from_row).transpose()?;

        let already_registered: bool = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM learning_events.event_registrations
                WHERE event_id = $1 AND email = $2
            ) AS taken
            "#,
        )
        .bind(registration.event_id)
        .bind(&registration.email)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage)?
        .get("taken");

        check_registration(event.as_ref(), registration, already_registered, now)?;

        let updated = sqlx::query(&format!(
            r#"
            UPDATE learning_events.events
            SET registered = registered + 1
            WHERE id = $1
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(registration.event_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage)?;
        let updated = event_from_row(&updated)?;

        sqlx::query(
            r#"
            INSERT INTO learning_events.event_registrations
            (id, event_id, user_id, name, email, registered_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(registration.id)
        .bind(registration.event_id)
        .bind(&registration.user_id)
        .bind(&registration.name)
        .bind(&registration.email)
        .bind(registration.registered_at)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        for reminder in reminders {
            sqlx::query(&format!(
                r#"
                INSERT INTO learning_events.scheduled_notifications ({SCHEDULED_COLUMNS})
                VALUES ($1, $2, $3, $4, $5, $6)
                "#
            ))
            .bind(reminder.id)
            .bind(reminder.event_id)
            .bind(&reminder.user_id)
            .bind(reminder.scheduled_for)
            .bind(reminder.kind.as_str())
            .bind(reminder.sent)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }

        tx.commit().await.map_err(storage)?;
        Ok(updated)
    }

    async fn registrations_for(&self, event_id: Uuid) -> anyhow::Result<Vec<EventRegistration>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_id, user_id, name, email, registered_at
            FROM learning_events.event_registrations
            WHERE event_id = $1
            ORDER BY registered_at
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        let mut registrations = Vec::new();
        for row in rows {
            registrations.push(EventRegistration {
                id: row.get("id"),
                event_id: row.get("event_id"),
                user_id: row.get("user_id"),
                name: row.get("name"),
                email: row.get("email"),
                registered_at: row.get("registered_at"),
            });
        }
        Ok(registrations)
    }

    async fn due_notifications(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<ScheduledNotification>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SCHEDULED_COLUMNS}
            FROM learning_events.scheduled_notifications
            WHERE NOT sent AND scheduled_for <= $1
            ORDER BY scheduled_for
            "#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(decode_scheduled(rows))
    }

    async fn pending_notifications(&self) -> anyhow::Result<Vec<ScheduledNotification>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SCHEDULED_COLUMNS}
            FROM learning_events.scheduled_notifications
            WHERE NOT sent
            ORDER BY scheduled_for
            "#
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(decode_scheduled(rows))
    }

    async fn mark_notification_sent(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE learning_events.scheduled_notifications
            SET sent = TRUE, sent_at = $2
            WHERE id = $1 AND NOT sent
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_notification(&self, notification: &Notification) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO learning_events.notifications
            (id, user_id, event_id, title, message, created_at, read)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(notification.id)
        .bind(&notification.user_id)
        .bind(notification.event_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.created_at)
        .bind(notification.read)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn notifications_for(&self, user_id: &str) -> anyhow::Result<Vec<Notification>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, event_id, title, message, created_at, read
            FROM learning_events.notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::new();
        for row in rows {
            items.push(Notification {
                id: row.get("id"),
                user_id: row.get("user_id"),
                event_id: row.get("event_id"),
                title: row.get("title"),
                message: row.get("message"),
                created_at: row.get("created_at"),
                read: row.get("read"),
            });
        }
        Ok(items)
    }
}
