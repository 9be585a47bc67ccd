use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Webinar,
    Masterclass,
    Promotion,
    Bundle,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Webinar => "webinar",
            EventType::Masterclass => "masterclass",
            EventType::Promotion => "promotion",
            EventType::Bundle => "bundle",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "webinar" => Ok(EventType::Webinar),
            "masterclass" => Ok(EventType::Masterclass),
            "promotion" => Ok(EventType::Promotion),
            "bundle" => Ok(EventType::Bundle),
            other => anyhow::bail!("unknown event type: {other}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub event_type: EventType,
    pub area: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub capacity: i32,
    pub registered: i32,
    pub related_courses: Vec<String>,
    pub tags: Vec<String>,
    pub active: bool,
    pub source_key: Option<String>,
}

impl Event {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.starts_at + Duration::minutes(i64::from(self.duration_minutes.max(0)))
    }

    /// Active events are flagged active and have not finished yet.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.ends_at() > now
    }

    pub fn is_full(&self) -> bool {
        self.registered >= self.capacity
    }

    pub fn fill_rate(&self) -> f64 {
        if self.capacity <= 0 {
            0.0
        } else {
            self.registered as f64 / self.capacity as f64
        }
    }
}

/// Fields supplied by an admin when creating an event.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub event_type: EventType,
    pub area: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub capacity: i32,
    pub related_courses: Vec<String>,
    pub tags: Vec<String>,
    pub source_key: Option<String>,
}

impl NewEvent {
    pub fn into_event(self) -> Event {
        Event {
            id: Uuid::new_v4(),
            title: self.title,
            event_type: self.event_type,
            area: self.area,
            starts_at: self.starts_at,
            duration_minutes: self.duration_minutes,
            capacity: self.capacity,
            registered: 0,
            related_courses: self.related_courses,
            tags: self.tags,
            active: true,
            source_key: self.source_key,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInterest {
    pub user_id: String,
    pub area_scores: HashMap<String, i64>,
    pub viewed_courses: Vec<String>,
    pub search_terms: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserInterest {
    pub fn empty(user_id: &str) -> Self {
        UserInterest {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRegistration {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    DayBefore,
    HourBefore,
    FifteenMinutes,
    Starting,
}

impl ReminderKind {
    pub const ALL: [ReminderKind; 4] = [
        ReminderKind::DayBefore,
        ReminderKind::HourBefore,
        ReminderKind::FifteenMinutes,
        ReminderKind::Starting,
    ];

    /// How long before the event start this reminder fires.
    pub fn lead_time(&self) -> Duration {
        match self {
            ReminderKind::DayBefore => Duration::hours(24),
            ReminderKind::HourBefore => Duration::hours(1),
            ReminderKind::FifteenMinutes => Duration::minutes(15),
            ReminderKind::Starting => Duration::zero(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderKind::DayBefore => "day_before",
            ReminderKind::HourBefore => "hour_before",
            ReminderKind::FifteenMinutes => "fifteen_minutes",
            ReminderKind::Starting => "starting",
        }
    }
}

impl FromStr for ReminderKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ReminderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| anyhow::anyhow!("unknown reminder kind: {value}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledNotification {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: String,
    pub scheduled_for: DateTime<Utc>,
    pub kind: ReminderKind,
    pub sent: bool,
}

impl ScheduledNotification {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.sent && self.scheduled_for <= now
    }
}

/// A delivered inbox item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    pub event_id: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredEvent {
    pub event: Event,
    pub score: i64,
}

#[derive(Debug, Clone)]
pub struct EventTypeSummary {
    pub event_type: EventType,
    pub count: usize,
    pub capacity: i64,
    pub registered: i64,
}
