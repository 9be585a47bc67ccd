use uuid::Uuid;

use crate::models::{Event, ReminderKind, ScheduledNotification};

/// One reminder per fixed offset before the event starts.
pub fn reminder_batch(event: &Event, user_id: &str) -> Vec<ScheduledNotification> {
    ReminderKind::ALL
        .into_iter()
        .map(|kind| ScheduledNotification {
            id: Uuid::new_v4(),
            event_id: event.id,
            user_id: user_id.to_string(),
            scheduled_for: event.starts_at - kind.lead_time(),
            kind,
            sent: false,
        })
        .collect()
}

pub fn reminder_title(kind: ReminderKind, event: &Event) -> String {
    match kind {
        ReminderKind::DayBefore => format!("Tomorrow: {}", event.title),
        ReminderKind::HourBefore => format!("In 1 hour: {}", event.title),
        ReminderKind::FifteenMinutes => format!("In 15 minutes: {}", event.title),
        ReminderKind::Starting => format!("Starting now: {}", event.title),
    }
}

pub fn reminder_message(kind: ReminderKind, event: &Event) -> String {
    let when = event.starts_at.format("%Y-%m-%d %H:%M UTC");
    match kind {
        ReminderKind::Starting => format!(
            "Your {} \"{}\" is starting. Join now!",
            event.event_type, event.title
        ),
        _ => format!(
            "Reminder: your {} \"{}\" starts at {} ({} min).",
            event.event_type, event.title, when, event.duration_minutes
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventType;
    use chrono::{Duration, TimeZone, Utc};

    fn event() -> Event {
        Event {
            id: Uuid::new_v4(),
            title: "Masterclass de PLC".to_string(),
            event_type: EventType::Masterclass,
            area: "automatizacion".to_string(),
            starts_at: Utc.with_ymd_and_hms(2026, 11, 3, 18, 0, 0).unwrap(),
            duration_minutes: 120,
            capacity: 40,
            registered: 3,
            related_courses: vec![],
            tags: vec![],
            active: true,
            source_key: None,
        }
    }

    #[test]
    fn batch_has_four_fixed_offsets() {
        let event = event();
        let batch = reminder_batch(&event, "u-9");

        assert_eq!(batch.len(), 4);
        let offsets: Vec<Duration> = batch.iter().map(|n| event.starts_at - n.scheduled_for).collect();
        assert_eq!(
            offsets,
            vec![Duration::hours(24), Duration::hours(1), Duration::minutes(15), Duration::zero()]
        );
        assert!(batch.iter().all(|n| !n.sent && n.user_id == "u-9" && n.event_id == event.id));
    }

    #[test]
    fn messages_name_the_event() {
        let event = event();
        assert_eq!(reminder_title(ReminderKind::HourBefore, &event), "In 1 hour: Masterclass de PLC");
        assert!(reminder_message(ReminderKind::DayBefore, &event).contains("2026-11-03 18:00 UTC"));
        assert!(reminder_message(ReminderKind::Starting, &event).contains("masterclass"));
    }
}
