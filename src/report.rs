use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{Event, EventTypeSummary, ScheduledNotification, ScoredEvent};

pub fn summarize_by_type(events: &[Event]) -> Vec<EventTypeSummary> {
    let mut map: std::collections::HashMap<_, (usize, i64, i64)> =
        std::collections::HashMap::new();

    for event in events {
        let entry = map.entry(event.event_type).or_insert((0, 0, 0));
        entry.0 += 1;
        entry.1 += i64::from(event.capacity);
        entry.2 += i64::from(event.registered);
    }

    let mut summaries: Vec<EventTypeSummary> = map
        .into_iter()
        .map(|(event_type, (count, capacity, registered))| EventTypeSummary {
            event_type,
            count,
            capacity,
            registered,
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.event_type.as_str().cmp(b.event_type.as_str()))
    });
    summaries
}

pub fn build_report(
    generated_at: DateTime<Utc>,
    events: &[Event],
    pending: &[ScheduledNotification],
    recommendations: Option<(&str, &[ScoredEvent])>,
) -> String {
    let summaries = summarize_by_type(events);
    let mut output = String::new();

    let _ = writeln!(output, "# Event Activity Report");
    let _ = writeln!(output, "Generated at {}", generated_at.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Catalogue Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No events in the catalogue.");
    } else {
        for summary in summaries.iter() {
            let fill = if summary.capacity == 0 {
                0.0
            } else {
                summary.registered as f64 / summary.capacity as f64 * 100.0
            };
            let _ = writeln!(
                output,
                "- {}: {} events, {}/{} seats taken ({:.1}%)",
                summary.event_type, summary.count, summary.registered, summary.capacity, fill
            );
        }
    }

    let mut by_fill: Vec<&Event> = events.iter().filter(|e| e.registered > 0).collect();
    by_fill.sort_by(|a, b| {
        b.fill_rate()
            .partial_cmp(&a.fill_rate())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let _ = writeln!(output);
    let _ = writeln!(output, "## Most Filled Events");

    if by_fill.is_empty() {
        let _ = writeln!(output, "No registrations yet.");
    } else {
        for event in by_fill.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}, {}) {}/{} seats, starts {}",
                event.title,
                event.event_type,
                event.area,
                event.registered,
                event.capacity,
                event.starts_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Pending Reminders");
    let overdue = pending
        .iter()
        .filter(|n| n.scheduled_for <= generated_at)
        .count();
    let _ = writeln!(
        output,
        "{} reminders pending ({} already due).",
        pending.len(),
        overdue
    );
    if let Some(next) = pending.iter().map(|n| n.scheduled_for).min() {
        let _ = writeln!(output, "Next reminder at {}.", next.format("%Y-%m-%d %H:%M UTC"));
    }

    if let Some((user_id, ranked)) = recommendations {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Recommended for {user_id}");
        if ranked.is_empty() {
            let _ = writeln!(output, "No relevant upcoming events for this profile.");
        } else {
            for scored in ranked.iter().take(5) {
                let _ = writeln!(
                    output,
                    "- {} ({}) score {}",
                    scored.event.title, scored.event.area, scored.score
                );
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventType, ReminderKind};
    use chrono::Duration;
    use uuid::Uuid;

    fn event(event_type: EventType, capacity: i32, registered: i32) -> Event {
        Event {
            id: Uuid::new_v4(),
            title: format!("{event_type} event"),
            event_type,
            area: "metalurgia".to_string(),
            starts_at: Utc::now() + Duration::days(1),
            duration_minutes: 60,
            capacity,
            registered,
            related_courses: vec![],
            tags: vec![],
            active: true,
            source_key: None,
        }
    }

    #[test]
    fn summaries_group_by_type() {
        let events = vec![
            event(EventType::Webinar, 100, 10),
            event(EventType::Webinar, 50, 40),
            event(EventType::Bundle, 20, 0),
        ];
        let summaries = summarize_by_type(&events);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].event_type, EventType::Webinar);
        assert_eq!(summaries[0].count, 2);
        assert_eq!(summaries[0].capacity, 150);
        assert_eq!(summaries[0].registered, 50);
    }

    #[test]
    fn report_lists_sections() {
        let now = Utc::now();
        let events = vec![event(EventType::Masterclass, 10, 9), event(EventType::Promotion, 100, 5)];
        let pending = vec![ScheduledNotification {
            id: Uuid::new_v4(),
            event_id: events[0].id,
            user_id: "u".to_string(),
            scheduled_for: now - Duration::minutes(1),
            kind: ReminderKind::Starting,
            sent: false,
        }];

        let ranked: &[ScoredEvent] = &[];
        let report = build_report(now, &events, &pending, Some(("u", ranked)));
        assert!(report.contains("## Catalogue Mix"));
        assert!(report.contains("- masterclass: 1 events, 9/10 seats taken (90.0%)"));
        assert!(report.contains("1 reminders pending (1 already due)."));
        assert!(report.contains("No relevant upcoming events"));

        let filled = report.find("masterclass event").unwrap();
        let promo = report.find("promotion event").unwrap();
        assert!(filled < promo);
    }
}
