use chrono::{DateTime, Duration, Utc};

use crate::models::{EventType, NewEvent};

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// A realistic upcoming catalogue relative to `now`.
pub fn sample_events(now: DateTime<Utc>) -> Vec<NewEvent> {
    vec![
        NewEvent {
            title: "Tratamientos térmicos del acero".to_string(),
            event_type: EventType::Webinar,
            area: "metalurgia".to_string(),
            starts_at: now + Duration::days(2),
            duration_minutes: 90,
            capacity: 120,
            related_courses: strings(&["met-101", "met-204"]),
            tags: strings(&["acero", "temple", "revenido"]),
            source_key: Some("seed-webinar-metalurgia".to_string()),
        },
        NewEvent {
            title: "Masterclass de soldadura TIG".to_string(),
            event_type: EventType::Masterclass,
            area: "soldadura".to_string(),
            starts_at: now + Duration::days(5),
            duration_minutes: 120,
            capacity: 30,
            related_courses: strings(&["sol-110", "sol-230"]),
            tags: strings(&["tig", "aluminio", "inoxidable"]),
            source_key: Some("seed-masterclass-tig".to_string()),
        },
        NewEvent {
            title: "Programación de PLC en la práctica".to_string(),
            event_type: EventType::Webinar,
            area: "automatizacion".to_string(),
            starts_at: now + Duration::days(9),
            duration_minutes: 60,
            capacity: 200,
            related_courses: strings(&["aut-150"]),
            tags: strings(&["plc", "ladder", "industria 4.0"]),
            source_key: Some("seed-webinar-plc".to_string()),
        },
        NewEvent {
            title: "Pack mantenimiento industrial".to_string(),
            event_type: EventType::Bundle,
            area: "mantenimiento".to_string(),
            starts_at: now + Duration::days(14),
            duration_minutes: 45,
            capacity: 500,
            related_courses: strings(&["man-100", "man-120", "aut-150"]),
            tags: strings(&["mantenimiento", "hidráulica", "neumática"]),
            source_key: Some("seed-bundle-mantenimiento".to_string()),
        },
        NewEvent {
            title: "Semana de la metalurgia: 30% de descuento".to_string(),
            event_type: EventType::Promotion,
            area: "metalurgia".to_string(),
            starts_at: now + Duration::days(21),
            duration_minutes: 30,
            capacity: 1000,
            related_courses: strings(&["met-101", "met-204", "met-310"]),
            tags: strings(&["descuento", "acero", "fundición"]),
            source_key: Some("seed-promo-metalurgia".to_string()),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_events_are_upcoming_and_keyed() {
        let now = Utc::now();
        let events = sample_events(now);
        assert_eq!(events.len(), 5);
        assert!(events.iter().all(|e| e.starts_at > now && e.source_key.is_some()));
    }
}
