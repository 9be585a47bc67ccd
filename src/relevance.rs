use chrono::{DateTime, Utc};

use crate::models::{Event, ScoredEvent, UserInterest};

pub const VIEWED_COURSE_WEIGHT: i64 = 20;
pub const SEARCH_MATCH_WEIGHT: i64 = 10;

pub fn score_event(event: &Event, interest: &UserInterest) -> i64 {
    let mut score = interest.area_scores.get(&event.area).copied().unwrap_or(0);

    for course_id in event.related_courses.iter() {
        if interest.viewed_courses.iter().any(|viewed| viewed == course_id) {
            score += VIEWED_COURSE_WEIGHT;
        }
    }

    for term in interest.search_terms.iter() {
        if event.tags.iter().any(|tag| term_overlaps(term, tag)) {
            score += SEARCH_MATCH_WEIGHT;
        }
    }

    score
}

/// Case-insensitive overlap: either string contains the other.
pub fn term_overlaps(term: &str, tag: &str) -> bool {
    let term = term.trim().to_lowercase();
    let tag = tag.trim().to_lowercase();
    if term.is_empty() || tag.is_empty() {
        return false;
    }
    tag.contains(&term) || term.contains(&tag)
}

/// Scores active events and keeps the positive ones, best first.
/// `sort_by` is stable, so equal scores keep their input order.
pub fn rank_events(events: &[Event], interest: &UserInterest, now: DateTime<Utc>) -> Vec<ScoredEvent> {
    let mut scored: Vec<ScoredEvent> = events
        .iter()
        .filter(|event| event.is_active_at(now))
        .map(|event| ScoredEvent {
            score: score_event(event, interest),
            event: event.clone(),
        })
        .filter(|scored| scored.score > 0)
        .collect();

    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventType;
    use chrono::Duration;
    use uuid::Uuid;

    fn sample_event(area: &str, related: &[&str], tags: &[&str]) -> Event {
        Event {
            id: Uuid::new_v4(),
            title: "Tratamientos térmicos".to_string(),
            event_type: EventType::Webinar,
            area: area.to_string(),
            starts_at: Utc::now() + Duration::days(3),
            duration_minutes: 90,
            capacity: 100,
            registered: 0,
            related_courses: related.iter().map(|s| s.to_string()).collect(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            active: true,
            source_key: None,
        }
    }

    fn profile() -> UserInterest {
        UserInterest::empty("user-1")
    }

    #[test]
    fn area_score_is_added() {
        let mut interest = profile();
        interest.area_scores.insert("metalurgia".to_string(), 30);

        let event = sample_event("metalurgia", &[], &[]);
        assert!(score_event(&event, &interest) >= 30);
    }

    #[test]
    fn viewed_related_courses_add_twenty_each() {
        let mut interest = profile();
        interest.viewed_courses = vec!["c-1".to_string(), "c-2".to_string()];

        let matched = sample_event("soldadura", &["c-1", "c-2", "c-9"], &[]);
        let unmatched = sample_event("soldadura", &["c-7", "c-8", "c-9"], &[]);

        let diff = score_event(&matched, &interest) - score_event(&unmatched, &interest);
        assert!(diff >= 40);
        assert_eq!(diff, 40);
    }

    #[test]
    fn search_terms_count_once_per_term() {
        let mut interest = profile();
        interest.search_terms = vec!["Acero".to_string(), "robot".to_string()];

        let event = sample_event("metalurgia", &[], &["aceros inoxidables", "acero al carbono"]);
        assert_eq!(score_event(&event, &interest), SEARCH_MATCH_WEIGHT);
    }

    #[test]
    fn overlap_works_both_ways_and_ignores_blanks() {
        assert!(term_overlaps("soldadura tig", "tig"));
        assert!(term_overlaps("tig", "Soldadura TIG"));
        assert!(!term_overlaps("  ", "tig"));
        assert!(!term_overlaps("plc", "hidráulica"));
    }

    #[test]
    fn ranking_drops_zero_scores_and_orders_desc() {
        let mut interest = profile();
        interest.area_scores.insert("metalurgia".to_string(), 5);
        interest.viewed_courses = vec!["c-1".to_string()];

        let low = sample_event("metalurgia", &[], &[]);
        let high = sample_event("metalurgia", &["c-1"], &[]);
        let none = sample_event("electricidad", &[], &[]);

        let ranked = rank_events(&[low.clone(), none, high.clone()], &interest, Utc::now());
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].event.id, high.id);
        assert_eq!(ranked[0].score, 25);
        assert_eq!(ranked[1].event.id, low.id);
    }

    #[test]
    fn ties_keep_input_order() {
        let mut interest = profile();
        interest.area_scores.insert("metalurgia".to_string(), 10);

        let first = sample_event("metalurgia", &[], &[]);
        let second = sample_event("metalurgia", &[], &[]);
        let ranked = rank_events(&[first.clone(), second.clone()], &interest, Utc::now());

        assert_eq!(ranked[0].event.id, first.id);
        assert_eq!(ranked[1].event.id, second.id);
    }

    #[test]
    fn finished_and_inactive_events_are_ignored() {
        let mut interest = profile();
        interest.area_scores.insert("metalurgia".to_string(), 10);

        let mut finished = sample_event("metalurgia", &[], &[]);
        finished.starts_at = Utc::now() - Duration::days(1);
        let mut inactive = sample_event("metalurgia", &[], &[]);
        inactive.active = false;

        assert!(rank_events(&[finished, inactive], &interest, Utc::now()).is_empty());
    }
}
