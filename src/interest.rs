use chrono::{DateTime, Utc};

use crate::models::UserInterest;

pub const AREA_VISIT_POINTS: i64 = 5;
pub const COURSE_VIEW_POINTS: i64 = 10;
pub const REGISTRATION_POINTS: i64 = 15;
pub const MAX_VIEWED_COURSES: usize = 50;
pub const MAX_SEARCH_TERMS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    AreaVisit { area: String },
    CourseView { course_id: String, area: String },
    Search { term: String },
    EventRegistration { area: String },
}

pub fn apply(interest: &mut UserInterest, interaction: &Interaction, now: DateTime<Utc>) {
    match interaction {
        Interaction::AreaVisit { area } => bump_area(interest, area, AREA_VISIT_POINTS),
        Interaction::CourseView { course_id, area } => {
            bump_area(interest, area, COURSE_VIEW_POINTS);
            push_recent(&mut interest.viewed_courses, course_id.trim(), MAX_VIEWED_COURSES, |a, b| a == b);
        }
        Interaction::Search { term } => {
            push_recent(&mut interest.search_terms, term.trim(), MAX_SEARCH_TERMS, |a, b| {
                a.to_lowercase() == b.to_lowercase()
            });
        }
        Interaction::EventRegistration { area } => bump_area(interest, area, REGISTRATION_POINTS),
    }
    interest.updated_at = Some(now);
}

/// Area keys are compared trimmed and lower-cased everywhere.
pub fn normalize_area(area: &str) -> String {
    area.trim().to_lowercase()
}

fn bump_area(interest: &mut UserInterest, area: &str, points: i64) {
    let area = normalize_area(area);
    if area.is_empty() {
        return;
    }
    *interest.area_scores.entry(area).or_insert(0) += points;
}

// Most recent entry last; a repeated value moves to the end.
fn push_recent(list: &mut Vec<String>, value: &str, cap: usize, same: impl Fn(&str, &str) -> bool) {
    if value.is_empty() {
        return;
    }
    list.retain(|existing| !same(existing, value));
    list.push(value.to_string());
    if list.len() > cap {
        let overflow = list.len() - cap;
        list.drain(..overflow);
    }
}
