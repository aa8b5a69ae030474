use crate::supabase::model::{Category, Event, EventId, EventStatus, UserId};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::iter;
use strum::IntoEnumIterator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
pub enum CrowdLevel {
    Cozy,
    Lively,
    Buzzing,
    Packed,
}

impl CrowdLevel {
    /// Lowest attendance ratio for this level.
    pub fn threshold(&self) -> f64 {
        match self {
            CrowdLevel::Cozy => 0.3,
            CrowdLevel::Lively => 0.7,
            CrowdLevel::Buzzing => 0.9,
            CrowdLevel::Packed => 1.0,
        }
    }
}

/// How full an event is. Uncapped events are always cozy.
pub fn crowd_level(event: &Event) -> CrowdLevel {
    let Some(max_attendees) = event.max_attendees.filter(|max| *max > 0) else {
        return CrowdLevel::Cozy;
    };

    let ratio = event.attendees_count as f64 / max_attendees as f64;

    [CrowdLevel::Packed, CrowdLevel::Buzzing, CrowdLevel::Lively]
        .into_iter()
        .find(|level| ratio >= level.threshold())
        .unwrap_or(CrowdLevel::Cozy)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum DisplayStatus {
    Cancelled,
    Completed,
    Ended,
    Today,
    Upcoming,
}

/// Badge shown on event cards, relative to local time `now`.
pub fn display_status(event: &Event, now: NaiveDateTime) -> DisplayStatus {
    match event.status {
        EventStatus::Cancelled => return DisplayStatus::Cancelled,
        EventStatus::Completed => return DisplayStatus::Completed,
        EventStatus::Active => {}
    }

    if event.ends_at() < now {
        DisplayStatus::Ended
    } else if event.date == now.date() {
        DisplayStatus::Today
    } else {
        DisplayStatus::Upcoming
    }
}

/// Still worth showing: ongoing or not started yet.
pub fn is_upcoming(event: &Event, now: NaiveDateTime) -> bool {
    event.ends_at() > now || event.starts_at() > now
}

/// `Sat, Mar 1`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%a, %b %-d").to_string()
}

/// `Sat, Mar 1, 2025`
pub fn format_date_with_year(date: NaiveDate) -> String {
    date.format("%a, %b %-d, %Y").to_string()
}

/// `7:30 PM`
pub fn format_time(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// One entry of the category filter row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryChip {
    /// `None` for the leading "All Events" chip.
    pub category: Option<Category>,
    pub label: &'static str,
    pub icon: Option<char>,
    pub selected: bool,
}

pub fn category_chips(selected: Option<Category>) -> Vec<CategoryChip> {
    let all = CategoryChip {
        category: None,
        label: "All Events",
        icon: None,
        selected: selected.is_none(),
    };

    iter::once(all)
        .chain(Category::iter().map(|category| CategoryChip {
            category: Some(category),
            label: category.label(),
            icon: Some(category.icon()),
            selected: selected == Some(category),
        }))
        .collect()
}

/// Payload encoded in the attendee's check-in QR code.
pub fn check_in_code(event_id: EventId, user_id: UserId, at: DateTime<Utc>) -> String {
    format!(
        "bonfire-checkin-{}-{}-{}",
        event_id,
        user_id,
        at.timestamp_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn event(attendees_count: u32, max_attendees: Option<u32>) -> Event {
        let now = Utc::now();
        Event {
            id: Uuid::new_v4(),
            title: "Pub quiz".to_string(),
            description: String::new(),
            location: "O Bom O Mau e O Vilão".to_string(),
            coordinates: None,
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            time: NaiveTime::from_hms_opt(19, 30, 0).unwrap(),
            duration_minutes: 120,
            timezone: None,
            category: Category::Social,
            organizer_id: Uuid::new_v4(),
            organizer: None,
            attendees_count,
            max_attendees,
            image_url: None,
            tags: Vec::new(),
            status: EventStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test_log::test]
    fn crowd_level_should_follow_thresholds() {
        assert_eq!(crowd_level(&event(50, None)), CrowdLevel::Cozy);
        assert_eq!(crowd_level(&event(6, Some(10))), CrowdLevel::Cozy);
        assert_eq!(crowd_level(&event(7, Some(10))), CrowdLevel::Lively);
        assert_eq!(crowd_level(&event(9, Some(10))), CrowdLevel::Buzzing);
        assert_eq!(crowd_level(&event(12, Some(10))), CrowdLevel::Packed);
    }

    #[test_log::test]
    fn status_should_use_end_of_event() {
        let quiz = event(0, None);

        assert_eq!(display_status(&quiz, at(1, 10)), DisplayStatus::Today);
        assert_eq!(display_status(&quiz, at(1, 20)), DisplayStatus::Today);
        assert_eq!(display_status(&quiz, at(1, 22)), DisplayStatus::Ended);
        let day_before = NaiveDate::from_ymd_opt(2025, 2, 28)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(display_status(&quiz, day_before), DisplayStatus::Upcoming);
        assert!(is_upcoming(&quiz, at(1, 20)));
        assert!(!is_upcoming(&quiz, at(2, 0)));
    }

    #[test_log::test]
    fn cancelled_should_win_over_dates() {
        let quiz = Event {
            status: EventStatus::Cancelled,
            ..event(0, None)
        };

        assert_eq!(display_status(&quiz, at(5, 0)), DisplayStatus::Cancelled);
    }

    #[test_log::test]
    fn formatting_should_match_card_labels() {
        let quiz = event(0, None);

        assert_eq!(format_date(quiz.date), "Sat, Mar 1");
        assert_eq!(format_date_with_year(quiz.date), "Sat, Mar 1, 2025");
        assert_eq!(format_time(quiz.time), "7:30 PM");
    }

    #[test_log::test]
    fn capped_event_should_be_full_at_its_limit() {
        assert!(!event(50, None).is_full());
        assert!(!event(9, Some(10)).is_full());
        assert!(event(10, Some(10)).is_full());
    }

    #[test_log::test]
    fn category_chips_should_lead_with_all_events() {
        let chips = category_chips(Some(Category::Food));

        assert_eq!(chips.len(), 11);
        assert_eq!(chips[0].label, "All Events");
        assert!(!chips[0].selected);

        let selected = chips.iter().filter(|chip| chip.selected).collect::<Vec<_>>();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].category, Some(Category::Food));
        assert_eq!(selected[0].label, "Food & Drink");
        assert_eq!(selected[0].icon, Some('🍕'));

        assert!(category_chips(None)[0].selected);
    }

    #[test_log::test]
    fn check_in_code_should_embed_ids_and_millis() {
        let event_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let at = DateTime::from_timestamp_millis(1_740_857_400_123).unwrap();

        assert_eq!(
            check_in_code(event_id, user_id, at),
            format!("bonfire-checkin-{}-{}-1740857400123", event_id, user_id)
        );
    }
}
