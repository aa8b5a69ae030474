use crate::geo::LatLng;
use crate::supabase::dto::{parse_time, TAG_SEPARATOR};
use crate::supabase::model::{Category, Event, EventStatus, EventUpdate, NewEvent, UserId};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use itertools::Itertools;
use thiserror::Error;

pub const DEFAULT_DURATION_MINUTES: i64 = 120;
pub const MAX_EVENT_DAYS: i64 = 7;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationWarning {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("'{0}' is not a valid date")]
    InvalidDate(String),
    #[error("'{0}' is not a valid time")]
    InvalidTime(String),
    #[error("'{0}' is not a known category")]
    UnknownCategory(String),
    #[error("Max attendees must be a positive number")]
    InvalidCapacity,
    #[error("End time must be after start time")]
    EndBeforeStart,
    #[error("Events can last at most 7 days")]
    TooLong,
    #[error("Location coordinates are out of range")]
    InvalidCoordinates,
}

/// Raw create/edit form input, as typed by the organizer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub location: String,
    pub latitude: String,
    pub longitude: String,
    pub date: String,
    pub time: String,
    /// End date and time; both blank means the default duration.
    pub end_date: String,
    pub end_time: String,
    pub category: String,
    pub max_attendees: String,
    pub image_url: String,
    /// Comma separated.
    pub tags: String,
}

/// A draft that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEvent {
    pub title: String,
    pub description: String,
    pub location: String,
    pub coordinates: LatLng,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: i64,
    pub category: Category,
    pub max_attendees: Option<u32>,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
}

impl EventDraft {
    /// Prefills an edit form, deriving the end from the stored duration.
    pub fn from_event(event: &Event) -> Self {
        let end = event.ends_at();

        Self {
            title: event.title.to_string(),
            description: event.description.to_string(),
            location: event.location.to_string(),
            latitude: event
                .coordinates
                .map(|coordinates| coordinates.latitude.to_string())
                .unwrap_or_default(),
            longitude: event
                .coordinates
                .map(|coordinates| coordinates.longitude.to_string())
                .unwrap_or_default(),
            date: event.date.format(DATE_FORMAT).to_string(),
            time: event.time.format("%H:%M").to_string(),
            end_date: end.date().format(DATE_FORMAT).to_string(),
            end_time: end.time().format("%H:%M").to_string(),
            category: event.category.to_string(),
            max_attendees: event
                .max_attendees
                .map(|max| max.to_string())
                .unwrap_or_default(),
            image_url: event.image_url.clone().unwrap_or_default(),
            tags: event.tags.join(", "),
        }
    }

    /// Checks every field and reports all problems at once.
    pub fn validate(&self) -> Result<ValidatedEvent, Vec<ValidationWarning>> {
        let mut warnings = Vec::new();

        let title = required(&self.title, "Title", &mut warnings);
        let location = required(&self.location, "Location", &mut warnings);
        let date = required(&self.date, "Date", &mut warnings).and_then(|date| {
            parse_date(date)
                .ok_or_else(|| warnings.push(ValidationWarning::InvalidDate(date.to_string())))
                .ok()
        });
        let time = required(&self.time, "Time", &mut warnings).and_then(|time| {
            parse_time(time)
                .ok_or_else(|| warnings.push(ValidationWarning::InvalidTime(time.to_string())))
                .ok()
        });
        let category = required(&self.category, "Category", &mut warnings).and_then(|category| {
            category
                .to_lowercase()
                .parse::<Category>()
                .map_err(|_| warnings.push(ValidationWarning::UnknownCategory(category.to_string())))
                .ok()
        });

        let coordinates = self.coordinates(&mut warnings);
        let max_attendees = self.max_attendees(&mut warnings);
        let end = self.end(&mut warnings);

        let duration_minutes = match (date, time, end) {
            (Some(date), Some(time), Some(Some(end))) => {
                duration_between(date.and_time(time), end, &mut warnings)
            }
            (_, _, Some(None)) => Some(DEFAULT_DURATION_MINUTES),
            _ => None,
        };

        if !warnings.is_empty() {
            return Err(warnings);
        }

        match (title, location, date, time, category, coordinates, duration_minutes) {
            (
                Some(title),
                Some(location),
                Some(date),
                Some(time),
                Some(category),
                Some(coordinates),
                Some(duration_minutes),
            ) => Ok(ValidatedEvent {
                title: title.to_string(),
                description: self.description.trim().to_string(),
                location: location.to_string(),
                coordinates,
                date,
                time,
                duration_minutes,
                category,
                max_attendees,
                image_url: Some(self.image_url.trim().to_string()).filter(|url| !url.is_empty()),
                tags: parse_tags(&self.tags),
            }),
            _ => Err(warnings),
        }
    }

    fn coordinates(&self, warnings: &mut Vec<ValidationWarning>) -> Option<LatLng> {
        let latitude = required(&self.latitude, "Latitude", warnings)?;
        let longitude = required(&self.longitude, "Longitude", warnings)?;

        let coordinates = match (latitude.parse(), longitude.parse()) {
            (Ok(latitude), Ok(longitude)) => LatLng::new(latitude, longitude),
            _ => {
                warnings.push(ValidationWarning::InvalidCoordinates);
                return None;
            }
        };

        if !coordinates.is_valid() {
            warnings.push(ValidationWarning::InvalidCoordinates);
            return None;
        }

        Some(coordinates)
    }

    fn max_attendees(&self, warnings: &mut Vec<ValidationWarning>) -> Option<u32> {
        let max_attendees = self.max_attendees.trim();
        if max_attendees.is_empty() {
            return None;
        }

        match max_attendees.parse::<u32>() {
            Ok(max) if max > 0 => Some(max),
            _ => {
                warnings.push(ValidationWarning::InvalidCapacity);
                None
            }
        }
    }

    /// `Some(None)` when no end was given, `None` when the given end is malformed.
    fn end(&self, warnings: &mut Vec<ValidationWarning>) -> Option<Option<NaiveDateTime>> {
        let end_date = self.end_date.trim();
        let end_time = self.end_time.trim();

        if end_date.is_empty() && end_time.is_empty() {
            return Some(None);
        }

        let date = match parse_date(end_date) {
            Some(date) => Some(date),
            None if end_date.is_empty() => {
                warnings.push(ValidationWarning::MissingField("End date"));
                None
            }
            None => {
                warnings.push(ValidationWarning::InvalidDate(end_date.to_string()));
                None
            }
        };
        let time = match parse_time(end_time) {
            Some(time) => Some(time),
            None if end_time.is_empty() => {
                warnings.push(ValidationWarning::MissingField("End time"));
                None
            }
            None => {
                warnings.push(ValidationWarning::InvalidTime(end_time.to_string()));
                None
            }
        };

        Some(Some(date?.and_time(time?)))
    }
}

impl ValidatedEvent {
    pub fn into_new_event(self, organizer_id: UserId) -> NewEvent {
        NewEvent {
            title: self.title,
            description: self.description,
            location: self.location,
            latitude: self.coordinates.latitude,
            longitude: self.coordinates.longitude,
            date: self.date,
            time: self.time,
            duration_minutes: self.duration_minutes,
            timezone: None,
            category: self.category,
            organizer_id,
            attendees_count: 0,
            max_attendees: self.max_attendees,
            image_url: self.image_url,
            tags: self.tags,
            status: EventStatus::Active,
        }
    }

    /// Every editable field, with a blank cap clearing the existing one.
    pub fn into_update(self) -> EventUpdate {
        EventUpdate {
            title: Some(self.title),
            description: Some(self.description),
            location: Some(self.location),
            latitude: Some(self.coordinates.latitude),
            longitude: Some(self.coordinates.longitude),
            date: Some(self.date),
            time: Some(self.time),
            duration_minutes: Some(self.duration_minutes),
            category: Some(self.category),
            max_attendees: Some(self.max_attendees),
            tags: Some(self.tags),
            status: None,
        }
    }
}

fn required<'a>(
    value: &'a str,
    name: &'static str,
    warnings: &mut Vec<ValidationWarning>,
) -> Option<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        warnings.push(ValidationWarning::MissingField(name));
        None
    } else {
        Some(value)
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

fn duration_between(
    start: NaiveDateTime,
    end: NaiveDateTime,
    warnings: &mut Vec<ValidationWarning>,
) -> Option<i64> {
    if end <= start {
        warnings.push(ValidationWarning::EndBeforeStart);
        return None;
    }
    if end - start > Duration::days(MAX_EVENT_DAYS) {
        warnings.push(ValidationWarning::TooLong);
        return None;
    }

    Some((end - start).num_minutes())
}

/// Splits on commas, dropping blanks and repeats.
pub fn parse_tags(tags: &str) -> Vec<String> {
    TAG_SEPARATOR
        .split(tags.trim())
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .unique_by(|tag| tag.to_lowercase())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> EventDraft {
        EventDraft {
            title: "Rooftop jazz".to_string(),
            description: " Bring a blanket ".to_string(),
            location: "Terraço do Carmo".to_string(),
            latitude: "38.7121".to_string(),
            longitude: "-9.1405".to_string(),
            date: "2025-08-02".to_string(),
            time: "21:00".to_string(),
            end_date: "2025-08-02".to_string(),
            end_time: "23:30".to_string(),
            category: "Music".to_string(),
            max_attendees: "80".to_string(),
            image_url: String::new(),
            tags: "jazz, live,, Jazz , rooftop".to_string(),
        }
    }

    #[test_log::test]
    fn valid_draft_should_convert_end_to_duration() {
        let event = draft().validate().unwrap();

        assert_eq!(event.duration_minutes, 150);
        assert_eq!(event.category, Category::Music);
        assert_eq!(event.max_attendees, Some(80));
        assert_eq!(event.description, "Bring a blanket");
        assert_eq!(event.tags, vec!["jazz", "live", "rooftop"]);
        assert_eq!(event.image_url, None);
    }

    #[test_log::test]
    fn blank_end_should_use_default_duration() {
        let event = EventDraft {
            end_date: String::new(),
            end_time: " ".to_string(),
            ..draft()
        }
        .validate()
        .unwrap();

        assert_eq!(event.duration_minutes, DEFAULT_DURATION_MINUTES);
    }

    #[test_log::test]
    fn end_before_start_should_be_rejected() {
        let warnings = EventDraft {
            end_time: "20:00".to_string(),
            ..draft()
        }
        .validate()
        .unwrap_err();

        assert_eq!(warnings, vec![ValidationWarning::EndBeforeStart]);
        assert_eq!(warnings[0].to_string(), "End time must be after start time");
    }

    #[test_log::test]
    fn events_longer_than_a_week_should_be_rejected() {
        let warnings = EventDraft {
            end_date: "2025-08-10".to_string(),
            ..draft()
        }
        .validate()
        .unwrap_err();

        assert_eq!(warnings, vec![ValidationWarning::TooLong]);
    }

    #[test_log::test]
    fn every_problem_should_be_reported_at_once() {
        let warnings = EventDraft {
            title: "  ".to_string(),
            category: "karaoke".to_string(),
            max_attendees: "0".to_string(),
            latitude: "120".to_string(),
            ..draft()
        }
        .validate()
        .unwrap_err();

        assert_eq!(
            warnings,
            vec![
                ValidationWarning::MissingField("Title"),
                ValidationWarning::UnknownCategory("karaoke".to_string()),
                ValidationWarning::InvalidCoordinates,
                ValidationWarning::InvalidCapacity,
            ]
        );
    }

    #[test_log::test]
    fn draft_from_event_should_validate_to_the_same_values() {
        let validated = draft().validate().unwrap();
        let new_event = validated.clone().into_new_event(uuid::Uuid::new_v4());
        let now = chrono::Utc::now();
        let event = Event {
            id: uuid::Uuid::new_v4(),
            title: new_event.title,
            description: new_event.description,
            location: new_event.location,
            coordinates: Some(validated.coordinates),
            date: new_event.date,
            time: new_event.time,
            duration_minutes: new_event.duration_minutes,
            timezone: None,
            category: new_event.category,
            organizer_id: new_event.organizer_id,
            organizer: None,
            attendees_count: 3,
            max_attendees: new_event.max_attendees,
            image_url: None,
            tags: new_event.tags,
            status: EventStatus::Active,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(EventDraft::from_event(&event).validate(), Ok(validated));
    }

    #[test_log::test]
    fn update_should_clear_a_removed_cap() {
        let update = EventDraft {
            max_attendees: String::new(),
            ..draft()
        }
        .validate()
        .unwrap()
        .into_update();

        assert_eq!(update.max_attendees, Some(None));
        assert_eq!(update.status, None);
    }
}
