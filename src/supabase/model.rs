use crate::geo::LatLng;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type EventId = Uuid;
pub type UserId = Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub description: String,
    pub location: String,
    pub coordinates: Option<LatLng>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: i64,
    pub timezone: Option<String>,
    pub category: Category,
    pub organizer_id: UserId,
    pub organizer: Option<User>,
    pub attendees_count: u32,
    pub max_attendees: Option<u32>,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.starts_at() + Duration::minutes(self.duration_minutes.max(0))
    }

    /// At or over its attendee cap. Uncapped events are never full.
    pub fn is_full(&self) -> bool {
        self.max_attendees
            .is_some_and(|max| self.attendees_count >= max)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    Social,
    Music,
    Sports,
    Food,
    Art,
    Education,
    Networking,
    Outdoor,
    Technology,
    Wellness,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Social => "Social",
            Category::Music => "Music",
            Category::Sports => "Sports",
            Category::Food => "Food & Drink",
            Category::Art => "Art & Culture",
            Category::Education => "Education",
            Category::Networking => "Networking",
            Category::Outdoor => "Outdoor",
            Category::Technology => "Technology",
            Category::Wellness => "Wellness",
        }
    }

    pub fn icon(&self) -> char {
        match self {
            Category::Social => '🎉',
            Category::Music => '🎵',
            Category::Sports => '⚽',
            Category::Food => '🍕',
            Category::Art => '🎨',
            Category::Education => '📚',
            Category::Networking => '🤝',
            Category::Outdoor => '🌲',
            Category::Technology => '💻',
            Category::Wellness => '🧘',
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Active,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

/// A signed-in session as returned by the auth service.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventAttendee {
    pub id: Uuid,
    pub event_id: EventId,
    pub user_id: UserId,
    pub checked_in: bool,
    pub check_in_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Row inserted into `events`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub date: NaiveDate,
    #[serde(with = "time_format")]
    pub time: NaiveTime,
    #[serde(rename = "duration")]
    pub duration_minutes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    pub category: Category,
    pub organizer_id: UserId,
    pub attendees_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attendees: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub status: EventStatus,
}

/// Partial update of an event; unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none", with = "optional_time_format")]
    pub time: Option<NaiveTime>,
    #[serde(rename = "duration", skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// `Some(None)` clears the cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attendees: Option<Option<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
}

impl EventUpdate {
    pub fn apply_to(&self, event: &mut Event) {
        if let Some(title) = &self.title {
            event.title = title.clone();
        }
        if let Some(description) = &self.description {
            event.description = description.clone();
        }
        if let Some(location) = &self.location {
            event.location = location.clone();
        }
        if let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) {
            event.coordinates = Some(LatLng::new(latitude, longitude));
        }
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(time) = self.time {
            event.time = time;
        }
        if let Some(duration) = self.duration_minutes {
            event.duration_minutes = duration;
        }
        if let Some(category) = self.category {
            event.category = category;
        }
        if let Some(max_attendees) = self.max_attendees {
            event.max_attendees = max_attendees;
        }
        if let Some(tags) = &self.tags {
            event.tags = tags.clone();
        }
        if let Some(status) = self.status {
            event.status = status;
        }
    }
}

const TIME_FORMAT: &str = "%H:%M:%S";

mod time_format {
    use super::TIME_FORMAT;
    use chrono::NaiveTime;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format(TIME_FORMAT).to_string())
    }
}

mod optional_time_format {
    use super::TIME_FORMAT;
    use chrono::NaiveTime;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(time) => s.serialize_str(&time.format(TIME_FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }
}
