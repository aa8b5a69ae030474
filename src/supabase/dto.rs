use super::model::{Category, Event, EventAttendee, EventStatus, Session, User};
use crate::geo::LatLng;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{de, Deserialize, Deserializer};
use serde_either::SingleOrVec;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

lazy_static! {
    pub(crate) static ref TAG_SEPARATOR: Regex = Regex::new(r"\s*,\s*").expect("Invalid tag separator regex");
}

// Note: text columns that may be null use the lenient string deserializer
#[derive(Debug, Deserialize)]
pub struct EventRow {
    pub id: Uuid,
    #[serde(deserialize_with = "deserialize_str")]
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_str")]
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_str")]
    pub location: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub date: NaiveDate,
    #[serde(deserialize_with = "deserialize_time")]
    pub time: NaiveTime,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub timezone: Option<String>,
    pub category: Category,
    pub organizer_id: Uuid,
    #[serde(default)]
    pub organizer: Option<ProfileRow>,
    #[serde(default)]
    pub attendees_count: i64,
    #[serde(default)]
    pub max_attendees: Option<i64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Option<SingleOrVec<String>>,
    #[serde(default)]
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventRow {
    #[tracing::instrument(skip(self), fields(self.id = %self.id))]
    pub fn to_model(&self) -> Event {
        let coordinates = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(LatLng::new(latitude, longitude)),
            _ => None,
        };

        let attendees_count = u32::try_from(self.attendees_count).unwrap_or_else(|_| {
            warn!(
                "Attendee count {} out of range (using 0)",
                self.attendees_count
            );
            0
        });

        Event {
            id: self.id,
            title: self.title.to_string(),
            description: self.description.to_string(),
            location: self.location.to_string(),
            coordinates,
            date: self.date,
            time: self.time,
            duration_minutes: self.duration.unwrap_or(0),
            timezone: self.timezone.clone(),
            category: self.category,
            organizer_id: self.organizer_id,
            organizer: self.organizer.as_ref().map(ProfileRow::to_model),
            attendees_count,
            max_attendees: self
                .max_attendees
                .and_then(|max| u32::try_from(max).ok())
                .filter(|max| *max > 0),
            image_url: self.image_url.clone().filter(|url| !url.is_empty()),
            tags: self.tags.clone().map(Self::tags_to_model).unwrap_or_default(),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn tags_to_model(tags: SingleOrVec<String>) -> Vec<String> {
        let tags = match tags {
            SingleOrVec::Single(tags) => TAG_SEPARATOR
                .split(tags.trim())
                .map(|tag| tag.to_string())
                .collect(),
            SingleOrVec::Vec(tags) => tags,
        };

        tags.into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct ProfileRow {
    pub id: Uuid,
    #[serde(default, deserialize_with = "deserialize_str")]
    pub email: String,
    #[serde(default, deserialize_with = "deserialize_str")]
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl ProfileRow {
    pub fn to_model(&self) -> User {
        User {
            id: self.id,
            email: self.email.to_string(),
            name: self.name.to_string(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AttendeeRow {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub checked_in: bool,
    #[serde(default)]
    pub check_in_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AttendeeRow {
    pub fn to_model(&self) -> EventAttendee {
        EventAttendee {
            id: self.id,
            event_id: self.event_id,
            user_id: self.user_id,
            checked_in: self.checked_in,
            check_in_time: self.check_in_time,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthUserResponse {
    pub id: Uuid,
    #[serde(default, deserialize_with = "deserialize_str")]
    pub email: String,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl AuthUserResponse {
    pub fn to_model(&self) -> User {
        let metadata = &self.user_metadata;
        let name = metadata
            .name
            .clone()
            .or_else(|| metadata.full_name.clone())
            .unwrap_or_else(|| {
                self.email
                    .split('@')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            });

        User {
            id: self.id,
            email: self.email.to_string(),
            name,
            avatar_url: metadata.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub user: AuthUserResponse,
}

impl SessionResponse {
    pub fn to_model(&self) -> Session {
        Session {
            access_token: self.access_token.to_string(),
            user: self.user.to_model(),
        }
    }
}

/// Sign-up answers with a session when e-mail confirmation is off, or just the user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    Session(SessionResponse),
    User(AuthUserResponse),
}

fn deserialize_str<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s.parse().map_err(de::Error::custom)?,
        _ => String::new(),
    })
}

fn deserialize_time<'de, D>(d: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(d)? {
        Value::String(s) => parse_time(&s)
            .ok_or_else(|| de::Error::custom(format!("Invalid time '{}'", s))),
        unknown => Err(de::Error::custom(format!(
            "Found an unknown data type: {}",
            unknown
        ))),
    }
}

/// Accepts `HH:MM` and `HH:MM:SS`, the two shapes the `time` column comes back in.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}
