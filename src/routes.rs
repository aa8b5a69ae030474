use crate::supabase::model::{Event, EventId};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Landing,
    Login,
    Home,
    Event(EventId),
    CheckIn(EventId),
    Organizer,
    CreateEvent,
    EditEvent(EventId),
    Settings,
    Notifications,
    Help,
    Profile,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No page at '{0}'")]
pub struct UnknownRoute(pub String);

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Landing => "/".to_string(),
            Route::Login => "/login".to_string(),
            Route::Home => "/home".to_string(),
            Route::Event(id) => format!("/event/{}", id),
            Route::CheckIn(id) => format!("/event/{}/checkin", id),
            Route::Organizer => "/organizer".to_string(),
            Route::CreateEvent => "/organizer/create".to_string(),
            Route::EditEvent(id) => format!("/organizer/edit/{}", id),
            Route::Settings => "/settings".to_string(),
            Route::Notifications => "/notifications".to_string(),
            Route::Help => "/help".to_string(),
            Route::Profile => "/profile".to_string(),
        }
    }

    pub fn url(&self, app_origin: &str) -> String {
        format!("{}{}", app_origin.trim_end_matches('/'), self.path())
    }

    /// Pages that redirect to the login page without a signed-in user.
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            Route::CheckIn(_)
                | Route::Organizer
                | Route::CreateEvent
                | Route::EditEvent(_)
                | Route::Settings
                | Route::Notifications
                | Route::Profile
        )
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path())
    }
}

impl FromStr for Route {
    type Err = UnknownRoute;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = s.split(['?', '#']).next().unwrap_or_default();
        let segments = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<&str>>();
        let unknown = || UnknownRoute(s.to_string());
        let id = |segment: &str| Uuid::parse_str(segment).map_err(|_| unknown());

        Ok(match segments.as_slice() {
            [] => Route::Landing,
            ["login"] => Route::Login,
            ["home"] => Route::Home,
            ["event", event_id] => Route::Event(id(*event_id)?),
            ["event", event_id, "checkin"] => Route::CheckIn(id(*event_id)?),
            ["organizer"] => Route::Organizer,
            ["organizer", "create"] => Route::CreateEvent,
            ["organizer", "edit", event_id] => Route::EditEvent(id(*event_id)?),
            ["settings"] => Route::Settings,
            ["notifications"] => Route::Notifications,
            ["help"] => Route::Help,
            ["profile"] => Route::Profile,
            _ => return Err(unknown()),
        })
    }
}

/// What the share sheet (or clipboard fallback) receives for an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePayload {
    pub title: String,
    pub text: String,
    pub url: String,
}

pub fn share_event(app_origin: &str, event: &Event) -> SharePayload {
    SharePayload {
        title: event.title.to_string(),
        text: if event.description.is_empty() {
            event.title.to_string()
        } else {
            event.description.to_string()
        },
        url: Route::Event(event.id).url(app_origin),
    }
}
