use crate::geo::BoundingBox;
use crate::supabase::model::{
    Event, EventAttendee, EventId, EventUpdate, NewEvent, Session, UserId,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest_middleware::Error),
    #[error("Failed reading response: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Backend answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("Not found")]
    NotFound,
    #[error("Not signed in")]
    Unauthenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum OAuthProvider {
    Google,
}

/// Remote `events` / `event_attendees` tables.
#[allow(async_fn_in_trait)]
pub trait EventBackend {
    /// Active events, optionally restricted to a bounding box.
    async fn fetch_events(&self, bounds: Option<BoundingBox>) -> Result<Vec<Event>, BackendError>;

    async fn fetch_event(&self, id: EventId) -> Result<Event, BackendError>;

    async fn create_event(&self, event: &NewEvent) -> Result<Event, BackendError>;

    async fn update_event(&self, id: EventId, update: &EventUpdate) -> Result<(), BackendError>;

    async fn delete_event(&self, id: EventId) -> Result<(), BackendError>;

    async fn insert_attendee(&self, event_id: EventId, user_id: UserId)
        -> Result<(), BackendError>;

    async fn delete_attendee(&self, event_id: EventId, user_id: UserId)
        -> Result<(), BackendError>;

    async fn find_attendee(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Option<EventAttendee>, BackendError>;

    async fn check_in(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<EventAttendee, BackendError>;
}

/// Hosted auth service.
#[allow(async_fn_in_trait)]
pub trait AuthBackend {
    async fn current_session(&self) -> Result<Option<Session>, BackendError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError>;

    /// `None` when the account still needs e-mail confirmation.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Option<Session>, BackendError>;

    async fn sign_out(&self) -> Result<(), BackendError>;

    fn oauth_url(&self, provider: OAuthProvider, redirect_to: &str) -> String;
}
