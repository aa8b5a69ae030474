use super::dto::{AttendeeRow, AuthUserResponse, EventRow, SessionResponse, SignUpResponse};
use super::model::{Event, EventAttendee, EventId, EventUpdate, NewEvent, Session, UserId};
use super::query::{TableQuery, ATTENDEES_TABLE, EVENTS_TABLE, EVENT_COLUMNS};
use crate::backend::{AuthBackend, BackendError, EventBackend, OAuthProvider};
use crate::config::model::SupabaseConfig;
use crate::geo::BoundingBox;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_REPRESENTATION: &str = "return=representation";

/// REST access to a Supabase project: PostgREST tables and GoTrue auth.
pub struct SupabaseClient {
    http: ClientWithMiddleware,
    base_url: String,
    anon_key: String,
    access_token: RwLock<Option<String>>,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Self {
        let http = ClientBuilder::new(Client::new())
            .with(RetryTransientMiddleware::new_with_policy(
                ExponentialBackoff::builder().build_with_max_retries(config.max_retries),
            ))
            .build();

        Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.to_string(),
            access_token: RwLock::new(None),
        }
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self.access_token.read().await;

        request
            .header("apikey", &self.anon_key)
            .bearer_auth(token.as_deref().unwrap_or(self.anon_key.as_str()))
    }

    async fn send(request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        error!("Request failed with {}: {}", status, message);

        Err(match status {
            StatusCode::NOT_ACCEPTABLE | StatusCode::NOT_FOUND => BackendError::NotFound,
            StatusCode::UNAUTHORIZED => BackendError::Unauthenticated,
            _ => BackendError::Status {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
        let body = response.text().await?;

        serde_json::from_str::<T>(&body).map_err(|e| {
            error!("Response parse failed: {:?}", e);
            BackendError::InvalidResponse(e)
        })
    }

    #[instrument(skip(self, query), fields(query = %query))]
    pub async fn select<T: DeserializeOwned>(
        &self,
        query: &TableQuery,
    ) -> Result<Vec<T>, BackendError> {
        let request = self
            .http
            .get(self.rest_url(query.table()))
            .query(&query.params());
        let response = Self::send(self.authorized(request).await).await?;

        Self::parse(response).await
    }

    /// Exactly one row; zero rows is `NotFound`.
    #[instrument(skip(self, query), fields(query = %query))]
    pub async fn select_single<T: DeserializeOwned>(
        &self,
        query: &TableQuery,
    ) -> Result<T, BackendError> {
        let request = self
            .http
            .get(self.rest_url(query.table()))
            .query(&query.params())
            .header("Accept", SINGLE_OBJECT);
        let response = Self::send(self.authorized(request).await).await?;

        Self::parse(response).await
    }

    #[instrument(skip(self, row))]
    pub async fn insert<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &'static str,
        row: &B,
    ) -> Result<T, BackendError> {
        let request = self
            .http
            .post(self.rest_url(table))
            .header("Prefer", RETURN_REPRESENTATION)
            .header("Accept", SINGLE_OBJECT)
            .json(row);
        let response = Self::send(self.authorized(request).await).await?;

        Self::parse(response).await
    }

    #[instrument(skip(self, query, changes), fields(query = %query))]
    pub async fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        query: &TableQuery,
        changes: &B,
    ) -> Result<Vec<T>, BackendError> {
        let request = self
            .http
            .patch(self.rest_url(query.table()))
            .query(&query.params())
            .header("Prefer", RETURN_REPRESENTATION)
            .json(changes);
        let response = Self::send(self.authorized(request).await).await?;

        Self::parse(response).await
    }

    #[instrument(skip(self, query), fields(query = %query))]
    pub async fn delete(&self, query: &TableQuery) -> Result<(), BackendError> {
        let request = self
            .http
            .delete(self.rest_url(query.table()))
            .query(&query.params());
        Self::send(self.authorized(request).await).await?;

        Ok(())
    }

    async fn store_session(&self, session: &Session) {
        *self.access_token.write().await = Some(session.access_token.to_string());
    }
}

impl EventBackend for SupabaseClient {
    async fn fetch_events(&self, bounds: Option<BoundingBox>) -> Result<Vec<Event>, BackendError> {
        let mut query = TableQuery::from(EVENTS_TABLE)
            .select(EVENT_COLUMNS)
            .eq("status", "active");

        match &bounds {
            None => {
                info!("Getting all active events");
            }
            Some(bounds) => {
                info!("Getting active events within {:?}", bounds);
                query = query.within(bounds);
            }
        }

        let rows: Vec<EventRow> = self.select(&query).await?;

        Ok(rows.iter().map(EventRow::to_model).collect())
    }

    async fn fetch_event(&self, id: EventId) -> Result<Event, BackendError> {
        let query = TableQuery::from(EVENTS_TABLE)
            .select(EVENT_COLUMNS)
            .eq("id", id);

        let row: EventRow = self.select_single(&query).await?;

        Ok(row.to_model())
    }

    async fn create_event(&self, event: &NewEvent) -> Result<Event, BackendError> {
        let row: EventRow = self.insert(EVENTS_TABLE, event).await?;
        info!("Created event {}", row.id);

        Ok(row.to_model())
    }

    async fn update_event(&self, id: EventId, update: &EventUpdate) -> Result<(), BackendError> {
        let query = TableQuery::from(EVENTS_TABLE).eq("id", id);
        let rows: Vec<EventRow> = self.update(&query, update).await?;

        if rows.is_empty() {
            return Err(BackendError::NotFound);
        }

        Ok(())
    }

    async fn delete_event(&self, id: EventId) -> Result<(), BackendError> {
        self.delete(&TableQuery::from(EVENTS_TABLE).eq("id", id))
            .await
    }

    async fn insert_attendee(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<(), BackendError> {
        let _: AttendeeRow = self
            .insert(
                ATTENDEES_TABLE,
                &json!({ "event_id": event_id, "user_id": user_id }),
            )
            .await?;

        Ok(())
    }

    async fn delete_attendee(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<(), BackendError> {
        let query = TableQuery::from(ATTENDEES_TABLE)
            .eq("event_id", event_id)
            .eq("user_id", user_id);

        self.delete(&query).await
    }

    async fn find_attendee(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Option<EventAttendee>, BackendError> {
        let query = TableQuery::from(ATTENDEES_TABLE)
            .select("*")
            .eq("event_id", event_id)
            .eq("user_id", user_id)
            .limit(1);

        let rows: Vec<AttendeeRow> = self.select(&query).await?;

        Ok(rows.first().map(AttendeeRow::to_model))
    }

    async fn check_in(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<EventAttendee, BackendError> {
        let query = TableQuery::from(ATTENDEES_TABLE)
            .eq("event_id", event_id)
            .eq("user_id", user_id);
        let changes = json!({ "checked_in": true, "check_in_time": Utc::now() });

        let rows: Vec<AttendeeRow> = self.update(&query, &changes).await?;

        rows.first()
            .map(AttendeeRow::to_model)
            .ok_or(BackendError::NotFound)
    }
}

impl AuthBackend for SupabaseClient {
    async fn current_session(&self) -> Result<Option<Session>, BackendError> {
        let Some(token) = self.access_token.read().await.clone() else {
            debug!("No stored session");
            return Ok(None);
        };

        let request = self
            .http
            .get(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(&token);

        match Self::send(request).await {
            Ok(response) => {
                let user: AuthUserResponse = Self::parse(response).await?;
                Ok(Some(Session {
                    access_token: token,
                    user: user.to_model(),
                }))
            }
            Err(BackendError::Unauthenticated) => {
                info!("Stored session expired");
                *self.access_token.write().await = None;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let request = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }));

        let response: SessionResponse = Self::parse(Self::send(request).await?).await?;
        let session = response.to_model();
        self.store_session(&session).await;

        Ok(session)
    }

    #[instrument(skip(self, password))]
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Option<Session>, BackendError> {
        let request = self
            .http
            .post(self.auth_url("signup"))
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password, "data": { "name": name } }));

        match Self::parse::<SignUpResponse>(Self::send(request).await?).await? {
            SignUpResponse::Session(response) => {
                let session = response.to_model();
                self.store_session(&session).await;
                Ok(Some(session))
            }
            SignUpResponse::User(user) => {
                info!("User {} must confirm their e-mail", user.id);
                Ok(None)
            }
        }
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let request = self.authorized(self.http.post(self.auth_url("logout"))).await;
        let result = Self::send(request).await;

        *self.access_token.write().await = None;

        result.map(|_| ())
    }

    fn oauth_url(&self, provider: OAuthProvider, redirect_to: &str) -> String {
        let provider: &'static str = provider.into();

        match reqwest::Url::parse_with_params(
            &self.auth_url("authorize"),
            &[("provider", provider), ("redirect_to", redirect_to)],
        ) {
            Ok(url) => url.to_string(),
            Err(err) => {
                error!("Invalid auth URL: {}", err);
                self.auth_url("authorize")
            }
        }
    }
}
