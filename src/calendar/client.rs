use crate::calendar::models::{CalendarEvent, EventPayload};
use crate::calendar::token::TokenManager;
use crate::error::{calendar_error, Error, SyncResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

const API_BASE: &str = "https://www.googleapis.com/calendar/v3/calendars";

/// The calendar provider contract: list, insert, update and delete of
/// time-bounded events. Consumed by the sync orchestrator; mocked in tests.
#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// All events between `time_min` and `time_max` (RFC 3339)
    async fn list(
        &self,
        calendar_id: &str,
        time_min: &str,
        time_max: &str,
    ) -> SyncResult<Vec<CalendarEvent>>;

    async fn insert(&self, calendar_id: &str, body: &EventPayload) -> SyncResult<CalendarEvent>;

    async fn update(
        &self,
        calendar_id: &str,
        event_id: &str,
        body: &EventPayload,
    ) -> SyncResult<CalendarEvent>;

    async fn delete(&self, calendar_id: &str, event_id: &str) -> SyncResult<()>;
}

/// Google Calendar REST implementation
pub struct GoogleCalendarClient {
    client: Client,
    token_manager: TokenManager,
}

impl GoogleCalendarClient {
    pub fn new(token_manager: TokenManager) -> Self {
        Self {
            client: Client::new(),
            token_manager,
        }
    }

    fn events_url(calendar_id: &str) -> SyncResult<Url> {
        let url_str = format!("{}/{}/events", API_BASE, calendar_id);
        Url::parse(&url_str).map_err(|e| calendar_error(&format!("Failed to parse URL: {}", e)))
    }

    /// Map a non-success response to the sync error taxonomy
    async fn triage(operation: &str, response: reqwest::Response) -> Error {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Could not read error response".to_string());

        if status == StatusCode::TOO_MANY_REQUESTS
            || (status == StatusCode::FORBIDDEN && body.contains("ateLimitExceeded"))
        {
            return Error::RateLimit(format!("{}: HTTP {} - {}", operation, status, body));
        }
        if status == StatusCode::GONE {
            return Error::AlreadyDeleted(format!("{}: HTTP 410", operation));
        }
        if status == StatusCode::CONFLICT {
            return Error::DuplicateEvent(format!("{}: HTTP 409 - {}", operation, body));
        }

        calendar_error(&format!("{}: HTTP {} - {}", operation, status, body))
    }
}

#[async_trait]
impl CalendarApi for GoogleCalendarClient {
    async fn list(
        &self,
        calendar_id: &str,
        time_min: &str,
        time_max: &str,
    ) -> SyncResult<Vec<CalendarEvent>> {
        let access_token = self.token_manager.access_token().await?;

        let mut url = Self::events_url(calendar_id)?;
        url.query_pairs_mut()
            .append_pair("timeMin", time_min)
            .append_pair("timeMax", time_max)
            .append_pair("singleEvents", "true")
            .append_pair("orderBy", "startTime")
            .append_pair("maxResults", "2500");

        let response = self
            .client
            .get(url)
            .bearer_auth(&access_token)
            .send()
            .await
            .map_err(|e| calendar_error(&format!("Failed to fetch events: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::triage("list", response).await);
        }

        let response_data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| calendar_error(&format!("Failed to parse events response: {}", e)))?;

        let items = response_data
            .get("items")
            .and_then(|i| i.as_array())
            .cloned()
            .unwrap_or_default();

        let events = items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<CalendarEvent>(item).ok())
            .collect::<Vec<_>>();

        debug!("Listed {} events in window", events.len());
        Ok(events)
    }

    async fn insert(&self, calendar_id: &str, body: &EventPayload) -> SyncResult<CalendarEvent> {
        let access_token = self.token_manager.access_token().await?;
        let url = Self::events_url(calendar_id)?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| calendar_error(&format!("Failed to insert event: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::triage("insert", response).await);
        }

        response
            .json::<CalendarEvent>()
            .await
            .map_err(|e| calendar_error(&format!("Failed to parse insert response: {}", e)))
    }

    async fn update(
        &self,
        calendar_id: &str,
        event_id: &str,
        body: &EventPayload,
    ) -> SyncResult<CalendarEvent> {
        let access_token = self.token_manager.access_token().await?;
        let mut url = Self::events_url(calendar_id)?;
        url.path_segments_mut()
            .map_err(|_| calendar_error("Calendar URL cannot be a base"))?
            .push(event_id);

        let response = self
            .client
            .put(url)
            .bearer_auth(&access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| calendar_error(&format!("Failed to update event: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::triage("update", response).await);
        }

        response
            .json::<CalendarEvent>()
            .await
            .map_err(|e| calendar_error(&format!("Failed to parse update response: {}", e)))
    }

    async fn delete(&self, calendar_id: &str, event_id: &str) -> SyncResult<()> {
        let access_token = self.token_manager.access_token().await?;
        let mut url = Self::events_url(calendar_id)?;
        url.path_segments_mut()
            .map_err(|_| calendar_error("Calendar URL cannot be a base"))?
            .push(event_id);

        let response = self
            .client
            .delete(url)
            .bearer_auth(&access_token)
            .send()
            .await
            .map_err(|e| calendar_error(&format!("Failed to delete event: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::triage("delete", response).await);
        }

        Ok(())
    }
}
