use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;
use url::Url;

use super::{CalendarGateway, InsertedEvent};
use crate::error::{google_calendar_error, CalResult};
use crate::models::EventRecord;

pub const GOOGLE_CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Debug, Deserialize)]
struct InsertResponse {
    id: String,
    #[serde(rename = "htmlLink")]
    html_link: Option<String>,
}

/// Calendar gateway backed by the Google Calendar v3 REST API
#[derive(Clone)]
pub struct GoogleCalendarClient {
    client: Client,
    base_url: String,
    calendar_id: String,
}

impl GoogleCalendarClient {
    pub fn new(calendar_id: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: GOOGLE_CALENDAR_API.to_string(),
            calendar_id: calendar_id.to_string(),
        }
    }

    /// Use a different API root
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    fn events_url(&self) -> CalResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| google_calendar_error(&format!("Failed to parse URL: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| google_calendar_error("Calendar API URL cannot have a path"))?
            .pop_if_empty()
            .extend(["calendars", self.calendar_id.as_str(), "events"]);

        Ok(url)
    }
}

#[async_trait]
impl CalendarGateway for GoogleCalendarClient {
    async fn insert_event(&self, access_token: &str, event: &EventRecord) -> CalResult<InsertedEvent> {
        let url = self.events_url()?;

        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to insert event: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(google_calendar_error(&format!(
                "Failed to insert event: HTTP {} - {}",
                status, error_body
            )));
        }

        let created: InsertResponse = response
            .json()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse insert response: {}", e)))?;

        info!(
            "Created event: {}",
            created.html_link.as_deref().unwrap_or(&created.id)
        );

        Ok(InsertedEvent {
            id: created.id,
            html_link: created.html_link,
        })
    }
}
