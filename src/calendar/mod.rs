pub mod google;
pub mod oauth;

pub use google::GoogleCalendarClient;
pub use oauth::{Credentials, OAuthClient};

use async_trait::async_trait;

use crate::error::CalResult;
use crate::models::EventRecord;

/// An event as created by the calendar service
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct InsertedEvent {
    pub id: String,
    #[serde(rename = "htmlLink")]
    pub html_link: Option<String>,
}

/// Something that can put an event into a user's calendar
#[async_trait]
pub trait CalendarGateway: Send + Sync + 'static {
    /// Insert `event` on behalf of the user owning `access_token`
    async fn insert_event(&self, access_token: &str, event: &EventRecord) -> CalResult<InsertedEvent>;
}
