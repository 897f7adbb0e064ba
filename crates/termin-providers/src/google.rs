//! Google Calendar API client.
//!
//! A read-only client for the Google Calendar API v3 events endpoint: it
//! fetches the organizer's events inside a time window and collapses them
//! into busy intervals. Cancelled events and events marked transparent
//! (free) are ignored.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{debug, warn};

use termin_core::TimeWindow;

use crate::busy::BusyInterval;
use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, CalendarProvider};

/// Base URL for Google Calendar API v3.
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Google Calendar busy-interval provider.
#[derive(Debug)]
pub struct GoogleCalendarProvider {
    http_client: reqwest::Client,
    access_token: String,
    calendar_id: String,
    /// Business timezone, used to expand all-day events to local days.
    timezone: Tz,
}

impl GoogleCalendarProvider {
    /// Creates a new Google Calendar provider.
    pub fn new(
        access_token: impl Into<String>,
        calendar_id: impl Into<String>,
        timezone: Tz,
        timeout: Duration,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to create HTTP client");

        Self {
            http_client,
            access_token: access_token.into(),
            calendar_id: calendar_id.into(),
            timezone,
        }
    }

    /// Updates the access token (after refresh).
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
    }

    /// Fetches all events in the window and converts them to busy intervals.
    async fn fetch_busy(&self, window: TimeWindow) -> ProviderResult<Vec<BusyInterval>> {
        let mut busy = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.list_events_page(&window, page_token.as_deref()).await?;

            for event in page.items {
                if let Some(interval) = convert_event(event, &self.timezone) {
                    busy.push(interval);
                }
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(
            calendar = %self.calendar_id,
            intervals = busy.len(),
            "fetched busy intervals"
        );
        Ok(busy)
    }

    /// Fetches a single page of events.
    async fn list_events_page(
        &self,
        window: &TimeWindow,
        page_token: Option<&str>,
    ) -> ProviderResult<EventListResponse> {
        let url = format!(
            "{}/calendars/{}/events",
            CALENDAR_API_BASE,
            urlencoding::encode(&self.calendar_id)
        );

        let mut request = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("timeMin", window.start.to_rfc3339()),
                ("timeMax", window.end.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ]);

        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token.to_string())]);
        }

        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "request timed out"
            } else if e.is_connect() {
                "connection failed"
            } else {
                "request failed"
            };
            ProviderError::network(message).with_source(e)
        })?;

        let status = response.status();

        // Handle rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return Err(ProviderError::rate_limited(format!(
                "rate limit exceeded{}",
                retry_after
                    .map(|s| format!(", retry after {} seconds", s))
                    .unwrap_or_default()
            )));
        }

        // Handle authentication errors
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::authentication(
                "access token expired or invalid",
            ));
        }

        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::authorization("access denied to calendar"));
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::not_found(format!(
                "calendar not found: {}",
                self.calendar_id
            )));
        }

        // Handle other errors
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::server(format!(
                "API error ({}): {}",
                status, body
            )));
        }

        // Parse response
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network("failed to read response").with_source(e))?;

        let list_response: EventListResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::invalid_response("failed to parse events response").with_source(e))?;

        Ok(list_response)
    }
}

impl CalendarProvider for GoogleCalendarProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn list_busy(&self, window: TimeWindow) -> BoxFuture<'_, ProviderResult<Vec<BusyInterval>>> {
        Box::pin(async move {
            self.fetch_busy(window)
                .await
                .map_err(|e| e.with_provider("google"))
        })
    }
}

/// Converts a Google Calendar API event to a busy interval.
///
/// Returns `None` for events that do not occupy the organizer: cancelled
/// events, transparent (free) events, and events with unparseable times.
fn convert_event(event: ApiEvent, tz: &Tz) -> Option<BusyInterval> {
    if event.status.as_deref() == Some("cancelled") {
        return None;
    }
    // "transparent" events are shown as free in Google Calendar.
    if event.transparency.as_deref() == Some("transparent") {
        return None;
    }

    let id = event.id.unwrap_or_default();

    match (
        parse_time(&event.start, &id, "start"),
        parse_time(&event.end, &id, "end"),
    ) {
        (Some(ApiTime::DateTime(start)), Some(ApiTime::DateTime(end))) => {
            Some(BusyInterval::new(start, end))
        }
        (Some(ApiTime::Date(start)), Some(ApiTime::Date(end))) => {
            Some(BusyInterval::from_all_day(start, end, tz))
        }
        // Mixed or missing boundaries never come out of the API; drop the
        // event rather than guess.
        _ => None,
    }
}

enum ApiTime {
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
}

fn parse_time(time: &ApiEventTime, event_id: &str, which: &str) -> Option<ApiTime> {
    match (&time.date_time, &time.date) {
        (Some(dt), _) => {
            let parsed = DateTime::parse_from_rfc3339(dt)
                .map_err(|e| warn!("failed to parse {} time of event {}: {}", which, event_id, e))
                .ok()?;
            Some(ApiTime::DateTime(parsed.with_timezone(&Utc)))
        }
        (None, Some(date)) => {
            let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|e| warn!("failed to parse {} date of event {}: {}", which, event_id, e))
                .ok()?;
            Some(ApiTime::Date(parsed))
        }
        (None, None) => {
            warn!("event {} has no {} time", event_id, which);
            None
        }
    }
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
    next_page_token: Option<String>,
}

/// A single event from the Google Calendar API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    status: Option<String>,
    transparency: Option<String>,
    start: ApiEventTime,
    end: ApiEventTime,
}

/// Event time from the API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date: Option<String>,
    date_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Vienna;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn parse_event_list_response() {
        let json = r#"{
            "items": [
                {
                    "id": "event1",
                    "status": "confirmed",
                    "start": { "dateTime": "2025-02-04T13:00:00Z" },
                    "end": { "dateTime": "2025-02-04T14:00:00Z" }
                }
            ],
            "nextPageToken": "page2"
        }"#;

        let response: EventListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.next_page_token, Some("page2".to_string()));
    }

    #[test]
    fn timed_event_converts_to_interval() {
        let event: ApiEvent = serde_json::from_str(
            r#"{
                "id": "event1",
                "status": "confirmed",
                "start": { "dateTime": "2025-02-04T14:00:00+01:00" },
                "end": { "dateTime": "2025-02-04T15:00:00+01:00" }
            }"#,
        )
        .unwrap();

        let interval = convert_event(event, &Vienna).unwrap();
        assert_eq!(interval.start, utc(2025, 2, 4, 13, 0, 0));
        assert_eq!(interval.end, utc(2025, 2, 4, 14, 0, 0));
    }

    #[test]
    fn all_day_event_expands_to_local_day() {
        let event: ApiEvent = serde_json::from_str(
            r#"{
                "id": "event1",
                "start": { "date": "2025-02-04" },
                "end": { "date": "2025-02-05" }
            }"#,
        )
        .unwrap();

        let interval = convert_event(event, &Vienna).unwrap();
        assert_eq!(interval.start, utc(2025, 2, 3, 23, 0, 0));
        assert_eq!(interval.end, utc(2025, 2, 4, 23, 0, 0));
    }

    #[test]
    fn cancelled_event_dropped() {
        let event: ApiEvent = serde_json::from_str(
            r#"{
                "id": "event1",
                "status": "cancelled",
                "start": { "dateTime": "2025-02-04T13:00:00Z" },
                "end": { "dateTime": "2025-02-04T14:00:00Z" }
            }"#,
        )
        .unwrap();
        assert!(convert_event(event, &Vienna).is_none());
    }

    #[test]
    fn transparent_event_dropped() {
        let event: ApiEvent = serde_json::from_str(
            r#"{
                "id": "event1",
                "transparency": "transparent",
                "start": { "dateTime": "2025-02-04T13:00:00Z" },
                "end": { "dateTime": "2025-02-04T14:00:00Z" }
            }"#,
        )
        .unwrap();
        assert!(convert_event(event, &Vienna).is_none());
    }

    #[test]
    fn event_without_times_dropped() {
        let event: ApiEvent = serde_json::from_str(
            r#"{
                "id": "event1",
                "start": {},
                "end": {}
            }"#,
        )
        .unwrap();
        assert!(convert_event(event, &Vienna).is_none());
    }
}
