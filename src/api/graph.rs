//! Microsoft Graph calls used to create a meeting

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use crate::error::ApiError;
use super::client::ApiClient;
use super::transport::HttpRequest;

/// Subset of `GET /me`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Subset of the `onlineMeeting` resource
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineMeeting {
    #[serde(default)]
    pub join_url: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
}

/// Body of `POST /me/onlineMeetings`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub subject: String,
}

impl MeetingRequest {
    fn to_json(&self) -> serde_json::Value {
        json!({
            "startDateTime": self.start.to_rfc3339_opts(SecondsFormat::Millis, true),
            "endDateTime": self.end.to_rfc3339_opts(SecondsFormat::Millis, true),
            "subject": self.subject,
        })
    }
}

/// Typed wrapper over [`ApiClient`] for the Graph endpoints
#[derive(Clone)]
pub struct GraphClient {
    api: ApiClient,
    base_url: String,
}

impl GraphClient {
    pub fn new(api: ApiClient, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { api, base_url }
    }

    pub fn me_url(&self) -> String {
        format!("{}/me?$select=displayName", self.base_url)
    }

    pub fn online_meetings_url(&self) -> String {
        format!("{}/me/onlineMeetings", self.base_url)
    }

    pub async fn me(&self, token: &str) -> Result<Profile, ApiError> {
        let request = HttpRequest::get(self.me_url()).bearer(token);
        self.api.request_json(&request).await
    }

    pub async fn create_online_meeting(
        &self,
        token: &str,
        meeting: &MeetingRequest,
    ) -> Result<OnlineMeeting, ApiError> {
        let request = HttpRequest::post_json(self.online_meetings_url(), meeting.to_json()).bearer(token);
        self.api.request_json(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::RetryPolicy;
    use crate::api::transport::mock::ScriptedTransport;
    use crate::api::transport::{Method, RequestBody};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn graph(transport: &Arc<ScriptedTransport>) -> GraphClient {
        GraphClient::new(
            ApiClient::new(transport.clone(), RetryPolicy::default()),
            "https://graph.test/v1.0/",
        )
    }

    #[tokio::test]
    async fn test_me_request_shape() {
        let transport = Arc::new(ScriptedTransport::new().respond(200, r#"{"displayName": "Ann"}"#));
        let profile = graph(&transport).me("tok").await.unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("Ann"));

        let req = &transport.requests()[0];
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.url, "https://graph.test/v1.0/me?$select=displayName");
        assert_eq!(req.bearer.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_create_meeting_body() {
        let transport = Arc::new(
            ScriptedTransport::new().respond(201, r#"{"joinUrl": "https://teams/join/1", "subject": "s"}"#),
        );
        let start = Utc.with_ymd_and_hms(2026, 1, 2, 9, 0, 0).unwrap();
        let meeting = MeetingRequest {
            start,
            end: start + chrono::Duration::hours(1),
            subject: "Meeting with Ann".to_string(),
        };

        let created = graph(&transport).create_online_meeting("tok", &meeting).await.unwrap();
        assert_eq!(created.join_url.as_deref(), Some("https://teams/join/1"));

        let req = &transport.requests()[0];
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.url, "https://graph.test/v1.0/me/onlineMeetings");
        match &req.body {
            RequestBody::Json(body) => {
                assert_eq!(body["startDateTime"], "2026-01-02T09:00:00.000Z");
                assert_eq!(body["endDateTime"], "2026-01-02T10:00:00.000Z");
                assert_eq!(body["subject"], "Meeting with Ann");
            }
            other => panic!("unexpected body {:?}", other),
        }
    }
}
