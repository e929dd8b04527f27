//! Produce a Teams join URL: connectivity check, token, profile, meeting

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use crate::Result;
use crate::api::graph::{GraphClient, MeetingRequest};
use crate::auth::TokenManager;
use crate::error::OrchestrationError;
use super::connectivity::Connectivity;
use super::history::MeetingRecord;

/// A freshly created meeting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meeting {
    pub join_url: String,
    pub subject: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Meeting> for MeetingRecord {
    fn from(meeting: &Meeting) -> Self {
        MeetingRecord {
            url: meeting.join_url.clone(),
            title: meeting.subject.clone(),
            created_at: meeting.created_at,
        }
    }
}

/// Sequences the token manager and Graph calls. Adds no retries of its own.
pub struct MeetingOrchestrator {
    tokens: Arc<TokenManager>,
    graph: GraphClient,
    connectivity: Arc<dyn Connectivity>,
    duration: Duration,
    in_flight: Mutex<()>,
}

impl MeetingOrchestrator {
    pub fn new(
        tokens: Arc<TokenManager>,
        graph: GraphClient,
        connectivity: Arc<dyn Connectivity>,
        duration: Duration,
    ) -> Self {
        Self {
            tokens,
            graph,
            connectivity,
            duration,
            in_flight: Mutex::new(()),
        }
    }

    /// Create an instant meeting starting now.
    ///
    /// A second call while one is running fails with [`OrchestrationError::Busy`].
    pub async fn generate_meeting(&self) -> Result<Meeting> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| OrchestrationError::Busy)?;

        if !self.connectivity.is_online().await {
            tracing::error!("Network offline");
            return Err(OrchestrationError::Offline.into());
        }

        tracing::info!("Getting auth token...");
        let token = self.tokens.get_token(true).await?;

        tracing::info!("Fetching user's display name...");
        let profile = self
            .graph
            .me(&token)
            .await
            .map_err(OrchestrationError::Profile)?;
        let display_name = profile
            .display_name
            .ok_or(OrchestrationError::MissingField("displayName"))?;
        tracing::debug!("User display name: {}", display_name);

        let now = Utc::now();
        let request = MeetingRequest {
            start: now,
            end: now + self.duration,
            subject: format!("Meeting with {}", display_name),
        };

        tracing::info!("Creating Teams meeting...");
        let created = self
            .graph
            .create_online_meeting(&token, &request)
            .await
            .map_err(OrchestrationError::CreateMeeting)?;
        let join_url = created
            .join_url
            .ok_or(OrchestrationError::MissingField("joinUrl"))?;

        tracing::info!("Meeting created successfully");
        Ok(Meeting {
            join_url,
            subject: created.subject.unwrap_or(request.subject),
            created_at: now,
        })
    }
}
