use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::datetime::api_datetime,
    common::{ElectionId, SessionId, SessionStatus},
    db::VotingSession,
};

/// A voting session specification, as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSpec {
    pub election_id: ElectionId,
    #[serde(with = "api_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "api_datetime")]
    pub end_time: DateTime<Utc>,
    /// Optional explicit status; anything unrecognised falls back to the
    /// initial-state rule.
    #[serde(default)]
    pub status: Option<String>,
}

impl SessionSpec {
    /// Check the spec is acceptable.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.end_time <= self.start_time {
            return Err("End time must be after start time");
        }
        Ok(())
    }

    /// The status the new session should start in: the explicit one if it
    /// parses, otherwise derived from the window and the current instant.
    pub fn status_at(&self, now: DateTime<Utc>) -> SessionStatus {
        self.status
            .as_deref()
            .and_then(|status| status.to_lowercase().parse().ok())
            .unwrap_or_else(|| SessionStatus::initial_at(now, self.start_time, self.end_time))
    }
}

/// An API-friendly voting session description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub id: SessionId,
    pub election_id: ElectionId,
    #[serde(with = "api_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "api_datetime")]
    pub end_time: DateTime<Utc>,
    pub status: SessionStatus,
}

impl From<VotingSession> for SessionDescription {
    fn from(session: VotingSession) -> Self {
        Self {
            id: session.id,
            election_id: session.session.election_id,
            start_time: session.session.start_time,
            end_time: session.session.end_time,
            status: session.session.status,
        }
    }
}
