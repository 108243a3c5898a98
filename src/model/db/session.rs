use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::common::{ElectionId, SessionId, SessionRuling, SessionStatus};

/// Core voting session data: the time-bounded window during which votes may
/// be cast for an election.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct VotingSessionCore {
    pub election_id: ElectionId,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    pub status: SessionStatus,
}

impl VotingSessionCore {
    /// Create a session whose initial status follows the creation instant:
    /// `open` if already inside the window, `scheduled` otherwise.
    pub fn new(
        election_id: ElectionId,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            election_id,
            start_time,
            end_time,
            status: SessionStatus::initial_at(now, start_time, end_time),
        }
    }

    /// Rule on a vote attempt at the given instant. Voting is permitted only
    /// if the session is open AND the instant lies inside the window.
    pub fn ruling_at(&self, now: DateTime<Utc>) -> SessionRuling {
        SessionRuling::evaluate(self.status, self.start_time, self.end_time, now)
    }
}

/// A voting session from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct VotingSession {
    #[serde(rename = "_id")]
    pub id: SessionId,
    #[serde(flatten)]
    pub session: VotingSessionCore,
}

impl Deref for VotingSession {
    type Target = VotingSessionCore;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl DerefMut for VotingSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.session
    }
}
