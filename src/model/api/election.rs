use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{
        datetime::{api_datetime, api_datetime_option},
        session::SessionDescription,
    },
    common::{CandidateId, ElectionId, ElectionStatus, PositionId},
    db::{Candidate, Election, ElectionCore, Position},
};

/// An election specification, as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub title: String,
    pub description: String,
    #[serde(with = "api_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "api_datetime")]
    pub end_time: DateTime<Utc>,
}

impl ElectionSpec {
    /// Check the spec is acceptable.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.title.trim().is_empty() {
            return Err("Missing election title");
        }
        if self.end_time <= self.start_time {
            return Err("End time must be after start time");
        }
        Ok(())
    }

    /// Convert this spec into a proper election with the given unique ID.
    pub fn into_election(self, id: ElectionId, now: DateTime<Utc>) -> Election {
        Election {
            id,
            election: ElectionCore {
                title: self.title,
                description: self.description,
                start_time: self.start_time,
                end_time: self.end_time,
                created_at: now,
            },
        }
    }
}

/// A partial election update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElectionUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "api_datetime_option")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, with = "api_datetime_option")]
    pub end_time: Option<DateTime<Utc>>,
}

/// An API-friendly election description, with the status derived from the
/// window at the instant of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: ElectionId,
    pub title: String,
    pub description: String,
    pub status: ElectionStatus,
    #[serde(with = "api_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "api_datetime")]
    pub end_time: DateTime<Utc>,
    #[serde(with = "api_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ElectionDescription {
    /// Describe an election as seen at the given instant.
    pub fn new(election: Election, now: DateTime<Utc>) -> Self {
        let status = election.status_at(now);
        Self {
            id: election.id,
            title: election.election.title,
            description: election.election.description,
            status,
            start_time: election.election.start_time,
            end_time: election.election.end_time,
            created_at: election.election.created_at,
        }
    }
}

/// Response to election creation: the election and its initial session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCreated {
    pub election: ElectionDescription,
    pub session: SessionDescription,
}

/// A full election read-out: the election plus its positions and candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDetail {
    pub election: ElectionDescription,
    pub positions: Vec<PositionDescription>,
    pub candidates: Vec<CandidateDescription>,
}

/// A position specification, as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSpec {
    pub name: String,
}

/// An API-friendly position description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionDescription {
    pub id: PositionId,
    pub name: String,
    pub election_id: ElectionId,
}

impl From<Position> for PositionDescription {
    fn from(position: Position) -> Self {
        Self {
            id: position.id,
            name: position.position.name,
            election_id: position.position.election_id,
        }
    }
}

/// A candidate specification, as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    pub position_id: PositionId,
    #[serde(default)]
    pub manifesto: Option<String>,
}

/// An API-friendly candidate description, including the running tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: CandidateId,
    pub name: String,
    pub election_id: ElectionId,
    pub position_id: PositionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifesto: Option<String>,
    pub vote_count: u32,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id,
            name: candidate.candidate.name,
            election_id: candidate.candidate.election_id,
            position_id: candidate.candidate.position_id,
            manifesto: candidate.candidate.manifesto,
            vote_count: candidate.candidate.vote_count,
        }
    }
}

/// Per-position results: the candidate slate with tallies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionResults {
    pub position: String,
    pub candidates: Vec<CandidateTally>,
}

/// One candidate's share of a position's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTally {
    pub name: String,
    pub votes: u32,
}

impl From<&Candidate> for CandidateTally {
    fn from(candidate: &Candidate) -> Self {
        Self {
            name: candidate.name.clone(),
            votes: candidate.vote_count,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use chrono::{Duration, Timelike};

    fn top_of_the_hour() -> DateTime<Utc> {
        Utc::now()
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap()
    }

    impl ElectionSpec {
        /// An election whose window contains the present.
        pub fn current_example() -> Self {
            let start_time = top_of_the_hour() - Duration::days(1);
            Self {
                title: "Student Guild Elections 2025".to_string(),
                description: "Annual student guild leadership elections".to_string(),
                start_time,
                end_time: start_time + Duration::days(7),
            }
        }

        /// An election whose window is entirely in the future.
        pub fn future_example() -> Self {
            let start_time = top_of_the_hour() + Duration::days(30);
            Self {
                title: "Sports Council By-Election".to_string(),
                description: "By-election for the vacant sports council seats".to_string(),
                start_time,
                end_time: start_time + Duration::days(2),
            }
        }

        /// An election whose window has entirely passed.
        pub fn past_example() -> Self {
            let start_time = top_of_the_hour() - Duration::days(30);
            Self {
                title: "Student Guild Elections 2024".to_string(),
                description: "Last year's guild elections".to_string(),
                start_time,
                end_time: start_time + Duration::days(7),
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_validation() {
        assert!(ElectionSpec::current_example().validate().is_ok());

        let mut blank_title = ElectionSpec::current_example();
        blank_title.title = " ".to_string();
        assert!(blank_title.validate().is_err());

        let mut inverted_window = ElectionSpec::current_example();
        inverted_window.end_time = inverted_window.start_time;
        assert!(inverted_window.validate().is_err());
    }

    #[test]
    fn spec_dates_use_the_api_pattern() {
        let json = r#"{
            "title": "Student Guild Elections 2025",
            "description": "Annual elections",
            "start_time": "2025-01-01 10:00:00",
            "end_time": "2025-01-01 12:00:00"
        }"#;
        let spec: ElectionSpec = rocket::serde::json::serde_json::from_str(json).unwrap();
        assert!(spec.validate().is_ok());

        let bad = json.replace("2025-01-01 10:00:00", "2025-01-01T10:00:00Z");
        assert!(rocket::serde::json::serde_json::from_str::<ElectionSpec>(&bad).is_err());
    }
}
