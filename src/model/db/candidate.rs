use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::common::{CandidateId, ElectionId, PositionId};

/// Core candidate data, linked to a specific election->position.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct CandidateCore {
    pub election_id: ElectionId,
    pub position_id: PositionId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifesto: Option<String>,
    /// Running tally; always equals the number of vote rows referencing this
    /// candidate, because both change inside one transaction.
    pub vote_count: u32,
}

impl CandidateCore {
    /// Create a new candidate with a zero tally.
    pub fn new(
        election_id: ElectionId,
        position_id: PositionId,
        name: String,
        manifesto: Option<String>,
    ) -> Self {
        Self {
            election_id,
            position_id,
            name,
            manifesto,
            vote_count: 0,
        }
    }
}

/// A candidate from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: CandidateId,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}
