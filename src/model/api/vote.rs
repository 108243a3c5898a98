use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::datetime::api_datetime,
    common::{CandidateId, ElectionId, PositionId, UserId, VoteId},
    db::Vote,
};

/// A vote the caller wishes to cast. The voter identity comes from the
/// bearer token, never from the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub election_id: ElectionId,
    pub position_id: PositionId,
    pub candidate_id: CandidateId,
}

/// Confirmation of a recorded vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteDescription {
    pub id: VoteId,
    pub voter_id: UserId,
    pub election_id: ElectionId,
    pub position_id: PositionId,
    pub candidate_id: CandidateId,
    #[serde(with = "api_datetime")]
    pub cast_at: DateTime<Utc>,
}

impl From<Vote> for VoteDescription {
    fn from(vote: Vote) -> Self {
        Self {
            id: vote.id,
            voter_id: vote.vote.voter_id,
            election_id: vote.vote.election_id,
            position_id: vote.vote.position_id,
            candidate_id: vote.vote.candidate_id,
            cast_at: vote.vote.cast_at,
        }
    }
}
