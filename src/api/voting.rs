use chrono::{DateTime, Utc};
use mongodb::{
    bson::doc,
    error::{TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::FindOneOptions,
    Client, ClientSession,
};
use rocket::{serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{AuthToken, Voter},
            vote::{VoteDescription, VoteRequest},
        },
        common::{SessionId, SessionRuling, SessionStatus, UserId},
        db::{Candidate, Election, Position, Vote, VoteCore, VotingSession},
        mongodb::{is_duplicate_key_error, Coll, Counter, VOTE_IDS},
    },
};

pub fn routes() -> Vec<Route> {
    routes![cast_vote]
}

#[post("/vote", data = "<request>", format = "json")]
#[allow(clippy::too_many_arguments)]
async fn cast_vote(
    token: AuthToken<Voter>,
    request: Json<VoteRequest>,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    sessions: Coll<VotingSession>,
    votes: Coll<Vote>,
    counters: Coll<Counter>,
    db_client: &State<Client>,
) -> Result<Json<VoteDescription>> {
    let now = Utc::now();
    let request = request.0;

    // The referenced rows must exist and agree with each other.
    elections
        .find_one(doc! { "_id": request.election_id }, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election with ID '{}'", request.election_id)))?;
    let position = positions
        .find_one(doc! { "_id": request.position_id }, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Position with ID '{}'", request.position_id)))?;
    if position.election_id != request.election_id {
        return Err(Error::bad_request(
            "Position does not belong to the given election",
        ));
    }
    let candidate = candidates
        .find_one(doc! { "_id": request.candidate_id }, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate with ID '{}'", request.candidate_id)))?;
    if candidate.position_id != request.position_id || candidate.election_id != request.election_id
    {
        return Err(Error::bad_request(
            "Candidate does not belong to the given position",
        ));
    }

    // Resolve the authoritative (newest) session for this election. Older
    // sessions are closed when superseded, so there is at most one candidate.
    let newest = FindOneOptions::builder().sort(doc! { "_id": -1 }).build();
    let session = sessions
        .find_one(doc! { "election_id": request.election_id }, newest)
        .await?
        .ok_or_else(|| {
            Error::Forbidden("Voting is not configured for this election".to_string())
        })?;

    // Evaluate the gate, lazily advancing the stored status where the clock
    // has overtaken it. The transitions are conditional on the old status,
    // so concurrent attempts apply them at most once.
    match session.ruling_at(now) {
        SessionRuling::Open { needs_transition } => {
            if needs_transition {
                open_session(&sessions, session.id).await?;
            }
        }
        SessionRuling::TooEarly => {
            return Err(Error::Forbidden(
                "Voting has not opened for this election yet".to_string(),
            ));
        }
        SessionRuling::TooLate { needs_transition } => {
            if needs_transition {
                close_session(&sessions, session.id).await?;
            }
            return Err(Error::Forbidden(
                "Voting has closed for this election".to_string(),
            ));
        }
        SessionRuling::Closed => {
            return Err(Error::Forbidden(
                "Voting is closed for this election".to_string(),
            ));
        }
    }

    // Record the vote and bump the tally as one unit: either both persist or
    // neither does. The unique index on (voter, election, position) rejects a
    // duplicate before the tally is touched. Contended transactions (two
    // voters bumping the same tally at once) abort one side with a transient
    // error; that side reruns against the committed state.
    let mut db_session = db_client.start_session(None).await?;
    let vote = loop {
        match vote_transaction(&votes, &candidates, &counters, &request, token.id, now, &mut db_session)
            .await
        {
            Ok(vote) => break vote,
            Err(Error::Db(err)) => {
                if is_duplicate_key_error(&err) {
                    return Err(Error::Conflict(
                        "You have already voted for this position".to_string(),
                    ));
                }
                if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
                    continue;
                }
                return Err(err.into());
            }
            Err(err) => return Err(err),
        }
    };

    Ok(Json(vote.into()))
}

/// One attempt at recording the vote row and bumping the candidate tally,
/// committed as a single transaction. The transaction is aborted before any
/// error is returned, so the caller may retry on the same session.
async fn vote_transaction(
    votes: &Coll<Vote>,
    candidates: &Coll<Candidate>,
    counters: &Coll<Counter>,
    request: &VoteRequest,
    voter_id: UserId,
    now: DateTime<Utc>,
    db_session: &mut ClientSession,
) -> Result<Vote> {
    db_session.start_transaction(None).await?;

    let id = match Counter::next_with_session(counters, VOTE_IDS, db_session).await {
        Ok(id) => id,
        Err(err) => {
            let _ = db_session.abort_transaction().await;
            return Err(err);
        }
    };
    let vote = Vote {
        id,
        vote: VoteCore {
            voter_id,
            election_id: request.election_id,
            position_id: request.position_id,
            candidate_id: request.candidate_id,
            cast_at: now,
        },
    };
    if let Err(err) = votes.insert_one_with_session(&vote, None, db_session).await {
        // Ignore abort failures: the server may have aborted already, and the
        // write error is the one the caller needs.
        let _ = db_session.abort_transaction().await;
        return Err(err.into());
    }

    match candidates
        .update_one_with_session(
            doc! { "_id": request.candidate_id },
            doc! { "$inc": { "vote_count": 1 } },
            None,
            db_session,
        )
        .await
    {
        Ok(result) => assert_eq!(result.modified_count, 1),
        Err(err) => {
            let _ = db_session.abort_transaction().await;
            return Err(err.into());
        }
    }

    // Commit, retrying while the outcome is unknown.
    loop {
        match db_session.commit_transaction().await {
            Ok(()) => return Ok(vote),
            Err(err) if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) => continue,
            Err(err) => return Err(err.into()),
        }
    }
}

/// Lazily apply `scheduled -> open`. Keyed on the old status, so it is
/// idempotent and a no-op if someone else already opened (or closed) it.
async fn open_session(sessions: &Coll<VotingSession>, id: SessionId) -> Result<()> {
    sessions
        .update_one(
            doc! { "_id": id, "status": SessionStatus::Scheduled },
            doc! { "$set": { "status": SessionStatus::Open } },
            None,
        )
        .await?;
    Ok(())
}

/// Lazily apply `open -> closed` once the window has passed.
async fn close_session(sessions: &Coll<VotingSession>, id: SessionId) -> Result<()> {
    sessions
        .update_one(
            doc! { "_id": id, "status": SessionStatus::Open },
            doc! { "$set": { "status": SessionStatus::Closed } },
            None,
        )
        .await?;
    Ok(())
}
