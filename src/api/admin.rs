use chrono::Utc;
use mongodb::{bson::doc, options::FindOptions, Client};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{Admin, AuthToken},
            election::{
                CandidateDescription, CandidateSpec, CandidateTally, ElectionCreated,
                ElectionDescription, ElectionDetail, ElectionSpec, ElectionUpdate,
                PositionDescription, PositionResults, PositionSpec,
            },
            session::{SessionDescription, SessionSpec},
            user::{PromoteRequest, UserDescription},
        },
        common::{ElectionId, SessionStatus},
        db::{
            Candidate, CandidateCore, Election, Position, PositionCore, User, Vote, VotingSession,
            VotingSessionCore,
        },
        mongodb::{
            Coll, Counter, CANDIDATE_IDS, ELECTION_IDS, POSITION_IDS, SESSION_IDS,
        },
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        list_elections,
        create_election,
        election_detail,
        update_election,
        delete_election,
        add_position,
        add_candidate,
        election_results,
        create_session,
        list_voters,
        promote_user,
    ]
}

#[get("/admin/elections")]
async fn list_elections(
    _token: AuthToken<Admin>,
    elections: Coll<Election>,
) -> Result<Json<Vec<ElectionDescription>>> {
    let now = Utc::now();
    let options = FindOptions::builder().sort(doc! { "start_time": -1 }).build();
    let list: Vec<Election> = elections.find(None, options).await?.try_collect().await?;
    Ok(Json(
        list.into_iter()
            .map(|e| ElectionDescription::new(e, now))
            .collect(),
    ))
}

#[post("/admin/elections", data = "<spec>", format = "json")]
async fn create_election(
    _token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    elections: Coll<Election>,
    sessions: Coll<VotingSession>,
    counters: Coll<Counter>,
    db_client: &State<Client>,
) -> Result<Json<ElectionCreated>> {
    spec.validate().map_err(Error::bad_request)?;
    let now = Utc::now();

    // The election and its initial session land together or not at all.
    let (election, session) = {
        let mut db_session = db_client.start_session(None).await?;
        db_session.start_transaction(None).await?;

        let election_id =
            Counter::next_with_session(&counters, ELECTION_IDS, &mut db_session).await?;
        let election = spec.0.into_election(election_id, now);
        elections
            .insert_one_with_session(&election, None, &mut db_session)
            .await?;

        // Every election starts with a session covering its window.
        let session_id =
            Counter::next_with_session(&counters, SESSION_IDS, &mut db_session).await?;
        let session = VotingSession {
            id: session_id,
            session: VotingSessionCore::new(
                election_id,
                election.start_time,
                election.end_time,
                now,
            ),
        };
        sessions
            .insert_one_with_session(&session, None, &mut db_session)
            .await?;

        db_session.commit_transaction().await?;
        (election, session)
    };

    Ok(Json(ElectionCreated {
        election: ElectionDescription::new(election, now),
        session: session.into(),
    }))
}

#[get("/admin/elections/<election_id>")]
async fn election_detail(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
) -> Result<Json<ElectionDetail>> {
    let now = Utc::now();
    let election = election_by_id(election_id, &elections).await?;

    let positions: Vec<Position> = positions
        .find(doc! { "election_id": election_id }, None)
        .await?
        .try_collect()
        .await?;
    let candidates: Vec<Candidate> = candidates
        .find(doc! { "election_id": election_id }, None)
        .await?
        .try_collect()
        .await?;

    Ok(Json(ElectionDetail {
        election: ElectionDescription::new(election, now),
        positions: positions.into_iter().map(Into::into).collect(),
        candidates: candidates.into_iter().map(Into::into).collect(),
    }))
}

#[put("/admin/elections/<election_id>", data = "<update>", format = "json")]
async fn update_election(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    update: Json<ElectionUpdate>,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    let now = Utc::now();
    let mut election = election_by_id(election_id, &elections).await?;

    let update = update.0;
    if let Some(title) = update.title {
        if title.trim().is_empty() {
            return Err(Error::bad_request("Missing election title"));
        }
        election.title = title;
    }
    if let Some(description) = update.description {
        election.description = description;
    }
    if let Some(start_time) = update.start_time {
        election.start_time = start_time;
    }
    if let Some(end_time) = update.end_time {
        election.end_time = end_time;
    }
    if election.end_time <= election.start_time {
        return Err(Error::bad_request("End time must be after start time"));
    }

    elections
        .replace_one(doc! { "_id": election_id }, &election, None)
        .await?;
    Ok(Json(ElectionDescription::new(election, now)))
}

#[delete("/admin/elections/<election_id>")]
#[allow(clippy::too_many_arguments)]
async fn delete_election(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    sessions: Coll<VotingSession>,
    votes: Coll<Vote>,
    db_client: &State<Client>,
) -> Result<()> {
    // Check it exists at all first, for a distinct error.
    election_by_id(election_id, &elections).await?;

    // Atomically delete the election and all associated data.
    {
        let mut db_session = db_client.start_session(None).await?;
        db_session.start_transaction(None).await?;

        let result = elections
            .delete_one_with_session(doc! { "_id": election_id }, None, &mut db_session)
            .await?;
        assert_eq!(result.deleted_count, 1);

        let filter = doc! { "election_id": election_id };
        positions
            .delete_many_with_session(filter.clone(), None, &mut db_session)
            .await?;
        candidates
            .delete_many_with_session(filter.clone(), None, &mut db_session)
            .await?;
        sessions
            .delete_many_with_session(filter.clone(), None, &mut db_session)
            .await?;
        votes
            .delete_many_with_session(filter, None, &mut db_session)
            .await?;

        db_session.commit_transaction().await?;
    }

    Ok(())
}

#[post(
    "/admin/elections/<election_id>/positions",
    data = "<spec>",
    format = "json"
)]
async fn add_position(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    spec: Json<PositionSpec>,
    elections: Coll<Election>,
    positions: Coll<Position>,
    counters: Coll<Counter>,
) -> Result<Json<PositionDescription>> {
    election_by_id(election_id, &elections).await?;
    if spec.name.trim().is_empty() {
        return Err(Error::bad_request("Missing position name"));
    }

    let id = Counter::next(&counters, POSITION_IDS).await?;
    let position = Position {
        id,
        position: PositionCore {
            election_id,
            name: spec.0.name,
        },
    };
    positions.insert_one(&position, None).await?;
    Ok(Json(position.into()))
}

#[post(
    "/admin/elections/<election_id>/candidates",
    data = "<spec>",
    format = "json"
)]
async fn add_candidate(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    spec: Json<CandidateSpec>,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    counters: Coll<Counter>,
) -> Result<Json<CandidateDescription>> {
    election_by_id(election_id, &elections).await?;
    if spec.name.trim().is_empty() {
        return Err(Error::bad_request("Missing candidate name"));
    }

    // The position must exist within this very election.
    let position = positions
        .find_one(doc! { "_id": spec.position_id }, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Position with ID '{}'", spec.position_id)))?;
    if position.election_id != election_id {
        return Err(Error::bad_request(
            "Position does not belong to the given election",
        ));
    }

    let id = Counter::next(&counters, CANDIDATE_IDS).await?;
    let spec = spec.0;
    let candidate = Candidate {
        id,
        candidate: CandidateCore::new(election_id, spec.position_id, spec.name, spec.manifesto),
    };
    candidates.insert_one(&candidate, None).await?;
    Ok(Json(candidate.into()))
}

#[get("/admin/elections/<election_id>/results")]
async fn election_results(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
) -> Result<Json<Vec<PositionResults>>> {
    election_by_id(election_id, &elections).await?;

    let positions: Vec<Position> = positions
        .find(doc! { "election_id": election_id }, None)
        .await?
        .try_collect()
        .await?;

    let mut results = Vec::with_capacity(positions.len());
    for position in positions {
        let options = FindOptions::builder().sort(doc! { "vote_count": -1 }).build();
        let slate: Vec<Candidate> = candidates
            .find(doc! { "position_id": position.id }, options)
            .await?
            .try_collect()
            .await?;
        results.push(PositionResults {
            position: position.position.name,
            candidates: slate.iter().map(CandidateTally::from).collect(),
        });
    }
    Ok(Json(results))
}

#[post("/admin/sessions", data = "<spec>", format = "json")]
async fn create_session(
    _token: AuthToken<Admin>,
    spec: Json<SessionSpec>,
    elections: Coll<Election>,
    sessions: Coll<VotingSession>,
    counters: Coll<Counter>,
    db_client: &State<Client>,
) -> Result<Json<SessionDescription>> {
    spec.validate().map_err(Error::bad_request)?;
    election_by_id(spec.election_id, &elections).await?;

    let now = Utc::now();
    let spec = spec.0;
    let status = spec.status_at(now);

    // Superseding closes every prior non-closed session in the same
    // transaction, so at most one session per election can ever be open.
    let session = {
        let mut db_session = db_client.start_session(None).await?;
        db_session.start_transaction(None).await?;

        sessions
            .update_many_with_session(
                doc! {
                    "election_id": spec.election_id,
                    "status": { "$ne": SessionStatus::Closed },
                },
                doc! { "$set": { "status": SessionStatus::Closed } },
                None,
                &mut db_session,
            )
            .await?;

        let id = Counter::next_with_session(&counters, SESSION_IDS, &mut db_session).await?;
        let session = VotingSession {
            id,
            session: VotingSessionCore {
                election_id: spec.election_id,
                start_time: spec.start_time,
                end_time: spec.end_time,
                status,
            },
        };
        sessions
            .insert_one_with_session(&session, None, &mut db_session)
            .await?;

        db_session.commit_transaction().await?;
        session
    };

    Ok(Json(session.into()))
}

#[get("/admin/voters")]
async fn list_voters(
    _token: AuthToken<Admin>,
    users: Coll<User>,
) -> Result<Json<Vec<UserDescription>>> {
    let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
    let list: Vec<User> = users.find(None, options).await?.try_collect().await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

#[post("/promote_user", data = "<request>", format = "json")]
async fn promote_user(
    _token: AuthToken<Admin>,
    request: Json<PromoteRequest>,
    users: Coll<User>,
) -> Result<Json<UserDescription>> {
    let user = users
        .find_one(doc! { "email": &request.email }, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Account with email '{}'", request.email)))?;

    users
        .update_one(
            doc! { "_id": user.id },
            doc! { "$set": { "role": request.role } },
            None,
        )
        .await?;

    let user = users
        .find_one(doc! { "_id": user.id }, None)
        .await?
        .unwrap(); // Presence already checked.
    Ok(Json(user.into()))
}

/// Fetch an election or fail with not-found.
async fn election_by_id(election_id: ElectionId, elections: &Coll<Election>) -> Result<Election> {
    elections
        .find_one(doc! { "_id": election_id }, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election with ID '{election_id}'")))
}
