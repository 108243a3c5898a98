use chrono::Utc;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime, Document},
    options::{FindOneOptions, FindOptions},
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{AuthToken, Voter},
            election::{CandidateDescription, ElectionDescription, PositionDescription},
        },
        common::{CandidateId, ElectionId, PositionId},
        db::{Candidate, Election, Position},
        mongodb::Coll,
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        list_candidates,
        candidate_profile,
        results,
        active_positions,
        upcoming_elections,
        active_elections,
    ]
}

/// Build a candidate filter from the optional query parameters.
fn candidate_filter(election_id: Option<ElectionId>, position_id: Option<PositionId>) -> Document {
    let mut filter = doc! {};
    if let Some(election_id) = election_id {
        filter.insert("election_id", election_id);
    }
    if let Some(position_id) = position_id {
        filter.insert("position_id", position_id);
    }
    filter
}

#[get("/candidates?<election_id>&<position_id>")]
async fn list_candidates(
    _token: AuthToken<Voter>,
    election_id: Option<ElectionId>,
    position_id: Option<PositionId>,
    candidates: Coll<Candidate>,
) -> Result<Json<Vec<CandidateDescription>>> {
    let filter = candidate_filter(election_id, position_id);
    let candidates: Vec<Candidate> = candidates.find(filter, None).await?.try_collect().await?;
    Ok(Json(candidates.into_iter().map(Into::into).collect()))
}

#[get("/candidates/<candidate_id>")]
async fn candidate_profile(
    _token: AuthToken<Voter>,
    candidate_id: CandidateId,
    candidates: Coll<Candidate>,
) -> Result<Json<CandidateDescription>> {
    let candidate = candidates
        .find_one(doc! { "_id": candidate_id }, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate with ID '{candidate_id}'")))?;
    Ok(Json(candidate.into()))
}

#[get("/results?<election_id>&<position_id>")]
async fn results(
    _token: AuthToken<Voter>,
    election_id: Option<ElectionId>,
    position_id: Option<PositionId>,
    candidates: Coll<Candidate>,
) -> Result<Json<Vec<CandidateDescription>>> {
    let filter = candidate_filter(election_id, position_id);
    let options = FindOptions::builder()
        .sort(doc! { "vote_count": -1 })
        .build();
    let candidates: Vec<Candidate> = candidates.find(filter, options).await?.try_collect().await?;
    Ok(Json(candidates.into_iter().map(Into::into).collect()))
}

/// Positions of the currently active election, if any. Among several active
/// elections the earliest-starting one wins.
#[get("/positions")]
async fn active_positions(
    _token: AuthToken<Voter>,
    elections: Coll<Election>,
    positions: Coll<Position>,
) -> Result<Json<Vec<PositionDescription>>> {
    let now = BsonDateTime::from_chrono(Utc::now());
    let filter = doc! {
        "start_time": { "$lte": now },
        "end_time": { "$gte": now },
    };
    let options = FindOneOptions::builder()
        .sort(doc! { "start_time": 1 })
        .build();
    let active = elections.find_one(filter, options).await?;

    let positions = match active {
        Some(election) => {
            positions
                .find(doc! { "election_id": election.id }, None)
                .await?
                .try_collect::<Vec<Position>>()
                .await?
        }
        None => Vec::new(),
    };
    Ok(Json(positions.into_iter().map(Into::into).collect()))
}

#[get("/admin/elections/upcoming")]
async fn upcoming_elections(
    _token: AuthToken<Voter>,
    elections: Coll<Election>,
) -> Result<Json<Vec<ElectionDescription>>> {
    let now = Utc::now();
    let filter = doc! {
        "start_time": { "$gt": BsonDateTime::from_chrono(now) },
    };
    let options = FindOptions::builder().sort(doc! { "start_time": 1 }).build();
    let list: Vec<Election> = elections.find(filter, options).await?.try_collect().await?;
    Ok(Json(
        list.into_iter()
            .map(|e| ElectionDescription::new(e, now))
            .collect(),
    ))
}

#[get("/admin/elections/active")]
async fn active_elections(
    _token: AuthToken<Voter>,
    elections: Coll<Election>,
) -> Result<Json<Vec<ElectionDescription>>> {
    let now = Utc::now();
    let bson_now = BsonDateTime::from_chrono(now);
    let filter = doc! {
        "start_time": { "$lte": bson_now },
        "end_time": { "$gte": bson_now },
    };
    let options = FindOptions::builder().sort(doc! { "start_time": 1 }).build();
    let list: Vec<Election> = elections.find(filter, options).await?.try_collect().await?;
    Ok(Json(
        list.into_iter()
            .map(|e| ElectionDescription::new(e, now))
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{
        http::Status,
        local::asynchronous::Client,
        serde::json::serde_json,
    };

    use crate::model::{
        api::{auth::BearerToken, election::ElectionSpec},
        common::ElectionStatus,
    };

    use super::*;

    async fn seed_elections(db: &Database) {
        use crate::model::mongodb::{Counter, ELECTION_IDS};
        let elections = Coll::<Election>::from_db(db);
        let counters = Coll::<Counter>::from_db(db);
        for spec in [
            ElectionSpec::current_example(),
            ElectionSpec::future_example(),
            ElectionSpec::past_example(),
        ] {
            let id = Counter::next(&counters, ELECTION_IDS).await.unwrap();
            elections
                .insert_one(spec.into_election(id, Utc::now()), None)
                .await
                .unwrap();
        }
    }

    #[backend_test(voter)]
    async fn listings_are_filtered_by_window(client: Client, token: BearerToken, db: Database) {
        seed_elections(&db).await;

        // Upcoming: only the future election.
        let response = client
            .get(uri!(upcoming_elections))
            .header(token.header())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let upcoming: Vec<ElectionDescription> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].title, ElectionSpec::future_example().title);
        assert_eq!(upcoming[0].status, ElectionStatus::Upcoming);

        // Active: only the current election.
        let response = client
            .get(uri!(active_elections))
            .header(token.header())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let active: Vec<ElectionDescription> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].title, ElectionSpec::current_example().title);
        assert_eq!(active[0].status, ElectionStatus::Active);
    }

    #[backend_test(voter)]
    async fn candidate_listings_and_profile(client: Client, token: BearerToken, db: Database) {
        use crate::model::db::{CandidateCore, PositionCore};
        use crate::model::mongodb::{Counter, CANDIDATE_IDS, ELECTION_IDS, POSITION_IDS};

        let counters = Coll::<Counter>::from_db(&db);
        let positions = Coll::<Position>::from_db(&db);
        let candidates = Coll::<Candidate>::from_db(&db);

        // Two elections, one position each, with 2 + 1 candidates.
        let first_election = Counter::next(&counters, ELECTION_IDS).await.unwrap();
        let second_election = Counter::next(&counters, ELECTION_IDS).await.unwrap();
        let mut slate = Vec::new();
        for (election_id, names) in [
            (first_election, &["Achieng Odhiambo", "Mutua Musyoka"][..]),
            (second_election, &["Halima Hassan"][..]),
        ] {
            let position_id = Counter::next(&counters, POSITION_IDS).await.unwrap();
            positions
                .insert_one(
                    Position {
                        id: position_id,
                        position: PositionCore {
                            election_id,
                            name: "Guild President".to_string(),
                        },
                    },
                    None,
                )
                .await
                .unwrap();
            for name in names {
                let id = Counter::next(&counters, CANDIDATE_IDS).await.unwrap();
                let candidate = Candidate {
                    id,
                    candidate: CandidateCore::new(
                        election_id,
                        position_id,
                        name.to_string(),
                        Some(format!("Manifesto of {name}")),
                    ),
                };
                candidates.insert_one(&candidate, None).await.unwrap();
                slate.push(candidate);
            }
        }

        // Unfiltered listing returns everyone.
        let response = client
            .get("/candidates")
            .header(token.header())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let listed: Vec<CandidateDescription> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(listed.len(), 3);

        // Filtering by election narrows the slate.
        let response = client
            .get(uri!(list_candidates(
                election_id = Some(first_election),
                position_id = _
            )))
            .header(token.header())
            .dispatch()
            .await;
        let listed: Vec<CandidateDescription> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|c| c.election_id == first_election));

        // A single profile comes back with its manifesto.
        let wanted = &slate[2];
        let response = client
            .get(uri!(candidate_profile(wanted.id)))
            .header(token.header())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let profile: CandidateDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(profile.name, wanted.name);
        assert_eq!(profile.manifesto, wanted.manifesto);

        // An unknown candidate is a 404.
        let response = client
            .get(uri!(candidate_profile(9999)))
            .header(token.header())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn listings_require_a_token(client: Client) {
        for uri in ["/candidates", "/results", "/positions"] {
            let response = client.get(uri).dispatch().await;
            assert_eq!(Status::Unauthorized, response.status());
        }
    }

    #[backend_test(voter)]
    async fn positions_of_the_active_election(client: Client, token: BearerToken, db: Database) {
        use crate::model::db::PositionCore;
        use crate::model::mongodb::{Counter, POSITION_IDS};

        seed_elections(&db).await;
        let elections = Coll::<Election>::from_db(&db);
        let positions = Coll::<Position>::from_db(&db);
        let counters = Coll::<Counter>::from_db(&db);

        // Attach a position to every election.
        let all: Vec<Election> = elections.find(None, None).await.unwrap().try_collect().await.unwrap();
        for election in &all {
            let id = Counter::next(&counters, POSITION_IDS).await.unwrap();
            positions
                .insert_one(
                    Position {
                        id,
                        position: PositionCore {
                            election_id: election.id,
                            name: format!("President of {}", election.title),
                        },
                    },
                    None,
                )
                .await
                .unwrap();
        }

        // Only the active election's position comes back.
        let response = client
            .get(uri!(active_positions))
            .header(token.header())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let listed: Vec<PositionDescription> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(listed.len(), 1);
        let active = all
            .iter()
            .find(|e| e.title == ElectionSpec::current_example().title)
            .unwrap();
        assert_eq!(listed[0].election_id, active.id);

        // No active election at all: delete it and expect an empty list.
        elections
            .delete_one(doc! { "_id": active.id }, None)
            .await
            .unwrap();
        let response = client
            .get(uri!(active_positions))
            .header(token.header())
            .dispatch()
            .await;
        let listed: Vec<PositionDescription> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(listed.is_empty());
    }
}
