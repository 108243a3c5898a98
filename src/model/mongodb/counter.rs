use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
    ClientSession,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::Coll;

/// Counter names, one per id space.
pub const USER_IDS: &str = "user_ids";
pub const ELECTION_IDS: &str = "election_ids";
pub const POSITION_IDS: &str = "position_ids";
pub const CANDIDATE_IDS: &str = "candidate_ids";
pub const SESSION_IDS: &str = "session_ids";
pub const VOTE_IDS: &str = "vote_ids";

const ALL_COUNTERS: [&str; 6] = [
    USER_IDS,
    ELECTION_IDS,
    POSITION_IDS,
    CANDIDATE_IDS,
    SESSION_IDS,
    VOTE_IDS,
];

/// A named counter object used to implement auto-increment ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub name: String,
    pub next: u32,
}

impl Counter {
    /// Atomically retrieve the next value of the named counter.
    pub async fn next(counters: &Coll<Counter>, name: &str) -> Result<u32> {
        let counter = counters
            .find_one_and_update(
                doc! { "_id": name },
                doc! { "$inc": { "next": 1 } },
                Self::return_before(),
            )
            .await?
            .ok_or_else(|| Error::not_found(format!("Counter '{name}'")))?;
        Ok(counter.next)
    }

    /// As [`Counter::next`], but inside an existing causally-consistent session.
    pub async fn next_with_session(
        counters: &Coll<Counter>,
        name: &str,
        session: &mut ClientSession,
    ) -> Result<u32> {
        let counter = counters
            .find_one_and_update_with_session(
                doc! { "_id": name },
                doc! { "$inc": { "next": 1 } },
                Self::return_before(),
                session,
            )
            .await?
            .ok_or_else(|| Error::not_found(format!("Counter '{name}'")))?;
        Ok(counter.next)
    }

    fn return_before() -> FindOneAndUpdateOptions {
        FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build()
    }
}

/// Ensure every id counter exists, starting at 1.
///
/// This operation is idempotent: existing counters are left untouched.
pub async fn ensure_counters_exist(counters: &Coll<Counter>) -> std::result::Result<(), DbError> {
    debug!("Ensuring id counters exist");

    let upsert = UpdateOptions::builder().upsert(true).build();
    for name in ALL_COUNTERS {
        counters
            .update_one(
                doc! { "_id": name },
                doc! { "$setOnInsert": { "next": 1_u32 } },
                upsert.clone(),
            )
            .await?;
    }
    Ok(())
}
