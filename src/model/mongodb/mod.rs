mod collection;
mod counter;
mod errors;

pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::{
    ensure_counters_exist, Counter, CANDIDATE_IDS, ELECTION_IDS, POSITION_IDS, SESSION_IDS,
    USER_IDS, VOTE_IDS,
};
pub use errors::is_duplicate_key_error;
