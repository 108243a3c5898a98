//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in a DB-friendly way, e.g.
//! datetimes are serialised in MongoDB's own format.

mod candidate;
pub use candidate::{Candidate, CandidateCore};

mod election;
pub use election::{Election, ElectionCore};

mod position;
pub use position::{Position, PositionCore};

mod session;
pub use session::{VotingSession, VotingSessionCore};

mod user;
pub use user::{ensure_admin_exists, User, UserCore, BOOTSTRAP_ADMIN_NAME};

mod vote;
pub use vote::{Vote, VoteCore};
