mod token;
mod user;

pub use token::AuthToken;
pub use user::{Admin, Rights, Voter};

#[cfg(test)]
pub use token::BearerToken;
