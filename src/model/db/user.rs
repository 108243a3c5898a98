use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::Result,
    model::{
        common::{Role, UserId},
        mongodb::{Coll, Counter, USER_IDS},
    },
};

/// Display name given to the bootstrap admin account.
pub const BOOTSTRAP_ADMIN_NAME: &str = "Administrator";

/// Core account data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    pub name: String,
    /// Unique; enforced by an index.
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl UserCore {
    /// Create an account, hashing the given plaintext password.
    pub fn new(
        name: String,
        email: String,
        password: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Self {
        // 16 bytes is recommended for password hashing:
        //  https://en.wikipedia.org/wiki/Argon2
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash =
            argon2::hash_encoded(password.as_bytes(), &salt, &argon2::Config::default())
                .expect("the default argon2 config is valid");
        Self {
            name,
            email,
            password_hash,
            role,
            is_active: true,
            created_at: now,
        }
    }

    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // Unwrap safe because accounts are only ever created via `new`,
        // so the stored hash is always well-formed.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap()
    }
}

/// An account from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// Ensure at least one admin account exists, creating the bootstrap admin
/// from the configured credentials if necessary.
pub async fn ensure_admin_exists(
    users: &Coll<User>,
    counters: &Coll<Counter>,
    config: &Config,
) -> Result<()> {
    if users
        .find_one(doc! { "role": Role::Admin }, None)
        .await?
        .is_some()
    {
        return Ok(());
    }

    warn!("No admin account found, creating the bootstrap admin");
    let id = Counter::next(counters, USER_IDS).await?;
    let admin = User {
        id,
        user: UserCore::new(
            BOOTSTRAP_ADMIN_NAME.to_string(),
            config.admin_email().to_string(),
            config.admin_password(),
            Role::Admin,
            Utc::now(),
        ),
    };
    users.insert_one(admin, None).await?;
    Ok(())
}
