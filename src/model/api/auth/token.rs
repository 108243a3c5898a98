use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use mongodb::bson::doc;
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{
    common::{Role, UserId},
    db::User,
    mongodb::Coll,
};

use super::user::Rights;

/// An authentication token representing a specific account, required to hold
/// the rights of the marker type `U`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct AuthToken<U> {
    pub id: UserId,
    pub role: Role,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// Create a token for the given account.
    pub fn new(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
            phantom: PhantomData,
        }
    }

    /// Sign this token into its bearer string.
    pub fn into_token(self, config: &Config) -> Result<String, Error> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;
        Ok(token)
    }

    /// Decode and verify a bearer string.
    pub fn from_token(token: &str, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)?;
        Ok(token)
    }
}

/// Token claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: Rights + Send,
{
    type Error = Error;

    /// Extract a bearer token from the `Authorization` header, verify it, and
    /// check the account still exists, is active, and holds the required role.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let header = match req.headers().get_one("Authorization") {
            Some(header) => header,
            None => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("Missing bearer token".to_string()),
                ));
            }
        };
        let bearer = match header.strip_prefix("Bearer ") {
            Some(bearer) => bearer.trim(),
            None => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("Malformed Authorization header".to_string()),
                ));
            }
        };

        let token: Self = match Self::from_token(bearer, config) {
            Ok(token) => token,
            Err(_) => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("Invalid or expired token".to_string()),
                ));
            }
        };

        // The account behind the token must still exist and be active, and
        // the stored role (not the claimed one) decides authorization.
        let db = req.guard::<&State<mongodb::Database>>().await.unwrap();
        let user = match Coll::<User>::from_db(db)
            .find_one(doc! { "_id": token.id }, None)
            .await
        {
            Ok(Some(user)) => user,
            Ok(None) => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("Account no longer exists".to_string()),
                ));
            }
            Err(e) => return Outcome::Failure((Status::InternalServerError, e.into())),
        };
        if !user.is_active {
            return Outcome::Failure((
                Status::Unauthorized,
                Error::Unauthorized("Account is deactivated".to_string()),
            ));
        }
        if !U::permits(user.role) {
            return Outcome::Failure((
                Status::Forbidden,
                Error::Forbidden(format!("This action requires the {} role", U::NAME)),
            ));
        }

        Outcome::Success(token)
    }
}

/// A signed bearer string plus the convenience header carrying it, for tests.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[cfg(test)]
impl BearerToken {
    pub fn header(&self) -> rocket::http::Header<'static> {
        rocket::http::Header::new("Authorization", format!("Bearer {}", self.0))
    }
}
