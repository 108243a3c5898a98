use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::datetime::api_datetime,
    common::{Role, UserId},
    db::{User, UserCore},
};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// A raw registration request. The password is plaintext and is never stored
/// directly; conversion to [`UserCore`] hashes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl TryFrom<RegisterRequest> for UserCore {
    type Error = &'static str;

    /// Convert a registration request into a storable account, enforcing
    /// field validity and hashing the password.
    fn try_from(request: RegisterRequest) -> Result<Self, Self::Error> {
        if request.name.trim().is_empty() {
            return Err("Name must not be empty");
        }
        let email = request.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err("Invalid email address");
        }
        if request.password.len() < MIN_PASSWORD_LENGTH {
            return Err("Password must be at least 8 characters");
        }

        Ok(UserCore::new(
            request.name.trim().to_string(),
            email.to_string(),
            &request.password,
            Role::Voter,
            Utc::now(),
        ))
    }
}

/// Raw login credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// A successful login: the bearer token plus the identity it represents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    pub user_id: UserId,
}

/// An admin request to change an account's role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoteRequest {
    pub email: String,
    pub role: Role,
}

/// An API-friendly account description, without the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDescription {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    #[serde(with = "api_datetime")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserDescription {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.user.name,
            email: user.user.email,
            role: user.user.role,
            is_active: user.user.is_active,
            created_at: user.user.created_at,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_validation() {
        let blank_name = RegisterRequest {
            name: "  ".to_string(),
            ..RegisterRequest::example()
        };
        assert!(UserCore::try_from(blank_name).is_err());

        let bad_email = RegisterRequest {
            email: "not-an-address".to_string(),
            ..RegisterRequest::example()
        };
        assert!(UserCore::try_from(bad_email).is_err());

        let short_password = RegisterRequest {
            password: "short".to_string(),
            ..RegisterRequest::example()
        };
        assert!(UserCore::try_from(short_password).is_err());
    }

    #[test]
    fn registration_hashes_the_password() {
        let request = RegisterRequest::example();
        let password = request.password.clone();
        let user = UserCore::try_from(request).unwrap();

        assert_ne!(user.password_hash, password);
        assert!(user.verify_password(&password));
        assert!(!user.verify_password("wrong password"));
        assert_eq!(user.role, Role::Voter);
        assert!(user.is_active);
    }
}
