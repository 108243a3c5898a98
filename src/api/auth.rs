use mongodb::bson::doc;
use rocket::{serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{Admin, AuthToken, Rights, Voter},
            user::{LoginRequest, LoginResponse, RegisterRequest, UserDescription},
        },
        common::Role,
        db::{User, UserCore},
        mongodb::{is_duplicate_key_error, Coll, Counter, USER_IDS},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![register, login, admin_login]
}

#[post("/register", data = "<request>", format = "json")]
async fn register(
    request: Json<RegisterRequest>,
    users: Coll<User>,
    counters: Coll<Counter>,
) -> Result<Json<UserDescription>> {
    let user: UserCore = request.0.try_into().map_err(Error::bad_request)?;

    let id = Counter::next(&counters, USER_IDS).await?;
    let user = User { id, user };
    // Email uniqueness is enforced by the index, so a racing duplicate
    // registration loses here rather than slipping through a prior check.
    if let Err(err) = users.insert_one(&user, None).await {
        if is_duplicate_key_error(&err) {
            return Err(Error::Conflict("Email already registered".to_string()));
        }
        return Err(err.into());
    }

    Ok(Json(user.into()))
}

#[post("/login", data = "<request>", format = "json")]
async fn login(
    request: Json<LoginRequest>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Json<LoginResponse>> {
    let user = verified_user(&request, &users).await?;
    issue_token::<Voter>(&user, config)
}

#[post("/admin/login", data = "<request>", format = "json")]
async fn admin_login(
    request: Json<LoginRequest>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Json<LoginResponse>> {
    let user = verified_user(&request, &users).await?;
    // Report a role mismatch exactly like a bad password.
    if user.role != Role::Admin {
        return Err(Error::Unauthorized("Invalid credentials".to_string()));
    }
    issue_token::<Admin>(&user, config)
}

/// Look up the account and check the password and active flag.
async fn verified_user(request: &LoginRequest, users: &Coll<User>) -> Result<User> {
    let user = users
        .find_one(doc! { "email": &request.email }, None)
        .await?
        .filter(|user| user.verify_password(&request.password))
        .ok_or_else(|| Error::Unauthorized("Invalid credentials".to_string()))?;
    if !user.is_active {
        return Err(Error::Unauthorized("Account is deactivated".to_string()));
    }
    Ok(user)
}

fn issue_token<U: Rights>(user: &User, config: &Config) -> Result<Json<LoginResponse>> {
    let token = AuthToken::<U>::new(user).into_token(config)?;
    Ok(Json(LoginResponse {
        token,
        role: user.role,
        user_id: user.id,
    }))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::{serde_json, serde_json::json},
    };

    use super::*;

    #[backend_test]
    async fn register_and_login(client: Client, users: Coll<User>) {
        // Register an account.
        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&RegisterRequest::example()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let created: UserDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(created.role, Role::Voter);
        assert!(created.is_active);

        // Ensure it was inserted with a hashed credential.
        let stored = users
            .find_one(doc! { "email": &RegisterRequest::example().email }, None)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored.password_hash, RegisterRequest::example().password);

        // Log in with the same credentials.
        let response = client
            .post(uri!(login))
            .header(ContentType::JSON)
            .body(
                json!({
                    "email": RegisterRequest::example().email,
                    "password": RegisterRequest::example().password,
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let login_response: LoginResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(login_response.role, Role::Voter);
        assert_eq!(login_response.user_id, created.id);
        assert!(!login_response.token.is_empty());
    }

    #[backend_test]
    async fn duplicate_email_is_a_conflict(client: Client) {
        let body = serde_json::to_string(&RegisterRequest::example()).unwrap();
        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(&body)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        // Same email again, different name.
        let mut duplicate = RegisterRequest::example();
        duplicate.name = "Somebody Else".to_string();
        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&duplicate).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());

        // The first registration remains usable.
        let response = client
            .post(uri!(login))
            .header(ContentType::JSON)
            .body(
                json!({
                    "email": RegisterRequest::example().email,
                    "password": RegisterRequest::example().password,
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
    }

    #[backend_test]
    async fn bad_credentials(client: Client) {
        client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&RegisterRequest::example()).unwrap())
            .dispatch()
            .await;

        // Wrong password.
        let response = client
            .post(uri!(login))
            .header(ContentType::JSON)
            .body(
                json!({
                    "email": RegisterRequest::example().email,
                    "password": "not the password",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());

        // Unknown email.
        let response = client
            .post(uri!(login))
            .header(ContentType::JSON)
            .body(
                json!({
                    "email": "nobody@students.example.ac.ke",
                    "password": "irrelevant-password",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn invalid_registrations_are_rejected(client: Client, users: Coll<User>) {
        for body in [
            json!({ "email": "a@b.c", "password": "long-enough-password" }),
            json!({ "name": "", "email": "a@b.c", "password": "long-enough-password" }),
            json!({ "name": "A", "email": "not-an-address", "password": "long-enough-password" }),
            json!({ "name": "A", "email": "a@b.c", "password": "short" }),
        ] {
            let response = client
                .post(uri!(register))
                .header(ContentType::JSON)
                .body(body.to_string())
                .dispatch()
                .await;
            assert_ne!(Status::Ok, response.status());
        }

        // Only the bootstrap admin exists.
        let count = users.count_documents(None, None).await.unwrap();
        assert_eq!(count, 1);
    }

    #[backend_test]
    async fn voters_cannot_use_admin_login(client: Client) {
        client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&RegisterRequest::example()).unwrap())
            .dispatch()
            .await;

        let response = client
            .post(uri!(admin_login))
            .header(ContentType::JSON)
            .body(
                json!({
                    "email": RegisterRequest::example().email,
                    "password": RegisterRequest::example().password,
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }
}
