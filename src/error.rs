use std::io::Cursor;

use rocket::{
    http::{ContentType, Status},
    response::{self, Responder},
    Request, Response,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] mongodb::error::Error),
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn bad_request(what: impl Into<String>) -> Self {
        Self::BadRequest(what.into())
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{} not found", what))
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    /// Every error response is a JSON object with a human-readable `message`.
    /// Internal errors are logged and reported without detail.
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'o> {
        let (status, message) = match self {
            Self::Db(ref err) => {
                error!("Database error: {err}");
                (
                    Status::InternalServerError,
                    "Internal server error".to_string(),
                )
            }
            Self::Jwt(ref err) => {
                error!("Token error: {err}");
                (
                    Status::InternalServerError,
                    "Internal server error".to_string(),
                )
            }
            Self::BadRequest(message) => (Status::BadRequest, message),
            Self::Unauthorized(message) => (Status::Unauthorized, message),
            Self::Forbidden(message) => (Status::Forbidden, message),
            Self::Conflict(message) => (Status::Conflict, message),
            Self::NotFound(message) => (Status::NotFound, message),
        };

        let body = rocket::serde::json::json!({ "message": message }).to_string();
        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}
