use rocket::{
    http::Status,
    serde::json::{json, Json, Value},
    Catcher, Request,
};

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Errors raised outside a handler (failed guards, unmatched routes, bad
/// payloads) still produce a JSON body with a `message`.
#[catch(default)]
fn default_catcher(status: Status, _request: &Request) -> (Status, Json<Value>) {
    (status, Json(json!({ "message": status.reason_lossy() })))
}
