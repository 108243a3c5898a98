use crate::model::common::Role;

/// An access requirement attached to a token marker type. Handlers request
/// `AuthToken<Voter>` or `AuthToken<Admin>` and the guard enforces the
/// requirement before the handler body runs.
pub trait Rights {
    /// Human-readable name, used in authorization error messages.
    const NAME: &'static str;

    /// Does the given role satisfy this requirement?
    fn permits(role: Role) -> bool;
}

/// Marker for routes any signed-in account may call.
pub struct Voter;

/// Marker for admin-only routes.
pub struct Admin;

impl Rights for Voter {
    const NAME: &'static str = "voter";

    fn permits(_: Role) -> bool {
        true
    }
}

impl Rights for Admin {
    const NAME: &'static str = "admin";

    fn permits(role: Role) -> bool {
        role == Role::Admin
    }
}
