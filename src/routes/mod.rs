/// Router Module Index
///
/// Routes are grouped by the access they require. Authentication is applied as
/// a layer on whole groups in `create_router`; role decisions are made by the
/// Authorization Engine inside the services.

/// Routes accessible to all clients (read-only feed, registration, login).
pub mod public;

/// Routes protected by the `AuthUser` middleware. Requires a valid bearer token.
pub mod authenticated;

/// Ban, unban, role and lock management, nested under `/moderation`.
/// Authenticated like the group above; each handler asks the Authorization
/// Engine whether the actor may act on the target.
pub mod moderation;
