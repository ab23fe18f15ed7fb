use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{post, put},
};

/// Moderation Router Module
///
/// Nested under `/moderation`. Moderators may ban and unban plain users and
/// lock publications; admins may also act on moderators and change roles.
/// Those rules live in the Authorization Engine, not in the router.
pub fn moderation_routes() -> Router<AppState> {
    Router::new()
        // POST /moderation/users/{id}/ban  { "duration_days": 3 }
        .route("/users/{id}/ban", post(handlers::ban_user))
        .route("/users/{id}/unban", post(handlers::unban_user))
        // PUT /moderation/users/{id}/roles
        // Admin only.
        .route("/users/{id}/roles", put(handlers::set_roles))
        .route("/publications/{id}/lock", post(handlers::lock_publication))
        .route(
            "/publications/{id}/unlock",
            post(handlers::unlock_publication),
        )
}
