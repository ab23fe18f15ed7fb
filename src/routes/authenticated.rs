use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

/// Authenticated Router Module
///
/// Everything a signed-in user does: account self-service, uploads, authoring
/// publications and comments, and reacting.
///
/// Access Control Strategy:
/// The router is wrapped in the `auth_middleware` layer, and each handler also
/// takes `AuthUser` to get the actor snapshot the services authorize against.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Account ---
        // GET/PATCH /me
        .route("/me", get(handlers::get_me).patch(handlers::update_me))
        // PUT /me/avatar
        // Replaces the avatar; the previous blob is deleted.
        .route("/me/avatar", put(handlers::set_avatar))
        // POST /upload/presigned
        // Short-lived (10-minute) URL for a direct image upload to the bucket.
        .route("/upload/presigned", post(handlers::get_presigned_url))
        // --- Publications ---
        .route("/publications", post(handlers::create_publication))
        // PATCH/DELETE /publications/{id}
        // Owner, or a moderator ranked above the owner.
        .route(
            "/publications/{id}",
            patch(handlers::update_publication).delete(handlers::delete_publication),
        )
        // --- Comments ---
        // POST /publications/{id}/comments
        // 423 while the publication is locked.
        .route("/publications/{id}/comments", post(handlers::add_comment))
        .route(
            "/comments/{id}",
            patch(handlers::update_comment).delete(handlers::delete_comment),
        )
        // --- Reactions ---
        .route("/publications/{id}/likes", post(handlers::like_publication))
        .route(
            "/publications/{id}/dislikes",
            post(handlers::dislike_publication),
        )
        .route("/comments/{id}/likes", post(handlers::like_comment))
        .route("/comments/{id}/dislikes", post(handlers::dislike_comment))
        // DELETE /reactions/{id}
        // Only the reacting user may retract.
        .route("/reactions/{id}", delete(handlers::remove_reaction))
}
