use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token: health, account creation, login and
/// every read of the content graph.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        .route("/register", post(handlers::register_user))
        // POST /login
        // Issues a bearer token. Banned users get 403 here.
        .route("/login", post(handlers::login))
        // GET /publications?limit=..&offset=..
        // The feed, newest first.
        .route("/publications", get(handlers::list_publications))
        .route("/publications/{id}", get(handlers::get_publication))
        // GET /publications/{id}/comments
        // Nested comment forest, replies under their parents.
        .route("/publications/{id}/comments", get(handlers::get_comments))
        .route(
            "/publications/{id}/reactions",
            get(handlers::publication_reactions),
        )
        .route("/comments/{id}/reactions", get(handlers::comment_reactions))
        .route("/users/{id}", get(handlers::get_user))
        .route(
            "/users/{id}/publications",
            get(handlers::list_user_publications),
        )
}
