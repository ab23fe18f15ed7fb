use axum::{
    extract::{FromRef, Request},
    http::HeaderName,
    Router,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// Domain core: identity, authorization, content graph, moderation, reactions.
pub mod accounts;
pub mod authorization;
pub mod clock;
pub mod content;
pub mod error;
pub mod identity;
pub mod moderation;
pub mod reactions;

// Infrastructure and HTTP surface.
pub mod auth;
pub mod config;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod storage;

// Route groups: public, authenticated, moderation.
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

pub use clock::{ClockState, FixedClock, SystemClock};
pub use config::AppConfig;
pub use error::{CoreError, CoreResult};
pub use identity::{Identity, Role, RoleSet};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the
/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login, handlers::get_me, handlers::update_me,
        handlers::set_avatar, handlers::get_user, handlers::get_presigned_url,
        handlers::list_publications, handlers::get_publication, handlers::list_user_publications,
        handlers::create_publication, handlers::update_publication, handlers::delete_publication,
        handlers::get_comments, handlers::add_comment, handlers::update_comment,
        handlers::delete_comment, handlers::like_publication, handlers::dislike_publication,
        handlers::like_comment, handlers::dislike_comment, handlers::publication_reactions,
        handlers::comment_reactions, handlers::remove_reaction, handlers::ban_user,
        handlers::unban_user, handlers::set_roles, handlers::lock_publication,
        handlers::unlock_publication
    ),
    components(
        schemas(
            identity::Role, models::Publication, models::Comment, models::Image,
            models::ImageOwner, models::Reaction, models::ReactionKind, models::ReactionTarget,
            models::ReactionCounts, models::RegisterUserRequest, models::LoginRequest,
            models::TokenResponse, models::UpdateAccountRequest, models::SetRolesRequest,
            models::BanRequest, models::NewImage, models::CreatePublicationRequest,
            models::UpdatePublicationRequest, models::CreateCommentRequest,
            models::UpdateCommentRequest, models::PresignedUrlRequest,
            models::PresignedUrlResponse, models::UserProfile, models::PublicationView,
            models::CommentNode,
        )
    ),
    tags(
        (name = "shareboard", description = "Publications, threaded comments, reactions and moderation")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, shared container of application services. Cloning is cheap:
/// every service sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Persistence of the content graph (Postgres, or in-memory for tests).
    pub repo: RepositoryState,
    /// Image blob store (S3/MinIO, or a mock for tests).
    pub storage: StorageState,
    /// Source of "now" and of the zone used for calendar-day arithmetic.
    pub clock: ClockState,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// Let extractors such as `AuthUser` pull single components out of the shared state.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for ClockState {
    fn from_ref(app_state: &AppState) -> ClockState {
        app_state.clock.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces authentication for the authenticated and moderation groups.
///
/// Extracting `AuthUser` validates the bearer token and re-reads the user; any
/// failure rejects the request with 401 before the handler runs.
async fn auth_middleware(
    _auth_user: AuthUser,
    request: Request,
    next: Next,
) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the public, authenticated and moderation groups, the Swagger UI,
/// and the request-id/trace/CORS layers around them.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Route groups
    let base_router = Router::new()
        // OpenAPI JSON plus Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Reads, registration and login.
        .merge(public::public_routes())
        // Everything that acts as a user needs a valid token.
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware
                ))
        )

        // Moderation Routes: Nested under '/moderation', authenticated the same way.
        // Who may act on whom is decided by the Authorization Engine in the services.
        .nest(
            "/moderation",
            routes::moderation::moderation_routes()
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware
                ))
        )

        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
             ServiceBuilder::new()
                 // 3a. Stamp every request with a UUID `x-request-id`.
                 .layer(SetRequestIdLayer::new(
                     x_request_id.clone(),
                     MakeRequestUuid,
                 ))
                 // 3b. One span per request, carrying the request id.
                 .layer(
                     TraceLayer::new_for_http()
                         .make_span_with(trace_span_logger)
                         .on_response(
                             DefaultOnResponse::new()
                                 .level(Level::INFO)
                                 .latency_unit(tower_http::LatencyUnit::Millis)
                         )
                 )
                 // 3c. Echo the request id back on the response.
                 .layer(PropagateRequestIdLayer::new(x_request_id))
        )
        // 4. CORS (outermost)
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span for `TraceLayer`, tagging it with the
/// `x-request-id` so every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
