use crate::{
    AppState, accounts,
    auth::AuthUser,
    content,
    error::{CoreError, CoreResult},
    moderation,
    models::{
        BanRequest, Comment, CommentNode, CreateCommentRequest, CreatePublicationRequest,
        LoginRequest, NewImage, PresignedUrlRequest, PresignedUrlResponse, PublicationView,
        Reaction, ReactionKind, ReactionTarget, RegisterUserRequest, SetRolesRequest,
        TokenResponse, UpdateAccountRequest, UpdateCommentRequest, UpdatePublicationRequest,
        UserProfile,
    },
    reactions,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

// --- Query Structs ---

/// Pagination
///
/// Query parameters for the publication feed (GET /publications).
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct Pagination {
    /// Page size, clamped to 1..=100. Defaults to 20.
    pub limit: Option<i64>,
    /// Number of publications to skip. Defaults to 0.
    pub offset: Option<i64>,
}

// --- Accounts ---

/// register_user
///
/// [Public Route] Creates an account with the `USER` role.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = UserProfile),
        (status = 400, description = "Invalid username or password"),
        (status = 409, description = "Username taken")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> CoreResult<(StatusCode, Json<UserProfile>)> {
    let profile = accounts::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// login
///
/// [Public Route] Exchanges a username and password for a bearer token.
/// Banned users are refused with 403 until the ban ends.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Bad credentials"),
        (status = 403, description = "Banned")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> CoreResult<Json<TokenResponse>> {
    Ok(Json(accounts::login(&state, payload).await?))
}

/// get_me
///
/// [Authenticated Route] The caller's own profile.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
) -> CoreResult<Json<UserProfile>> {
    Ok(Json(accounts::profile(&state, actor.id).await?))
}

#[utoipa::path(
    patch,
    path = "/me",
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 409, description = "Username taken")
    )
)]
pub async fn update_me(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateAccountRequest>,
) -> CoreResult<Json<UserProfile>> {
    Ok(Json(accounts::update_account(&state, &actor, payload).await?))
}

/// set_avatar
///
/// [Authenticated Route] Replaces the caller's avatar with an already uploaded object.
#[utoipa::path(
    put,
    path = "/me/avatar",
    request_body = NewImage,
    responses((status = 200, description = "Avatar set", body = UserProfile))
)]
pub async fn set_avatar(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<NewImage>,
) -> CoreResult<Json<UserProfile>> {
    Ok(Json(accounts::set_avatar(&state, &actor, payload).await?))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserProfile),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> CoreResult<Json<UserProfile>> {
    Ok(Json(accounts::profile(&state, id).await?))
}

// --- Media ---

/// get_presigned_url
///
/// [Authenticated Route] Generates a 10-minute URL for uploading one image
/// straight to the bucket. The returned `resource_key` is what publications
/// and avatars reference afterwards.
#[utoipa::path(
    post,
    path = "/upload/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "URL", body = PresignedUrlResponse),
        (status = 400, description = "Not an image")
    )
)]
pub async fn get_presigned_url(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> CoreResult<Json<PresignedUrlResponse>> {
    if !payload.file_type.starts_with("image/") {
        return Err(CoreError::validation("only image uploads are accepted"));
    }

    let extension = std::path::Path::new(&payload.filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin")
        .to_ascii_lowercase();
    let object_key = format!("uploads/{}.{}", Uuid::new_v4(), extension);

    let upload_url = state
        .storage
        .get_presigned_upload_url(&object_key, &payload.file_type)
        .await
        .map_err(CoreError::internal)?;

    tracing::debug!(user_id = %actor.id, key = %object_key, "presigned upload issued");
    Ok(Json(PresignedUrlResponse {
        upload_url,
        resource_key: object_key,
    }))
}

// --- Publications ---

/// list_publications
///
/// [Public Route] The feed, newest first.
#[utoipa::path(
    get,
    path = "/publications",
    params(Pagination),
    responses((status = 200, description = "Publications", body = [PublicationView]))
)]
pub async fn list_publications(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> CoreResult<Json<Vec<PublicationView>>> {
    Ok(Json(
        content::list_publications(&state, page.limit, page.offset).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/publications/{id}",
    params(("id" = Uuid, Path, description = "Publication ID")),
    responses(
        (status = 200, description = "Found", body = PublicationView),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_publication(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> CoreResult<Json<PublicationView>> {
    Ok(Json(content::get_publication(&state, id).await?))
}

#[utoipa::path(
    get,
    path = "/users/{id}/publications",
    params(("id" = Uuid, Path, description = "User ID")),
    responses((status = 200, description = "Publications", body = [PublicationView]))
)]
pub async fn list_user_publications(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> CoreResult<Json<Vec<PublicationView>>> {
    Ok(Json(content::list_user_publications(&state, id).await?))
}

/// create_publication
///
/// [Authenticated Route] The owner is always the caller. Images must have been
/// uploaded beforehand through `/upload/presigned`.
#[utoipa::path(
    post,
    path = "/publications",
    request_body = CreatePublicationRequest,
    responses((status = 201, description = "Created", body = PublicationView))
)]
pub async fn create_publication(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePublicationRequest>,
) -> CoreResult<(StatusCode, Json<PublicationView>)> {
    let view = content::create_publication(&state, &actor, payload).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// update_publication
///
/// [Authenticated Route] Owner, or a moderator above the owner.
#[utoipa::path(
    patch,
    path = "/publications/{id}",
    params(("id" = Uuid, Path, description = "Publication ID")),
    request_body = UpdatePublicationRequest,
    responses(
        (status = 200, description = "Updated", body = PublicationView),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_publication(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePublicationRequest>,
) -> CoreResult<Json<PublicationView>> {
    Ok(Json(
        content::update_publication_description(&state, &actor, id, payload).await?,
    ))
}

/// delete_publication
///
/// [Authenticated Route] Removes the publication together with its images,
/// every comment under it and all reactions.
#[utoipa::path(
    delete,
    path = "/publications/{id}",
    params(("id" = Uuid, Path, description = "Publication ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_publication(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> CoreResult<StatusCode> {
    content::delete_publication(&state, &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Comments ---

/// get_comments
///
/// [Public Route] The comment forest of a publication, replies nested under their parents.
#[utoipa::path(
    get,
    path = "/publications/{id}/comments",
    params(("id" = Uuid, Path, description = "Publication ID")),
    responses((status = 200, description = "Comment thread", body = [CommentNode]))
)]
pub async fn get_comments(
    State(state): State<AppState>,
    Path(publication_id): Path<Uuid>,
) -> CoreResult<Json<Vec<CommentNode>>> {
    Ok(Json(content::comment_thread(&state, publication_id).await?))
}

/// add_comment
///
/// [Authenticated Route] Posts a comment, or a reply when `parent_id` is set.
/// Refused with 423 while the publication is locked.
#[utoipa::path(
    post,
    path = "/publications/{id}/comments",
    params(("id" = Uuid, Path, description = "Publication ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment Added", body = Comment),
        (status = 404, description = "Publication or parent not found"),
        (status = 423, description = "Publication locked")
    )
)]
pub async fn add_comment(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(publication_id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> CoreResult<(StatusCode, Json<Comment>)> {
    let comment = content::create_comment(&state, &actor, publication_id, payload).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    patch,
    path = "/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment ID")),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Updated", body = Comment),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_comment(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCommentRequest>,
) -> CoreResult<Json<Comment>> {
    Ok(Json(content::update_comment(&state, &actor, id, payload).await?))
}

/// delete_comment
///
/// [Authenticated Route] Deletes a comment and the whole reply subtree below it.
#[utoipa::path(
    delete,
    path = "/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> CoreResult<StatusCode> {
    content::delete_comment(&state, &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Reactions ---

async fn react(
    state: &AppState,
    actor: AuthUser,
    target: ReactionTarget,
    kind: ReactionKind,
) -> CoreResult<(StatusCode, Json<Reaction>)> {
    let reaction = reactions::add_reaction(state, &actor.0, target, kind).await?;
    Ok((StatusCode::CREATED, Json(reaction)))
}

#[utoipa::path(
    post,
    path = "/publications/{id}/likes",
    params(("id" = Uuid, Path, description = "Publication ID")),
    responses(
        (status = 201, description = "Liked", body = Reaction),
        (status = 409, description = "Already liked")
    )
)]
pub async fn like_publication(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> CoreResult<(StatusCode, Json<Reaction>)> {
    react(&state, actor, ReactionTarget::publication(id), ReactionKind::Like).await
}

/// dislike_publication
///
/// [Authenticated Route] Owners cannot dislike their own publication (403).
#[utoipa::path(
    post,
    path = "/publications/{id}/dislikes",
    params(("id" = Uuid, Path, description = "Publication ID")),
    responses(
        (status = 201, description = "Disliked", body = Reaction),
        (status = 403, description = "Own publication"),
        (status = 409, description = "Already disliked")
    )
)]
pub async fn dislike_publication(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> CoreResult<(StatusCode, Json<Reaction>)> {
    react(&state, actor, ReactionTarget::publication(id), ReactionKind::Dislike).await
}

#[utoipa::path(
    post,
    path = "/comments/{id}/likes",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 201, description = "Liked", body = Reaction),
        (status = 409, description = "Already liked")
    )
)]
pub async fn like_comment(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> CoreResult<(StatusCode, Json<Reaction>)> {
    react(&state, actor, ReactionTarget::comment(id), ReactionKind::Like).await
}

#[utoipa::path(
    post,
    path = "/comments/{id}/dislikes",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 201, description = "Disliked", body = Reaction),
        (status = 403, description = "Own comment"),
        (status = 409, description = "Already disliked")
    )
)]
pub async fn dislike_comment(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> CoreResult<(StatusCode, Json<Reaction>)> {
    react(&state, actor, ReactionTarget::comment(id), ReactionKind::Dislike).await
}

#[utoipa::path(
    get,
    path = "/publications/{id}/reactions",
    params(("id" = Uuid, Path, description = "Publication ID")),
    responses((status = 200, description = "Reactions", body = [Reaction]))
)]
pub async fn publication_reactions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> CoreResult<Json<Vec<Reaction>>> {
    Ok(Json(
        reactions::list_reactions(&state, ReactionTarget::publication(id)).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/comments/{id}/reactions",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses((status = 200, description = "Reactions", body = [Reaction]))
)]
pub async fn comment_reactions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> CoreResult<Json<Vec<Reaction>>> {
    Ok(Json(
        reactions::list_reactions(&state, ReactionTarget::comment(id)).await?,
    ))
}

/// remove_reaction
///
/// [Authenticated Route] Retracts one of the caller's own reactions.
#[utoipa::path(
    delete,
    path = "/reactions/{id}",
    params(("id" = Uuid, Path, description = "Reaction ID")),
    responses(
        (status = 204, description = "Removed"),
        (status = 403, description = "Not yours"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn remove_reaction(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> CoreResult<StatusCode> {
    reactions::remove_reaction(&state, &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Moderation ---

/// ban_user
///
/// [Moderation Route] Bans the target for `duration_days` calendar days in the
/// server's time zone. A moderator may ban users; an admin may ban users and
/// moderators. Nobody may ban an admin or themselves.
#[utoipa::path(
    post,
    path = "/moderation/users/{id}/ban",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = BanRequest,
    responses(
        (status = 200, description = "Banned", body = UserProfile),
        (status = 400, description = "Zero duration"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn ban_user(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BanRequest>,
) -> CoreResult<Json<UserProfile>> {
    Ok(Json(
        moderation::ban(&state, &actor, id, payload.duration_days).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/moderation/users/{id}/unban",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Unbanned", body = UserProfile),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Not banned")
    )
)]
pub async fn unban_user(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> CoreResult<Json<UserProfile>> {
    Ok(Json(moderation::unban(&state, &actor, id).await?))
}

/// set_roles
///
/// [Moderation Route] Admin only. `USER` is always kept in the resulting set.
#[utoipa::path(
    put,
    path = "/moderation/users/{id}/roles",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = SetRolesRequest,
    responses(
        (status = 200, description = "Roles set", body = UserProfile),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn set_roles(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetRolesRequest>,
) -> CoreResult<Json<UserProfile>> {
    Ok(Json(accounts::set_roles(&state, &actor, id, payload).await?))
}

#[utoipa::path(
    post,
    path = "/moderation/publications/{id}/lock",
    params(("id" = Uuid, Path, description = "Publication ID")),
    responses(
        (status = 200, description = "Locked", body = PublicationView),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn lock_publication(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> CoreResult<Json<PublicationView>> {
    Ok(Json(moderation::lock(&state, &actor, id).await?))
}

#[utoipa::path(
    post,
    path = "/moderation/publications/{id}/unlock",
    params(("id" = Uuid, Path, description = "Publication ID")),
    responses(
        (status = 200, description = "Unlocked", body = PublicationView),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn unlock_publication(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> CoreResult<Json<PublicationView>> {
    Ok(Json(moderation::unlock(&state, &actor, id).await?))
}
