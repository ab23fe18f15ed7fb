//! Accounts: registration, login and the self-service side of a user record.

use uuid::Uuid;

use crate::{
    AppState,
    auth::{hash_password, issue_token, verify_password},
    authorization::{can_moderate, require},
    content::{image_from_upload, remove_blobs},
    error::{CoreError, CoreResult},
    identity::{Identity, Role, RoleSet, not_banned},
    models::{
        ImageOwner, LoginRequest, NewImage, RegisterUserRequest, SetRolesRequest, TokenResponse,
        UpdateAccountRequest, User, UserProfile,
    },
};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 32;
pub const PASSWORD_MIN_LEN: usize = 8;

/// Trims and checks a username: 3 to 32 characters of `[A-Za-z0-9_.-]`.
fn validate_username(raw: &str) -> CoreResult<String> {
    let username = raw.trim();
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(CoreError::validation(format!(
            "username must be between {} and {} characters",
            USERNAME_MIN_LEN, USERNAME_MAX_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(CoreError::validation(
            "username may only contain letters, digits, '_', '.' and '-'",
        ));
    }
    Ok(username.to_string())
}

fn validate_password(password: &str) -> CoreResult<()> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(CoreError::validation(format!(
            "password must be at least {} characters",
            PASSWORD_MIN_LEN
        )));
    }
    Ok(())
}

async fn load_user(state: &AppState, id: Uuid) -> CoreResult<User> {
    state
        .repo
        .find_user(id)
        .await?
        .ok_or_else(|| CoreError::not_found("user not found"))
}

/// register
///
/// Creates an account with the single role `USER` and no ban.
pub async fn register(state: &AppState, req: RegisterUserRequest) -> CoreResult<UserProfile> {
    let username = validate_username(&req.username)?;
    validate_password(&req.password)?;

    let user = User {
        id: Uuid::new_v4(),
        username,
        roles: RoleSet::user(),
        password_hash: hash_password(&req.password)?,
        banned_until: not_banned(),
    };
    let created = state.repo.insert_user(user).await?;

    tracing::info!(user_id = %created.id, username = %created.username, "user registered");
    Ok(UserProfile::from_user(&created, None))
}

/// login
///
/// Unknown usernames and wrong passwords are indistinguishable to the caller
/// (`Unauthenticated`). A user whose ban is still running gets `Forbidden`.
pub async fn login(state: &AppState, req: LoginRequest) -> CoreResult<TokenResponse> {
    let user = state
        .repo
        .find_user_by_username(req.username.trim())
        .await?
        .ok_or(CoreError::Unauthenticated)?;

    if !verify_password(&req.password, &user.password_hash) {
        tracing::debug!(user_id = %user.id, "login refused: bad password");
        return Err(CoreError::Unauthenticated);
    }

    let now = state.clock.now();
    if Identity::from(&user).is_banned(&now) {
        let until = user.banned_until.with_timezone(&now.timezone());
        tracing::warn!(user_id = %user.id, until = %until, "login refused: user banned");
        return Err(CoreError::forbidden(format!("banned until {}", until.to_rfc3339())));
    }

    let (access_token, expires_at) = issue_token(&state.config, user.id, &now)?;
    Ok(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_at,
    })
}

pub async fn profile(state: &AppState, user_id: Uuid) -> CoreResult<UserProfile> {
    let user = load_user(state, user_id).await?;
    let avatar = state.repo.find_avatar(user.id).await?;
    Ok(UserProfile::from_user(&user, avatar.as_ref()))
}

/// update_account
///
/// Changes the caller's own username and/or password. Fields left out of the
/// request keep their value.
pub async fn update_account(
    state: &AppState,
    actor: &Identity,
    req: UpdateAccountRequest,
) -> CoreResult<UserProfile> {
    let user = load_user(state, actor.id).await?;

    let username = match req.username.as_deref() {
        Some(username) => validate_username(username)?,
        None => user.username,
    };
    let password_hash = match req.password.as_deref() {
        Some(password) => {
            validate_password(password)?;
            hash_password(password)?
        }
        None => user.password_hash,
    };

    let saved = state
        .repo
        .update_credentials(user.id, &username, &password_hash)
        .await?;
    profile(state, saved.id).await
}

/// set_roles
///
/// Replaces the target's roles. Only admins may call it, and only on users
/// they are allowed to moderate. `USER` is always kept.
pub async fn set_roles(
    state: &AppState,
    actor: &Identity,
    target_id: Uuid,
    req: SetRolesRequest,
) -> CoreResult<UserProfile> {
    require(actor.is_admin(), "only admins can change roles")?;
    if req.roles.is_empty() {
        return Err(CoreError::validation("roles must not be empty"));
    }

    let target = load_user(state, target_id).await?;
    require(
        can_moderate(actor, &Identity::from(&target)),
        "not allowed to moderate this user",
    )?;

    let mut roles = RoleSet::new(req.roles);
    roles.insert(Role::User);
    let saved = state.repo.set_roles(target.id, &roles).await?;

    tracing::info!(
        actor_id = %actor.id,
        target_id = %saved.id,
        roles = ?saved.roles.to_strings(),
        "roles updated"
    );
    profile(state, saved.id).await
}

/// set_avatar
///
/// Points the caller's avatar at an uploaded object. The previous avatar row is
/// replaced in the same repository call and its blob removed afterwards.
pub async fn set_avatar(state: &AppState, actor: &Identity, upload: NewImage) -> CoreResult<UserProfile> {
    let user = load_user(state, actor.id).await?;
    let image = image_from_upload(state, &upload, ImageOwner::Avatar { user_id: user.id })?;
    let new_key = image.key.clone();

    if let Some(previous) = state.repo.replace_avatar(user.id, image).await? {
        if previous.key != new_key {
            remove_blobs(state, std::slice::from_ref(&previous)).await;
        }
    }
    profile(state, user.id).await
}
