//! Moderation state machine.
//!
//! Users move between `Active` and `Banned(until)`; publications between
//! `Unlocked` and `Locked`. Every transition is guarded by the Authorization
//! Engine. Login refusal for banned users lives in `accounts::login`.

use uuid::Uuid;

use crate::{
    AppState,
    authorization::{can_lock_publication, can_moderate, require},
    clock::add_calendar_days,
    content,
    error::{CoreError, CoreResult},
    identity::Identity,
    models::{PublicationView, User, UserProfile},
};

async fn load_target(state: &AppState, id: Uuid) -> CoreResult<User> {
    state
        .repo
        .find_user(id)
        .await?
        .ok_or_else(|| CoreError::not_found("user not found"))
}

async fn profile_of(state: &AppState, user: &User) -> CoreResult<UserProfile> {
    let avatar = state.repo.find_avatar(user.id).await?;
    Ok(UserProfile::from_user(user, avatar.as_ref()))
}

/// ban
///
/// `Active | Banned -> Banned(now + duration_days)`. Days are calendar days in
/// the clock's zone, so a ban issued at 10:00 ends at 10:00 local time even
/// across a DST change. Re-banning a banned user overwrites the end date.
pub async fn ban(
    state: &AppState,
    actor: &Identity,
    target_id: Uuid,
    duration_days: u32,
) -> CoreResult<UserProfile> {
    if duration_days == 0 {
        return Err(CoreError::validation("duration_days must be at least 1"));
    }

    let target = load_target(state, target_id).await?;
    require(
        can_moderate(actor, &Identity::from(&target)),
        "not allowed to moderate this user",
    )?;

    let until = add_calendar_days(state.clock.now(), u64::from(duration_days))?;
    let saved = state.repo.set_banned_until(target.id, until.to_utc()).await?;

    tracing::info!(
        actor_id = %actor.id,
        target_id = %saved.id,
        until = %until,
        "user banned"
    );
    profile_of(state, &saved).await
}

/// unban
///
/// `Banned -> Active`. Fails with `Conflict` when the target is not banned at
/// the current instant. The repository re-checks the ban in the same write, so
/// two racing unbans cannot both succeed.
pub async fn unban(state: &AppState, actor: &Identity, target_id: Uuid) -> CoreResult<UserProfile> {
    let target = load_target(state, target_id).await?;
    let snapshot = Identity::from(&target);
    require(
        can_moderate(actor, &snapshot),
        "not allowed to moderate this user",
    )?;

    let now = state.clock.now();
    if !snapshot.is_banned(&now) {
        return Err(CoreError::conflict("user is not banned"));
    }

    let saved = state.repo.clear_ban(target.id, now.to_utc()).await?;

    tracing::info!(actor_id = %actor.id, target_id = %saved.id, "user unbanned");
    profile_of(state, &saved).await
}

/// Sets the locked flag. Re-asserting the current state is not an error.
async fn set_locked(
    state: &AppState,
    actor: &Identity,
    publication_id: Uuid,
    locked: bool,
) -> CoreResult<PublicationView> {
    require(
        can_lock_publication(actor),
        "only moderators can lock or unlock publications",
    )?;

    state.repo.set_publication_locked(publication_id, locked).await?;

    tracing::info!(actor_id = %actor.id, publication_id = %publication_id, locked, "publication lock changed");
    content::get_publication(state, publication_id).await
}

pub async fn lock(state: &AppState, actor: &Identity, publication_id: Uuid) -> CoreResult<PublicationView> {
    set_locked(state, actor, publication_id, true).await
}

pub async fn unlock(state: &AppState, actor: &Identity, publication_id: Uuid) -> CoreResult<PublicationView> {
    set_locked(state, actor, publication_id, false).await
}
