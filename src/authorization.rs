//! Authorization Engine.
//!
//! Pure decision functions over identity snapshots. No I/O and no clock: the
//! callers in `content`, `moderation` and `reactions` load the identities and
//! turn a `false` into `CoreError::Forbidden`.
//!
//! Predicates are evaluated in order; each later rule assumes every earlier
//! one did not fire.

use uuid::Uuid;

use crate::{error::CoreError, identity::Identity, models::ReactionKind};

/// May `actor` ban, unban or re-role `target`?
pub fn can_moderate(actor: &Identity, target: &Identity) -> bool {
    if !actor.is_moderator() {
        return false;
    }
    if actor.id == target.id {
        return false;
    }
    // Admins are out of reach of every moderator, other admins included.
    if target.is_admin() {
        return false;
    }
    if actor.roles.is_moderator_only() && target.is_moderator() {
        return false;
    }
    true
}

/// May `actor` edit or delete content authored by `owner`?
pub fn can_edit_or_delete_content(actor: &Identity, owner: &Identity) -> bool {
    if actor.id == owner.id {
        return true;
    }
    if !actor.is_moderator() {
        return false;
    }
    if actor.roles.is_moderator_only() && owner.is_moderator() {
        return false;
    }
    true
}

/// Lock and unlock are open to any MOD or ADMIN, whoever owns the publication.
pub fn can_lock_publication(actor: &Identity) -> bool {
    actor.is_moderator()
}

/// Self-dislike is denied; self-like is allowed.
pub fn can_react(actor: &Identity, target_owner: Uuid, kind: ReactionKind) -> bool {
    match kind {
        ReactionKind::Dislike => actor.id != target_owner,
        ReactionKind::Like => true,
    }
}

/// Turns a verdict into a `Forbidden` error carrying `reason`.
pub fn require(allowed: bool, reason: &str) -> Result<(), CoreError> {
    if allowed {
        Ok(())
    } else {
        tracing::warn!("authorization denied: {}", reason);
        Err(CoreError::forbidden(reason))
    }
}
