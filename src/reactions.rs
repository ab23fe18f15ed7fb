//! Reaction Registry: likes and dislikes on publications and comments.

use uuid::Uuid;

use crate::{
    AppState,
    authorization::{can_react, require},
    error::{CoreError, CoreResult},
    identity::Identity,
    models::{Reaction, ReactionKind, ReactionTarget},
};

/// Owner of the publication or comment a reaction points at.
async fn target_owner(state: &AppState, target: ReactionTarget) -> CoreResult<Uuid> {
    match target {
        ReactionTarget::Publication { publication_id } => state
            .repo
            .find_publication(publication_id)
            .await?
            .map(|p| p.user_id)
            .ok_or_else(|| CoreError::not_found("publication not found")),
        ReactionTarget::Comment { comment_id } => state
            .repo
            .find_comment(comment_id)
            .await?
            .map(|c| c.user_id)
            .ok_or_else(|| CoreError::not_found("comment not found")),
    }
}

/// add_reaction
///
/// 1. `Conflict` if the actor already holds a reaction of this kind on the target.
/// 2. `Forbidden` for a dislike on the actor's own content.
/// 3. Persist. The store's unique index turns a concurrent duplicate into `Conflict` too.
///
/// A like and a dislike from the same user on the same target may coexist.
pub async fn add_reaction(
    state: &AppState,
    actor: &Identity,
    target: ReactionTarget,
    kind: ReactionKind,
) -> CoreResult<Reaction> {
    let owner = target_owner(state, target).await?;

    if let Some(existing) = state.repo.find_user_reaction(actor.id, target, kind).await? {
        tracing::debug!(reaction_id = %existing.id, "duplicate reaction refused");
        return Err(CoreError::conflict(kind.duplicate_message()));
    }

    require(can_react(actor, owner, kind), "cannot dislike your own content")?;

    let reaction = Reaction {
        id: Uuid::new_v4(),
        user_id: actor.id,
        kind,
        target,
        created_at: state.clock.now().to_utc(),
    };
    state.repo.insert_reaction(reaction).await
}

/// remove_reaction
///
/// Only the user who reacted may retract; moderators get no override here.
pub async fn remove_reaction(state: &AppState, actor: &Identity, reaction_id: Uuid) -> CoreResult<()> {
    let reaction = state
        .repo
        .find_reaction(reaction_id)
        .await?
        .ok_or_else(|| CoreError::not_found("reaction not found"))?;

    require(
        reaction.user_id == actor.id,
        "only the reacting user can remove a reaction",
    )?;

    if !state.repo.delete_reaction(reaction_id).await? {
        return Err(CoreError::not_found("reaction not found"));
    }
    Ok(())
}

pub async fn list_reactions(state: &AppState, target: ReactionTarget) -> CoreResult<Vec<Reaction>> {
    target_owner(state, target).await?;
    state.repo.target_reactions(target).await
}
