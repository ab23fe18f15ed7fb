mod common;

use common::{seed_publication, seed_user, test_env};
use shareboard::{
    content,
    error::CoreError,
    identity::Role,
    models::{CreateCommentRequest, ReactionKind, ReactionTarget},
    reactions,
};
use uuid::Uuid;

#[tokio::test]
async fn test_like_and_count() {
    let env = test_env();
    let owner = seed_user(&env, "owner", &[Role::User]).await;
    let fan = seed_user(&env, "fan", &[Role::User]).await;
    let id = seed_publication(&env, &owner, &[]).await.publication.id;
    let target = ReactionTarget::publication(id);

    let reaction = reactions::add_reaction(&env.state, &fan, target, ReactionKind::Like)
        .await
        .unwrap();
    assert_eq!(reaction.user_id, fan.id);
    assert_eq!(reaction.target, target);

    let view = content::get_publication(&env.state, id).await.unwrap();
    assert_eq!(view.reactions.likes, 1);
    assert_eq!(view.reactions.dislikes, 0);
}

#[tokio::test]
async fn test_duplicate_like_is_conflict() {
    let env = test_env();
    let owner = seed_user(&env, "owner", &[Role::User]).await;
    let fan = seed_user(&env, "fan", &[Role::User]).await;
    let target = ReactionTarget::publication(seed_publication(&env, &owner, &[]).await.publication.id);

    reactions::add_reaction(&env.state, &fan, target, ReactionKind::Like).await.unwrap();
    let err = reactions::add_reaction(&env.state, &fan, target, ReactionKind::Like)
        .await
        .unwrap_err();

    assert_eq!(err, CoreError::Conflict("already liked".to_string()));
}

#[tokio::test]
async fn test_like_and_dislike_can_coexist() {
    let env = test_env();
    let owner = seed_user(&env, "owner", &[Role::User]).await;
    let fan = seed_user(&env, "fan", &[Role::User]).await;
    let id = seed_publication(&env, &owner, &[]).await.publication.id;
    let target = ReactionTarget::publication(id);

    reactions::add_reaction(&env.state, &fan, target, ReactionKind::Like).await.unwrap();
    reactions::add_reaction(&env.state, &fan, target, ReactionKind::Dislike).await.unwrap();

    let err = reactions::add_reaction(&env.state, &fan, target, ReactionKind::Dislike)
        .await
        .unwrap_err();
    assert_eq!(err, CoreError::Conflict("already disliked".to_string()));

    let view = content::get_publication(&env.state, id).await.unwrap();
    assert_eq!((view.reactions.likes, view.reactions.dislikes), (1, 1));
}

#[tokio::test]
async fn test_self_like_allowed_self_dislike_forbidden() {
    let env = test_env();
    let owner = seed_user(&env, "owner", &[Role::User]).await;
    let id = seed_publication(&env, &owner, &[]).await.publication.id;
    let c = content::create_comment(
        &env.state,
        &owner,
        id,
        CreateCommentRequest {
            content: "mine".to_string(),
            parent_id: None,
        },
    )
    .await
    .unwrap();

    for target in [ReactionTarget::publication(id), ReactionTarget::comment(c.id)] {
        assert!(
            reactions::add_reaction(&env.state, &owner, target, ReactionKind::Like)
                .await
                .is_ok()
        );
        let err = reactions::add_reaction(&env.state, &owner, target, ReactionKind::Dislike)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }
}

#[tokio::test]
async fn test_moderators_cannot_dislike_own_content_either() {
    let env = test_env();
    let admin = seed_user(&env, "admin", &[Role::Admin]).await;
    let id = seed_publication(&env, &admin, &[]).await.publication.id;

    let err = reactions::add_reaction(&env.state, &admin, ReactionTarget::publication(id), ReactionKind::Dislike)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
}

#[tokio::test]
async fn test_reaction_on_missing_target_is_not_found() {
    let env = test_env();
    let fan = seed_user(&env, "fan", &[Role::User]).await;

    for target in [
        ReactionTarget::publication(Uuid::new_v4()),
        ReactionTarget::comment(Uuid::new_v4()),
    ] {
        let err = reactions::add_reaction(&env.state, &fan, target, ReactionKind::Like)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}

#[tokio::test]
async fn test_remove_reaction_owner_only() {
    let env = test_env();
    let owner = seed_user(&env, "owner", &[Role::User]).await;
    let fan = seed_user(&env, "fan", &[Role::User]).await;
    let admin = seed_user(&env, "admin", &[Role::Admin]).await;
    let target = ReactionTarget::publication(seed_publication(&env, &owner, &[]).await.publication.id);

    let reaction = reactions::add_reaction(&env.state, &fan, target, ReactionKind::Like)
        .await
        .unwrap();

    for other in [&owner, &admin] {
        let err = reactions::remove_reaction(&env.state, other, reaction.id).await.unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    reactions::remove_reaction(&env.state, &fan, reaction.id).await.unwrap();
    assert!(reactions::list_reactions(&env.state, target).await.unwrap().is_empty());

    let err = reactions::remove_reaction(&env.state, &fan, reaction.id).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    // Liking again after retracting is allowed.
    assert!(
        reactions::add_reaction(&env.state, &fan, target, ReactionKind::Like)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_list_reactions_per_target() {
    let env = test_env();
    let owner = seed_user(&env, "owner", &[Role::User]).await;
    let a = seed_user(&env, "a-user", &[Role::User]).await;
    let b = seed_user(&env, "b-user", &[Role::User]).await;
    let p1 = ReactionTarget::publication(seed_publication(&env, &owner, &[]).await.publication.id);
    let p2 = ReactionTarget::publication(seed_publication(&env, &owner, &[]).await.publication.id);

    reactions::add_reaction(&env.state, &a, p1, ReactionKind::Like).await.unwrap();
    reactions::add_reaction(&env.state, &b, p1, ReactionKind::Dislike).await.unwrap();
    reactions::add_reaction(&env.state, &b, p2, ReactionKind::Like).await.unwrap();

    let on_p1 = reactions::list_reactions(&env.state, p1).await.unwrap();
    assert_eq!(on_p1.len(), 2);
    assert!(on_p1.iter().all(|r| r.target == p1));
}
