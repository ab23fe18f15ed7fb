//! Requests that read a row, then write it, while a moderation transition on
//! the same row commits in between. The wrapper below lets the other write
//! land right after the request's first read, so the request works from a
//! stale snapshot every time.

mod common;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{TestEnv, seed_publication, seed_user, test_env};
use shareboard::{
    accounts, content,
    error::{CoreError, CoreResult},
    identity::{Role, RoleSet, not_banned},
    models::{
        Comment, CreateCommentRequest, Image, Publication, Reaction, ReactionCounts, ReactionKind,
        ReactionTarget, SetRolesRequest, UpdateAccountRequest, UpdatePublicationRequest, User,
    },
    moderation,
    repository::{InMemoryRepository, Repository, RepositoryState},
};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A write made by some other request.
enum Concurrent {
    Lock(Uuid),
    Ban(Uuid, DateTime<Utc>),
    Unban(Uuid, DateTime<Utc>),
}

/// Delegates to the in-memory store. The first `find_user` or
/// `find_publication` returns what was stored, then applies the pending write.
struct InterleavedRepository {
    inner: Arc<InMemoryRepository>,
    pending: Mutex<Option<Concurrent>>,
}

impl InterleavedRepository {
    async fn commit_pending(&self) -> CoreResult<()> {
        let pending = self.pending.lock().ok().and_then(|mut slot| slot.take());
        match pending {
            Some(Concurrent::Lock(id)) => {
                self.inner.set_publication_locked(id, true).await?;
            }
            Some(Concurrent::Ban(id, until)) => {
                self.inner.set_banned_until(id, until).await?;
            }
            Some(Concurrent::Unban(id, now)) => {
                self.inner.clear_ban(id, now).await?;
            }
            None => {}
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for InterleavedRepository {
    async fn find_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        let snapshot = self.inner.find_user(id).await?;
        self.commit_pending().await?;
        Ok(snapshot)
    }
    async fn find_user_by_username(&self, username: &str) -> CoreResult<Option<User>> {
        self.inner.find_user_by_username(username).await
    }
    async fn insert_user(&self, user: User) -> CoreResult<User> {
        self.inner.insert_user(user).await
    }
    async fn update_credentials(&self, id: Uuid, username: &str, password_hash: &str) -> CoreResult<User> {
        self.inner.update_credentials(id, username, password_hash).await
    }
    async fn set_roles(&self, id: Uuid, roles: &RoleSet) -> CoreResult<User> {
        self.inner.set_roles(id, roles).await
    }
    async fn set_banned_until(&self, id: Uuid, until: DateTime<Utc>) -> CoreResult<User> {
        self.inner.set_banned_until(id, until).await
    }
    async fn clear_ban(&self, id: Uuid, now: DateTime<Utc>) -> CoreResult<User> {
        self.inner.clear_ban(id, now).await
    }
    async fn find_publication(&self, id: Uuid) -> CoreResult<Option<Publication>> {
        let snapshot = self.inner.find_publication(id).await?;
        self.commit_pending().await?;
        Ok(snapshot)
    }
    async fn list_publications(&self, limit: i64, offset: i64) -> CoreResult<Vec<Publication>> {
        self.inner.list_publications(limit, offset).await
    }
    async fn list_user_publications(&self, user_id: Uuid) -> CoreResult<Vec<Publication>> {
        self.inner.list_user_publications(user_id).await
    }
    async fn insert_publication(&self, publication: Publication, images: Vec<Image>) -> CoreResult<Publication> {
        self.inner.insert_publication(publication, images).await
    }
    async fn update_publication_description(&self, id: Uuid, description: &str) -> CoreResult<Publication> {
        self.inner.update_publication_description(id, description).await
    }
    async fn set_publication_locked(&self, id: Uuid, locked: bool) -> CoreResult<Publication> {
        self.inner.set_publication_locked(id, locked).await
    }
    async fn delete_publication(&self, id: Uuid) -> CoreResult<bool> {
        self.inner.delete_publication(id).await
    }
    async fn publication_images(&self, publication_id: Uuid) -> CoreResult<Vec<Image>> {
        self.inner.publication_images(publication_id).await
    }
    async fn find_avatar(&self, user_id: Uuid) -> CoreResult<Option<Image>> {
        self.inner.find_avatar(user_id).await
    }
    async fn replace_avatar(&self, user_id: Uuid, image: Image) -> CoreResult<Option<Image>> {
        self.inner.replace_avatar(user_id, image).await
    }
    async fn find_comment(&self, id: Uuid) -> CoreResult<Option<Comment>> {
        self.inner.find_comment(id).await
    }
    async fn publication_comments(&self, publication_id: Uuid) -> CoreResult<Vec<Comment>> {
        self.inner.publication_comments(publication_id).await
    }
    async fn insert_comment(&self, comment: Comment) -> CoreResult<Comment> {
        self.inner.insert_comment(comment).await
    }
    async fn update_comment(&self, comment: Comment) -> CoreResult<Comment> {
        self.inner.update_comment(comment).await
    }
    async fn delete_comment(&self, id: Uuid) -> CoreResult<bool> {
        self.inner.delete_comment(id).await
    }
    async fn find_reaction(&self, id: Uuid) -> CoreResult<Option<Reaction>> {
        self.inner.find_reaction(id).await
    }
    async fn find_user_reaction(
        &self,
        user_id: Uuid,
        target: ReactionTarget,
        kind: ReactionKind,
    ) -> CoreResult<Option<Reaction>> {
        self.inner.find_user_reaction(user_id, target, kind).await
    }
    async fn target_reactions(&self, target: ReactionTarget) -> CoreResult<Vec<Reaction>> {
        self.inner.target_reactions(target).await
    }
    async fn count_reactions(&self, target: ReactionTarget) -> CoreResult<ReactionCounts> {
        self.inner.count_reactions(target).await
    }
    async fn insert_reaction(&self, reaction: Reaction) -> CoreResult<Reaction> {
        self.inner.insert_reaction(reaction).await
    }
    async fn delete_reaction(&self, id: Uuid) -> CoreResult<bool> {
        self.inner.delete_reaction(id).await
    }
}

/// Routes the state's repository through the wrapper; `env.repo` still sees the store.
fn interleave(env: &mut TestEnv, write: Concurrent) {
    let wrapper = InterleavedRepository {
        inner: env.repo.clone(),
        pending: Mutex::new(Some(write)),
    };
    env.state.repo = Arc::new(wrapper) as RepositoryState;
}

fn ban_end(env: &TestEnv) -> DateTime<Utc> {
    env.state.clock.now().to_utc() + Duration::days(3)
}

#[tokio::test]
async fn test_description_edit_keeps_lock_set_after_its_read() {
    let mut env = test_env();
    let owner = seed_user(&env, "owner", &[Role::User]).await;
    let reader = seed_user(&env, "reader", &[Role::User]).await;
    let id = seed_publication(&env, &owner, &[]).await.publication.id;

    interleave(&mut env, Concurrent::Lock(id));
    let view = content::update_publication_description(
        &env.state,
        &owner,
        id,
        UpdatePublicationRequest {
            description: "edited".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(view.publication.description, "edited");
    assert!(view.publication.locked);
    let stored = env.repo.find_publication(id).await.unwrap().unwrap();
    assert!(stored.locked);

    let err = content::create_comment(
        &env.state,
        &reader,
        id,
        CreateCommentRequest {
            content: "sneaking in".to_string(),
            parent_id: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CoreError::Locked(_)));
}

#[tokio::test]
async fn test_account_update_keeps_ban_set_after_its_read() {
    let mut env = test_env();
    let target = seed_user(&env, "target", &[Role::User]).await;
    let until = ban_end(&env);

    interleave(&mut env, Concurrent::Ban(target.id, until));
    let profile = accounts::update_account(
        &env.state,
        &target,
        UpdateAccountRequest {
            username: Some("renamed".to_string()),
            password: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(profile.username, "renamed");
    let stored = env.repo.find_user(target.id).await.unwrap().unwrap();
    assert_eq!(stored.banned_until, until);
}

#[tokio::test]
async fn test_role_change_keeps_ban_set_after_its_read() {
    let mut env = test_env();
    let admin = seed_user(&env, "admin", &[Role::User, Role::Admin]).await;
    let target = seed_user(&env, "target", &[Role::User]).await;
    let until = ban_end(&env);

    interleave(&mut env, Concurrent::Ban(target.id, until));
    let profile = accounts::set_roles(
        &env.state,
        &admin,
        target.id,
        SetRolesRequest {
            roles: vec![Role::Moderator],
        },
    )
    .await
    .unwrap();

    assert_eq!(profile.roles, vec![Role::User, Role::Moderator]);
    assert_eq!(profile.banned_until, until);
}

#[tokio::test]
async fn test_second_of_two_racing_unbans_conflicts() {
    let mut env = test_env();
    let moderator = seed_user(&env, "mod", &[Role::Moderator]).await;
    let target = seed_user(&env, "target", &[Role::User]).await;
    moderation::ban(&env.state, &moderator, target.id, 3).await.unwrap();

    // The other unban commits after this one has seen the user as banned.
    let now = env.state.clock.now().to_utc();
    interleave(&mut env, Concurrent::Unban(target.id, now));
    let err = moderation::unban(&env.state, &moderator, target.id)
        .await
        .unwrap_err();

    assert_eq!(err, CoreError::Conflict("user is not banned".to_string()));
    let stored = env.repo.find_user(target.id).await.unwrap().unwrap();
    assert_eq!(stored.banned_until, not_banned());
}
