use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::Repository;
use crate::{
    error::{CoreError, CoreResult},
    identity::{RoleSet, not_banned},
    models::{
        Comment, Image, ImageOwner, Publication, Reaction, ReactionCounts, ReactionKind,
        ReactionTarget, User,
    },
};

#[derive(Default)]
struct Store {
    users: HashMap<Uuid, User>,
    publications: HashMap<Uuid, Publication>,
    comments: HashMap<Uuid, Comment>,
    images: HashMap<Uuid, Image>,
    reactions: HashMap<Uuid, Reaction>,
}

impl Store {
    /// Ids of `root` and every comment below it, found by walking parent ids.
    fn comment_subtree(&self, root: Uuid) -> HashSet<Uuid> {
        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for comment in self.comments.values() {
            if let Some(parent) = comment.parent_id {
                children.entry(parent).or_default().push(comment.id);
            }
        }

        let mut found = HashSet::new();
        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            if found.insert(id) {
                if let Some(kids) = children.get(&id) {
                    pending.extend(kids.iter().copied());
                }
            }
        }
        found
    }

    fn user_mut(&mut self, id: Uuid) -> CoreResult<&mut User> {
        self.users
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("user not found"))
    }

    fn publication_mut(&mut self, id: Uuid) -> CoreResult<&mut Publication> {
        self.publications
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("publication not found"))
    }

    fn remove_comments(&mut self, ids: &HashSet<Uuid>) {
        self.comments.retain(|id, _| !ids.contains(id));
        self.reactions.retain(|_, reaction| match reaction.target {
            ReactionTarget::Comment { comment_id } => !ids.contains(&comment_id),
            ReactionTarget::Publication { .. } => true,
        });
    }

    fn counts(&self, target: ReactionTarget) -> ReactionCounts {
        self.reactions
            .values()
            .filter(|r| r.target == target)
            .fold(ReactionCounts::default(), |mut acc, r| {
                match r.kind {
                    ReactionKind::Like => acc.likes += 1,
                    ReactionKind::Dislike => acc.dislikes += 1,
                }
                acc
            })
    }
}

/// InMemoryRepository
///
/// Arena-style `Repository`: every entity lives in a map keyed by id and
/// relations are plain ids. A single lock around the whole store makes each
/// method atomic, and the uniqueness and cascade rules mirror the SQL schema.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> CoreResult<RwLockReadGuard<'_, Store>> {
        self.store
            .read()
            .map_err(|_| CoreError::internal("in-memory store lock poisoned"))
    }

    fn write(&self) -> CoreResult<RwLockWriteGuard<'_, Store>> {
        self.store
            .write()
            .map_err(|_| CoreError::internal("in-memory store lock poisoned"))
    }

    /// Total number of stored rows, per table. Lets tests check that a cascade
    /// removed exactly what it should.
    pub fn row_counts(&self) -> CoreResult<RowCounts> {
        let store = self.read()?;
        Ok(RowCounts {
            users: store.users.len(),
            publications: store.publications.len(),
            comments: store.comments.len(),
            images: store.images.len(),
            reactions: store.reactions.len(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCounts {
    pub users: usize,
    pub publications: usize,
    pub comments: usize,
    pub images: usize,
    pub reactions: usize,
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> CoreResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn insert_user(&self, user: User) -> CoreResult<User> {
        let mut store = self.write()?;
        if store.users.values().any(|u| u.username == user.username) {
            return Err(CoreError::conflict("username is already taken"));
        }
        store.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_credentials(
        &self,
        id: Uuid,
        username: &str,
        password_hash: &str,
    ) -> CoreResult<User> {
        let mut store = self.write()?;
        if store
            .users
            .values()
            .any(|u| u.id != id && u.username == username)
        {
            return Err(CoreError::conflict("username is already taken"));
        }
        let stored = store.user_mut(id)?;
        stored.username = username.to_string();
        stored.password_hash = password_hash.to_string();
        Ok(stored.clone())
    }

    async fn set_roles(&self, id: Uuid, roles: &RoleSet) -> CoreResult<User> {
        let mut store = self.write()?;
        let stored = store.user_mut(id)?;
        stored.roles = roles.clone();
        Ok(stored.clone())
    }

    async fn set_banned_until(&self, id: Uuid, until: DateTime<Utc>) -> CoreResult<User> {
        let mut store = self.write()?;
        let stored = store.user_mut(id)?;
        stored.banned_until = until;
        Ok(stored.clone())
    }

    async fn clear_ban(&self, id: Uuid, now: DateTime<Utc>) -> CoreResult<User> {
        let mut store = self.write()?;
        let stored = store.user_mut(id)?;
        if stored.banned_until <= now {
            return Err(CoreError::conflict("user is not banned"));
        }
        stored.banned_until = not_banned();
        Ok(stored.clone())
    }

    async fn find_publication(&self, id: Uuid) -> CoreResult<Option<Publication>> {
        Ok(self.read()?.publications.get(&id).cloned())
    }

    async fn list_publications(&self, limit: i64, offset: i64) -> CoreResult<Vec<Publication>> {
        let mut all: Vec<Publication> = self.read()?.publications.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn list_user_publications(&self, user_id: Uuid) -> CoreResult<Vec<Publication>> {
        let mut owned: Vec<Publication> = self
            .read()?
            .publications
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(owned)
    }

    async fn insert_publication(
        &self,
        publication: Publication,
        images: Vec<Image>,
    ) -> CoreResult<Publication> {
        let mut store = self.write()?;
        if !store.users.contains_key(&publication.user_id) {
            return Err(CoreError::internal("publication owner does not exist"));
        }
        store.publications.insert(publication.id, publication.clone());
        for mut image in images {
            image.owner = ImageOwner::Publication {
                publication_id: publication.id,
            };
            store.images.insert(image.id, image);
        }
        Ok(publication)
    }

    async fn update_publication_description(
        &self,
        id: Uuid,
        description: &str,
    ) -> CoreResult<Publication> {
        let mut store = self.write()?;
        let stored = store.publication_mut(id)?;
        stored.description = description.to_string();
        Ok(stored.clone())
    }

    async fn set_publication_locked(&self, id: Uuid, locked: bool) -> CoreResult<Publication> {
        let mut store = self.write()?;
        let stored = store.publication_mut(id)?;
        stored.locked = locked;
        Ok(stored.clone())
    }

    async fn delete_publication(&self, id: Uuid) -> CoreResult<bool> {
        let mut store = self.write()?;
        if store.publications.remove(&id).is_none() {
            return Ok(false);
        }

        let comment_ids: HashSet<Uuid> = store
            .comments
            .values()
            .filter(|c| c.publication_id == id)
            .map(|c| c.id)
            .collect();
        store.remove_comments(&comment_ids);

        store.images.retain(|_, image| {
            image.owner != ImageOwner::Publication { publication_id: id }
        });
        store
            .reactions
            .retain(|_, reaction| reaction.target != ReactionTarget::publication(id));
        Ok(true)
    }

    async fn publication_images(&self, publication_id: Uuid) -> CoreResult<Vec<Image>> {
        let mut images: Vec<Image> = self
            .read()?
            .images
            .values()
            .filter(|i| i.owner == ImageOwner::Publication { publication_id })
            .cloned()
            .collect();
        images.sort_by_key(|i| i.id);
        Ok(images)
    }

    async fn find_avatar(&self, user_id: Uuid) -> CoreResult<Option<Image>> {
        Ok(self
            .read()?
            .images
            .values()
            .find(|i| i.owner == ImageOwner::Avatar { user_id })
            .cloned())
    }

    async fn replace_avatar(&self, user_id: Uuid, mut image: Image) -> CoreResult<Option<Image>> {
        let mut store = self.write()?;
        let previous_id = store
            .images
            .values()
            .find(|i| i.owner == ImageOwner::Avatar { user_id })
            .map(|i| i.id);
        let previous = previous_id.and_then(|id| store.images.remove(&id));

        image.owner = ImageOwner::Avatar { user_id };
        store.images.insert(image.id, image);
        Ok(previous)
    }

    async fn find_comment(&self, id: Uuid) -> CoreResult<Option<Comment>> {
        Ok(self.read()?.comments.get(&id).cloned())
    }

    async fn publication_comments(&self, publication_id: Uuid) -> CoreResult<Vec<Comment>> {
        let mut comments: Vec<Comment> = self
            .read()?
            .comments
            .values()
            .filter(|c| c.publication_id == publication_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn insert_comment(&self, comment: Comment) -> CoreResult<Comment> {
        let mut store = self.write()?;
        if !store.publications.contains_key(&comment.publication_id) {
            return Err(CoreError::not_found("publication not found"));
        }
        if let Some(parent) = comment.parent_id {
            if !store.comments.contains_key(&parent) {
                return Err(CoreError::not_found("parent comment not found"));
            }
        }
        store.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn update_comment(&self, comment: Comment) -> CoreResult<Comment> {
        let mut store = self.write()?;
        let stored = store
            .comments
            .get_mut(&comment.id)
            .ok_or_else(|| CoreError::not_found("comment not found"))?;
        stored.content = comment.content;
        Ok(stored.clone())
    }

    async fn delete_comment(&self, id: Uuid) -> CoreResult<bool> {
        let mut store = self.write()?;
        if !store.comments.contains_key(&id) {
            return Ok(false);
        }
        let subtree = store.comment_subtree(id);
        store.remove_comments(&subtree);
        Ok(true)
    }

    async fn find_reaction(&self, id: Uuid) -> CoreResult<Option<Reaction>> {
        Ok(self.read()?.reactions.get(&id).cloned())
    }

    async fn find_user_reaction(
        &self,
        user_id: Uuid,
        target: ReactionTarget,
        kind: ReactionKind,
    ) -> CoreResult<Option<Reaction>> {
        Ok(self
            .read()?
            .reactions
            .values()
            .find(|r| r.user_id == user_id && r.target == target && r.kind == kind)
            .cloned())
    }

    async fn target_reactions(&self, target: ReactionTarget) -> CoreResult<Vec<Reaction>> {
        let mut reactions: Vec<Reaction> = self
            .read()?
            .reactions
            .values()
            .filter(|r| r.target == target)
            .cloned()
            .collect();
        reactions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(reactions)
    }

    async fn count_reactions(&self, target: ReactionTarget) -> CoreResult<ReactionCounts> {
        Ok(self.read()?.counts(target))
    }

    async fn insert_reaction(&self, reaction: Reaction) -> CoreResult<Reaction> {
        let mut store = self.write()?;
        let duplicate = store.reactions.values().any(|r| {
            r.user_id == reaction.user_id && r.target == reaction.target && r.kind == reaction.kind
        });
        if duplicate {
            return Err(CoreError::conflict(reaction.kind.duplicate_message()));
        }
        store.reactions.insert(reaction.id, reaction.clone());
        Ok(reaction)
    }

    async fn delete_reaction(&self, id: Uuid) -> CoreResult<bool> {
        Ok(self.write()?.reactions.remove(&id).is_some())
    }
}
