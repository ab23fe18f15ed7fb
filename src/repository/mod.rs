use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::CoreResult,
    identity::RoleSet,
    models::{Comment, Image, Publication, Reaction, ReactionCounts, ReactionKind, ReactionTarget, User},
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// Repository Trait
///
/// Persistence contract consumed by the core services. Every method is a single
/// atomic unit: multi-row writes (publication with its images, cascading
/// deletes) either fully apply or leave the store untouched.
///
/// Updates are column-targeted: each write touches only the fields it names,
/// so two requests working from older snapshots of the same row cannot undo
/// each other's changes (an edit never resets a lock or a ban).
///
/// Uniqueness is the store's job. `insert_user` fails with `Conflict` on a taken
/// username and `insert_reaction` fails with `Conflict` when the same
/// (user, target, kind) already exists, which closes the race between two
/// concurrent duplicate requests that both passed the service-level check.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn find_user(&self, id: Uuid) -> CoreResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> CoreResult<Option<User>>;
    async fn insert_user(&self, user: User) -> CoreResult<User>;
    /// Changes username and password hash only. Roles and ban state are untouched.
    async fn update_credentials(
        &self,
        id: Uuid,
        username: &str,
        password_hash: &str,
    ) -> CoreResult<User>;
    async fn set_roles(&self, id: Uuid, roles: &RoleSet) -> CoreResult<User>;
    async fn set_banned_until(&self, id: Uuid, until: DateTime<Utc>) -> CoreResult<User>;
    /// Resets `banned_until` to the epoch sentinel, but only while the stored
    /// ban still runs past `now`. `Conflict` when it does not.
    async fn clear_ban(&self, id: Uuid, now: DateTime<Utc>) -> CoreResult<User>;

    // --- Publications ---
    async fn find_publication(&self, id: Uuid) -> CoreResult<Option<Publication>>;
    /// Newest first.
    async fn list_publications(&self, limit: i64, offset: i64) -> CoreResult<Vec<Publication>>;
    async fn list_user_publications(&self, user_id: Uuid) -> CoreResult<Vec<Publication>>;
    /// Inserts the publication and all of its images together.
    async fn insert_publication(
        &self,
        publication: Publication,
        images: Vec<Image>,
    ) -> CoreResult<Publication>;
    /// Writes the description column only; the locked flag is left as stored.
    async fn update_publication_description(
        &self,
        id: Uuid,
        description: &str,
    ) -> CoreResult<Publication>;
    /// Writes the locked flag only.
    async fn set_publication_locked(&self, id: Uuid, locked: bool) -> CoreResult<Publication>;
    /// Removes the publication with its images, comments (all depths) and every
    /// reaction on any of them. Returns false when nothing matched.
    async fn delete_publication(&self, id: Uuid) -> CoreResult<bool>;

    // --- Images ---
    async fn publication_images(&self, publication_id: Uuid) -> CoreResult<Vec<Image>>;
    async fn find_avatar(&self, user_id: Uuid) -> CoreResult<Option<Image>>;
    /// Stores `image` as the user's avatar and returns the one it replaced.
    async fn replace_avatar(&self, user_id: Uuid, image: Image) -> CoreResult<Option<Image>>;

    // --- Comments ---
    async fn find_comment(&self, id: Uuid) -> CoreResult<Option<Comment>>;
    /// Every comment of the publication, all depths, oldest first.
    async fn publication_comments(&self, publication_id: Uuid) -> CoreResult<Vec<Comment>>;
    async fn insert_comment(&self, comment: Comment) -> CoreResult<Comment>;
    /// Overwrites the content.
    async fn update_comment(&self, comment: Comment) -> CoreResult<Comment>;
    /// Removes the comment, its descendants and their reactions.
    async fn delete_comment(&self, id: Uuid) -> CoreResult<bool>;

    // --- Reactions ---
    async fn find_reaction(&self, id: Uuid) -> CoreResult<Option<Reaction>>;
    async fn find_user_reaction(
        &self,
        user_id: Uuid,
        target: ReactionTarget,
        kind: ReactionKind,
    ) -> CoreResult<Option<Reaction>>;
    async fn target_reactions(&self, target: ReactionTarget) -> CoreResult<Vec<Reaction>>;
    async fn count_reactions(&self, target: ReactionTarget) -> CoreResult<ReactionCounts>;
    async fn insert_reaction(&self, reaction: Reaction) -> CoreResult<Reaction>;
    async fn delete_reaction(&self, id: Uuid) -> CoreResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;
