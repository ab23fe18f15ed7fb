use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
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

const PUBLICATION_COLUMNS: &str = "id, user_id, description, locked, created_at";
const COMMENT_COLUMNS: &str = "id, user_id, publication_id, parent_id, content, created_at";
const IMAGE_COLUMNS: &str = "id, description, storage_key, url, publication_id, user_id";
const REACTION_COLUMNS: &str = "id, user_id, kind, publication_id, comment_id, created_at";
const USER_COLUMNS: &str = "id, username, password_hash, roles, banned_until";

// --- Row types ---
//
// Tables store the tagged unions as pairs of nullable foreign keys guarded by a
// CHECK constraint; these rows rebuild the Rust enums and reject any pair the
// constraint should have made impossible.

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password_hash: String,
    roles: Vec<String>,
    banned_until: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = CoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            username: row.username,
            roles: RoleSet::parse(&row.roles).map_err(CoreError::internal)?,
            password_hash: row.password_hash,
            banned_until: row.banned_until,
        })
    }
}

#[derive(FromRow)]
struct ImageRow {
    id: Uuid,
    description: String,
    storage_key: String,
    url: String,
    publication_id: Option<Uuid>,
    user_id: Option<Uuid>,
}

impl TryFrom<ImageRow> for Image {
    type Error = CoreError;

    fn try_from(row: ImageRow) -> Result<Self, Self::Error> {
        let owner = match (row.publication_id, row.user_id) {
            (Some(publication_id), None) => ImageOwner::Publication { publication_id },
            (None, Some(user_id)) => ImageOwner::Avatar { user_id },
            _ => return Err(CoreError::internal(format!("image {} has no single owner", row.id))),
        };
        Ok(Image {
            id: row.id,
            description: row.description,
            key: row.storage_key,
            url: row.url,
            owner,
        })
    }
}

#[derive(FromRow)]
struct ReactionRow {
    id: Uuid,
    user_id: Uuid,
    kind: String,
    publication_id: Option<Uuid>,
    comment_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReactionRow> for Reaction {
    type Error = CoreError;

    fn try_from(row: ReactionRow) -> Result<Self, Self::Error> {
        let target = match (row.publication_id, row.comment_id) {
            (Some(id), None) => ReactionTarget::publication(id),
            (None, Some(id)) => ReactionTarget::comment(id),
            _ => return Err(CoreError::internal(format!("reaction {} has no single target", row.id))),
        };
        let kind = ReactionKind::parse(&row.kind)
            .ok_or_else(|| CoreError::internal(format!("unknown reaction kind '{}'", row.kind)))?;
        Ok(Reaction {
            id: row.id,
            user_id: row.user_id,
            kind,
            target,
            created_at: row.created_at,
        })
    }
}

/// Column and id a reaction target is stored under.
fn target_column(target: ReactionTarget) -> (&'static str, Uuid) {
    match target {
        ReactionTarget::Publication { publication_id } => ("publication_id", publication_id),
        ReactionTarget::Comment { comment_id } => ("comment_id", comment_id),
    }
}

/// Maps a unique-constraint violation to `Conflict`, everything else to `Internal`.
fn unique_or_internal(err: sqlx::Error, conflict_message: &str) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return CoreError::conflict(conflict_message);
        }
    }
    CoreError::from(err)
}

/// Maps a foreign-key violation to `NotFound`: the referenced row was deleted
/// between the service's lookup and this insert.
fn missing_reference_or_internal(err: sqlx::Error, not_found_message: &str) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_foreign_key_violation() {
            return CoreError::not_found(not_found_message);
        }
    }
    CoreError::from(err)
}

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. Cascades are delegated to the
/// `ON DELETE CASCADE` foreign keys, so each delete is one statement.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled migrations in `./migrations`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn find_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> CoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn insert_user(&self, user: User) -> CoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (id, username, password_hash, roles, banned_until)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.roles.to_strings())
        .bind(user.banned_until)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_or_internal(e, "username is already taken"))?;
        User::try_from(row)
    }

    async fn update_credentials(
        &self,
        id: Uuid,
        username: &str,
        password_hash: &str,
    ) -> CoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET username = $2, password_hash = $3
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(username)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_or_internal(e, "username is already taken"))?
        .ok_or_else(|| CoreError::not_found("user not found"))?;
        User::try_from(row)
    }

    async fn set_roles(&self, id: Uuid, roles: &RoleSet) -> CoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET roles = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(roles.to_strings())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CoreError::not_found("user not found"))?;
        User::try_from(row)
    }

    async fn set_banned_until(&self, id: Uuid, until: DateTime<Utc>) -> CoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET banned_until = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(until)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CoreError::not_found("user not found"))?;
        User::try_from(row)
    }

    /// clear_ban
    ///
    /// The still-banned condition sits in the `WHERE` clause, so the check and
    /// the reset are one statement. No row back means either no such user or
    /// no running ban.
    async fn clear_ban(&self, id: Uuid, now: DateTime<Utc>) -> CoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET banned_until = $3
             WHERE id = $1 AND banned_until > $2
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(now)
        .bind(not_banned())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => User::try_from(row),
            None if self.find_user(id).await?.is_some() => {
                Err(CoreError::conflict("user is not banned"))
            }
            None => Err(CoreError::not_found("user not found")),
        }
    }

    // --- PUBLICATIONS ---

    async fn find_publication(&self, id: Uuid) -> CoreResult<Option<Publication>> {
        Ok(sqlx::query_as::<_, Publication>(&format!(
            "SELECT {PUBLICATION_COLUMNS} FROM publications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_publications(&self, limit: i64, offset: i64) -> CoreResult<Vec<Publication>> {
        Ok(sqlx::query_as::<_, Publication>(&format!(
            "SELECT {PUBLICATION_COLUMNS} FROM publications
             ORDER BY created_at DESC, id
             LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_user_publications(&self, user_id: Uuid) -> CoreResult<Vec<Publication>> {
        Ok(sqlx::query_as::<_, Publication>(&format!(
            "SELECT {PUBLICATION_COLUMNS} FROM publications
             WHERE user_id = $1
             ORDER BY created_at DESC, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// insert_publication
    ///
    /// Publication and images go in under one transaction; a failing image
    /// insert rolls the publication back when `tx` is dropped.
    async fn insert_publication(
        &self,
        publication: Publication,
        images: Vec<Image>,
    ) -> CoreResult<Publication> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Publication>(&format!(
            "INSERT INTO publications (id, user_id, description, locked, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {PUBLICATION_COLUMNS}"
        ))
        .bind(publication.id)
        .bind(publication.user_id)
        .bind(&publication.description)
        .bind(publication.locked)
        .bind(publication.created_at)
        .fetch_one(&mut *tx)
        .await?;

        for image in images {
            sqlx::query(
                "INSERT INTO images (id, description, storage_key, url, publication_id)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(image.id)
            .bind(&image.description)
            .bind(&image.key)
            .bind(&image.url)
            .bind(created.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn update_publication_description(
        &self,
        id: Uuid,
        description: &str,
    ) -> CoreResult<Publication> {
        sqlx::query_as::<_, Publication>(&format!(
            "UPDATE publications SET description = $2
             WHERE id = $1
             RETURNING {PUBLICATION_COLUMNS}"
        ))
        .bind(id)
        .bind(description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CoreError::not_found("publication not found"))
    }

    async fn set_publication_locked(&self, id: Uuid, locked: bool) -> CoreResult<Publication> {
        sqlx::query_as::<_, Publication>(&format!(
            "UPDATE publications SET locked = $2
             WHERE id = $1
             RETURNING {PUBLICATION_COLUMNS}"
        ))
        .bind(id)
        .bind(locked)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CoreError::not_found("publication not found"))
    }

    async fn delete_publication(&self, id: Uuid) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM publications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- IMAGES ---

    async fn publication_images(&self, publication_id: Uuid) -> CoreResult<Vec<Image>> {
        sqlx::query_as::<_, ImageRow>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE publication_id = $1 ORDER BY id"
        ))
        .bind(publication_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Image::try_from)
        .collect()
    }

    async fn find_avatar(&self, user_id: Uuid) -> CoreResult<Option<Image>> {
        sqlx::query_as::<_, ImageRow>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Image::try_from)
        .transpose()
    }

    async fn replace_avatar(&self, user_id: Uuid, image: Image) -> CoreResult<Option<Image>> {
        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_as::<_, ImageRow>(&format!(
            "DELETE FROM images WHERE user_id = $1 RETURNING {IMAGE_COLUMNS}"
        ))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(Image::try_from)
        .transpose()?;

        sqlx::query(
            "INSERT INTO images (id, description, storage_key, url, user_id)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(image.id)
        .bind(&image.description)
        .bind(&image.key)
        .bind(&image.url)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(previous)
    }

    // --- COMMENTS ---

    async fn find_comment(&self, id: Uuid) -> CoreResult<Option<Comment>> {
        Ok(sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn publication_comments(&self, publication_id: Uuid) -> CoreResult<Vec<Comment>> {
        Ok(sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments
             WHERE publication_id = $1
             ORDER BY created_at ASC, id"
        ))
        .bind(publication_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_comment(&self, comment: Comment) -> CoreResult<Comment> {
        Ok(sqlx::query_as::<_, Comment>(&format!(
            "INSERT INTO comments (id, user_id, publication_id, parent_id, content, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(comment.id)
        .bind(comment.user_id)
        .bind(comment.publication_id)
        .bind(comment.parent_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| missing_reference_or_internal(e, "publication or parent comment not found"))?)
    }

    async fn update_comment(&self, comment: Comment) -> CoreResult<Comment> {
        sqlx::query_as::<_, Comment>(&format!(
            "UPDATE comments SET content = $2 WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(comment.id)
        .bind(&comment.content)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CoreError::not_found("comment not found"))
    }

    async fn delete_comment(&self, id: Uuid) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- REACTIONS ---

    async fn find_reaction(&self, id: Uuid) -> CoreResult<Option<Reaction>> {
        sqlx::query_as::<_, ReactionRow>(&format!(
            "SELECT {REACTION_COLUMNS} FROM reactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Reaction::try_from)
        .transpose()
    }

    async fn find_user_reaction(
        &self,
        user_id: Uuid,
        target: ReactionTarget,
        kind: ReactionKind,
    ) -> CoreResult<Option<Reaction>> {
        let (column, target_id) = target_column(target);
        sqlx::query_as::<_, ReactionRow>(&format!(
            "SELECT {REACTION_COLUMNS} FROM reactions
             WHERE user_id = $1 AND kind = $2 AND {column} = $3"
        ))
        .bind(user_id)
        .bind(kind.as_str())
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Reaction::try_from)
        .transpose()
    }

    async fn target_reactions(&self, target: ReactionTarget) -> CoreResult<Vec<Reaction>> {
        let (column, target_id) = target_column(target);
        sqlx::query_as::<_, ReactionRow>(&format!(
            "SELECT {REACTION_COLUMNS} FROM reactions
             WHERE {column} = $1
             ORDER BY created_at ASC, id"
        ))
        .bind(target_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Reaction::try_from)
        .collect()
    }

    async fn count_reactions(&self, target: ReactionTarget) -> CoreResult<ReactionCounts> {
        let (column, target_id) = target_column(target);
        let (likes, dislikes) = sqlx::query_as::<_, (i64, i64)>(&format!(
            "SELECT
                COUNT(*) FILTER (WHERE kind = 'LIKE'),
                COUNT(*) FILTER (WHERE kind = 'DISLIKE')
             FROM reactions WHERE {column} = $1"
        ))
        .bind(target_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(ReactionCounts { likes, dislikes })
    }

    /// insert_reaction
    ///
    /// The partial unique indexes on (user_id, kind, target) are the final word
    /// on duplicates; a violation surfaces as `Conflict`.
    async fn insert_reaction(&self, reaction: Reaction) -> CoreResult<Reaction> {
        let (column, target_id) = target_column(reaction.target);
        sqlx::query_as::<_, ReactionRow>(&format!(
            "INSERT INTO reactions (id, user_id, kind, {column}, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {REACTION_COLUMNS}"
        ))
        .bind(reaction.id)
        .bind(reaction.user_id)
        .bind(reaction.kind.as_str())
        .bind(target_id)
        .bind(reaction.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if matches!(&e, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation()) {
                CoreError::not_found("reaction target not found")
            } else {
                unique_or_internal(e, reaction.kind.duplicate_message())
            }
        })
        .and_then(Reaction::try_from)
    }

    async fn delete_reaction(&self, id: Uuid) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM reactions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
