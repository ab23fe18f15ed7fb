use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::identity::{Role, RoleSet};

// --- Core Domain Entities ---

/// User
///
/// Canonical account record. The password hash never leaves the server; the
/// public view of a user is `UserProfile`.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    // Natural key, unique across all accounts.
    pub username: String,
    pub roles: RoleSet,
    pub password_hash: String,
    // Epoch means "not banned".
    pub banned_until: DateTime<Utc>,
}

/// Publication
///
/// A post owned by exactly one user. Images, comments and reactions hang off it
/// and disappear with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Publication {
    pub id: Uuid,
    // Owner, fixed at creation.
    pub user_id: Uuid,
    pub description: String,
    // While true, no new comments or replies are accepted.
    pub locked: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Comment
///
/// A node of the per-publication comment forest. The parent is an id, never a
/// live reference; `publication_id` always equals the root ancestor's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Comment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub publication_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// ImageOwner
///
/// An image belongs either to a publication or is a user's avatar, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum ImageOwner {
    Publication { publication_id: Uuid },
    Avatar { user_id: Uuid },
}

/// Image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Image {
    pub id: Uuid,
    pub description: String,
    // Object key inside the storage bucket; used to delete the blob.
    pub key: String,
    pub url: String,
    pub owner: ImageOwner,
}

/// ReactionKind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "LIKE",
            ReactionKind::Dislike => "DISLIKE",
        }
    }

    /// Message used when the same user already holds this kind on a target.
    pub fn duplicate_message(&self) -> &'static str {
        match self {
            ReactionKind::Like => "already liked",
            ReactionKind::Dislike => "already disliked",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "LIKE" => Some(ReactionKind::Like),
            "DISLIKE" => Some(ReactionKind::Dislike),
            _ => None,
        }
    }
}

/// ReactionTarget
///
/// What a like or dislike points at: a publication or a comment, exclusively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum ReactionTarget {
    Publication { publication_id: Uuid },
    Comment { comment_id: Uuid },
}

impl ReactionTarget {
    pub fn publication(id: Uuid) -> Self {
        ReactionTarget::Publication { publication_id: id }
    }

    pub fn comment(id: Uuid) -> Self {
        ReactionTarget::Comment { comment_id: id }
    }
}

/// Reaction
///
/// A like or a dislike. At most one of each kind per (user, target).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Reaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: ReactionKind,
    pub target: ReactionTarget,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ReactionCounts {
    pub likes: i64,
    pub dislikes: i64,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterUserRequest
///
/// Input payload for POST /register. The password is hashed immediately and never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub username: String,
    pub password: String,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// TokenResponse
///
/// Bearer token issued on successful login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[ts(type = "string")]
    pub expires_at: DateTime<Utc>,
}

/// UpdateAccountRequest
///
/// Partial update of the caller's own account (PATCH /me).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateAccountRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// SetRolesRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SetRolesRequest {
    pub roles: Vec<Role>,
}

/// BanRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BanRequest {
    /// Calendar days in the server's time zone.
    #[schema(example = 3)]
    pub duration_days: u32,
}

/// NewImage
///
/// Reference to an object already uploaded through a presigned URL.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct NewImage {
    #[schema(example = "uploads/3f0c7a5e-8c1f-4a52-9d1e-0e6b4f3a2c11.jpg")]
    pub key: String,
    #[serde(default)]
    pub description: String,
}

/// CreatePublicationRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePublicationRequest {
    pub description: String,
    #[serde(default)]
    pub images: Vec<NewImage>,
}

/// UpdatePublicationRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePublicationRequest {
    pub description: String,
}

/// CreateCommentRequest
///
/// When `parent_id` is set the comment is a reply and lands on the parent's
/// publication, whatever publication the request was addressed to.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
}

/// UpdateCommentRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCommentRequest {
    pub content: String,
}

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived upload URL (POST /upload/presigned).
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    /// The original filename, used to derive the file extension.
    #[schema(example = "holiday.jpg")]
    pub filename: String,
    /// Must be an `image/*` MIME type.
    #[schema(example = "image/jpeg")]
    pub file_type: String,
}

/// PresignedUrlResponse
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    /// The time-limited URL for the PUT request.
    pub upload_url: String,
    /// The object key to reference in `NewImage.key`.
    pub resource_key: String,
}

// --- Output Schemas ---

/// UserProfile
///
/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub roles: Vec<Role>,
    #[ts(type = "string")]
    pub banned_until: DateTime<Utc>,
    pub avatar_url: Option<String>,
}

impl UserProfile {
    pub fn from_user(user: &User, avatar: Option<&Image>) -> Self {
        UserProfile {
            id: user.id,
            username: user.username.clone(),
            roles: user.roles.to_vec(),
            banned_until: user.banned_until,
            avatar_url: avatar.map(|image| image.url.clone()),
        }
    }
}

/// PublicationView
///
/// A publication with its images, author name and `likes`/`dislikes` totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PublicationView {
    pub publication: Publication,
    pub author: String,
    pub images: Vec<Image>,
    /// Serialized as top-level `likes` and `dislikes`.
    #[serde(flatten)]
    pub reactions: ReactionCounts,
}

/// CommentNode
///
/// One comment with its `likes`/`dislikes` totals and nested replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CommentNode {
    pub comment: Comment,
    #[serde(flatten)]
    pub reactions: ReactionCounts,
    #[schema(no_recursion)]
    pub replies: Vec<CommentNode>,
}
