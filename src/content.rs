//! Content Graph operations: publications, threaded comments and their images.
//!
//! Every mutating operation resolves the entities it touches first, asks the
//! Authorization Engine for a verdict, and only then writes. A failure at any
//! step returns before anything is persisted.

use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    AppState,
    authorization::{can_edit_or_delete_content, require},
    error::{CoreError, CoreResult},
    identity::Identity,
    models::{
        Comment, CommentNode, CreateCommentRequest, CreatePublicationRequest, Image, ImageOwner,
        NewImage, Publication, PublicationView, ReactionCounts, ReactionTarget, UpdateCommentRequest,
        UpdatePublicationRequest,
    },
    storage::sanitize_key,
};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

fn required_text(value: &str, field: &str) -> CoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn image_from_upload(state: &AppState, upload: &NewImage, owner: ImageOwner) -> CoreResult<Image> {
    let key = sanitize_key(&upload.key);
    if key.is_empty() {
        return Err(CoreError::validation("image key is required"));
    }
    Ok(Image {
        id: Uuid::new_v4(),
        description: upload.description.trim().to_string(),
        url: state.storage.public_url(&key),
        key,
        owner,
    })
}

async fn load_publication(state: &AppState, id: Uuid) -> CoreResult<Publication> {
    state
        .repo
        .find_publication(id)
        .await?
        .ok_or_else(|| CoreError::not_found("publication not found"))
}

async fn load_comment(state: &AppState, id: Uuid) -> CoreResult<Comment> {
    state
        .repo
        .find_comment(id)
        .await?
        .ok_or_else(|| CoreError::not_found("comment not found"))
}

/// Snapshot of a content owner for authorization.
async fn load_owner(state: &AppState, user_id: Uuid) -> CoreResult<Identity> {
    state
        .repo
        .find_user(user_id)
        .await?
        .map(|user| Identity::from(&user))
        .ok_or_else(|| CoreError::not_found("user not found"))
}

/// Best-effort blob removal once the rows are already gone.
pub(crate) async fn remove_blobs(state: &AppState, images: &[Image]) {
    for image in images {
        if let Err(e) = state.storage.delete_object(&image.key).await {
            tracing::warn!(key = %image.key, "failed to delete image blob: {}", e);
        }
    }
}

// --- Publications ---

pub async fn create_publication(
    state: &AppState,
    actor: &Identity,
    req: CreatePublicationRequest,
) -> CoreResult<PublicationView> {
    let description = required_text(&req.description, "description")?;

    let publication = Publication {
        id: Uuid::new_v4(),
        user_id: actor.id,
        description,
        locked: false,
        created_at: state.clock.now().to_utc(),
    };
    let owner = ImageOwner::Publication {
        publication_id: publication.id,
    };
    let images = req
        .images
        .iter()
        .map(|upload| image_from_upload(state, upload, owner))
        .collect::<CoreResult<Vec<_>>>()?;

    let created = state.repo.insert_publication(publication, images).await?;
    tracing::info!(publication_id = %created.id, user_id = %actor.id, "publication created");
    get_publication(state, created.id).await
}

pub async fn get_publication(state: &AppState, id: Uuid) -> CoreResult<PublicationView> {
    let publication = load_publication(state, id).await?;
    view_of(state, publication).await
}

async fn view_of(state: &AppState, publication: Publication) -> CoreResult<PublicationView> {
    let author = state
        .repo
        .find_user(publication.user_id)
        .await?
        .map(|u| u.username)
        .unwrap_or_default();
    let images = state.repo.publication_images(publication.id).await?;
    let reactions = state
        .repo
        .count_reactions(ReactionTarget::publication(publication.id))
        .await?;

    Ok(PublicationView {
        publication,
        author,
        images,
        reactions,
    })
}

/// Newest first. `limit` is clamped to 1..=100 and defaults to 20.
pub async fn list_publications(
    state: &AppState,
    limit: Option<i64>,
    offset: Option<i64>,
) -> CoreResult<Vec<PublicationView>> {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);

    let mut views = Vec::new();
    for publication in state.repo.list_publications(limit, offset).await? {
        views.push(view_of(state, publication).await?);
    }
    Ok(views)
}

pub async fn list_user_publications(
    state: &AppState,
    user_id: Uuid,
) -> CoreResult<Vec<PublicationView>> {
    load_owner(state, user_id).await?;

    let mut views = Vec::new();
    for publication in state.repo.list_user_publications(user_id).await? {
        views.push(view_of(state, publication).await?);
    }
    Ok(views)
}

/// Edits stay allowed on locked publications; the lock only freezes new comments.
pub async fn update_publication_description(
    state: &AppState,
    actor: &Identity,
    id: Uuid,
    req: UpdatePublicationRequest,
) -> CoreResult<PublicationView> {
    let publication = load_publication(state, id).await?;
    let owner = load_owner(state, publication.user_id).await?;
    require(
        can_edit_or_delete_content(actor, &owner),
        "not allowed to edit this publication",
    )?;

    let description = required_text(&req.description, "description")?;
    let updated = state
        .repo
        .update_publication_description(publication.id, &description)
        .await?;
    view_of(state, updated).await
}

/// delete_publication
///
/// Removes the publication with its images, comments at every depth and all
/// reactions in one repository call, then deletes the image blobs.
pub async fn delete_publication(state: &AppState, actor: &Identity, id: Uuid) -> CoreResult<()> {
    let publication = load_publication(state, id).await?;
    let owner = load_owner(state, publication.user_id).await?;
    require(
        can_edit_or_delete_content(actor, &owner),
        "not allowed to delete this publication",
    )?;

    let images = state.repo.publication_images(id).await?;
    if !state.repo.delete_publication(id).await? {
        return Err(CoreError::not_found("publication not found"));
    }
    remove_blobs(state, &images).await;

    tracing::info!(publication_id = %id, actor_id = %actor.id, "publication deleted");
    Ok(())
}

// --- Comments ---

/// create_comment
///
/// A reply always lands on its parent's publication, whatever `publication_id`
/// the request named. Creation is refused with `Locked` when either the named
/// publication or the parent's publication is locked.
pub async fn create_comment(
    state: &AppState,
    actor: &Identity,
    publication_id: Uuid,
    req: CreateCommentRequest,
) -> CoreResult<Comment> {
    let content = required_text(&req.content, "content")?;
    let addressed = load_publication(state, publication_id).await?;

    let (publication, parent_id) = match req.parent_id {
        Some(parent_id) => {
            let parent = load_comment(state, parent_id).await?;
            let parent_publication = if parent.publication_id == addressed.id {
                addressed.clone()
            } else {
                load_publication(state, parent.publication_id).await?
            };
            (parent_publication, Some(parent.id))
        }
        None => (addressed.clone(), None),
    };

    if addressed.locked || publication.locked {
        tracing::warn!(publication_id = %publication.id, actor_id = %actor.id, "comment on locked publication refused");
        return Err(CoreError::locked("publication is locked"));
    }

    let comment = Comment {
        id: Uuid::new_v4(),
        user_id: actor.id,
        publication_id: publication.id,
        parent_id,
        content,
        created_at: state.clock.now().to_utc(),
    };
    state.repo.insert_comment(comment).await
}

pub async fn update_comment(
    state: &AppState,
    actor: &Identity,
    id: Uuid,
    req: UpdateCommentRequest,
) -> CoreResult<Comment> {
    let mut comment = load_comment(state, id).await?;
    let owner = load_owner(state, comment.user_id).await?;
    require(
        can_edit_or_delete_content(actor, &owner),
        "not allowed to edit this comment",
    )?;

    comment.content = required_text(&req.content, "content")?;
    state.repo.update_comment(comment).await
}

/// Removes the comment, every reply below it and their reactions.
pub async fn delete_comment(state: &AppState, actor: &Identity, id: Uuid) -> CoreResult<()> {
    let comment = load_comment(state, id).await?;
    let owner = load_owner(state, comment.user_id).await?;
    require(
        can_edit_or_delete_content(actor, &owner),
        "not allowed to delete this comment",
    )?;

    if !state.repo.delete_comment(id).await? {
        return Err(CoreError::not_found("comment not found"));
    }
    tracing::info!(comment_id = %id, actor_id = %actor.id, "comment deleted");
    Ok(())
}

/// comment_thread
///
/// Rebuilds the comment forest of a publication from the flat list: children
/// are grouped by parent id and attached recursively, oldest first.
pub async fn comment_thread(state: &AppState, publication_id: Uuid) -> CoreResult<Vec<CommentNode>> {
    load_publication(state, publication_id).await?;
    let comments = state.repo.publication_comments(publication_id).await?;

    let mut counts = HashMap::with_capacity(comments.len());
    for comment in &comments {
        let tally = state
            .repo
            .count_reactions(ReactionTarget::comment(comment.id))
            .await?;
        counts.insert(comment.id, tally);
    }

    let mut by_parent: HashMap<Option<Uuid>, Vec<Comment>> = HashMap::new();
    for comment in comments {
        by_parent.entry(comment.parent_id).or_default().push(comment);
    }

    Ok(build_forest(None, &mut by_parent, &counts))
}

fn build_forest(
    parent: Option<Uuid>,
    by_parent: &mut HashMap<Option<Uuid>, Vec<Comment>>,
    counts: &HashMap<Uuid, ReactionCounts>,
) -> Vec<CommentNode> {
    let Some(mut level) = by_parent.remove(&parent) else {
        return Vec::new();
    };
    level.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    level
        .into_iter()
        .map(|comment| {
            let replies = build_forest(Some(comment.id), by_parent, counts);
            let reactions = counts.get(&comment.id).copied().unwrap_or_default();
            CommentNode {
                comment,
                reactions,
                replies,
            }
        })
        .collect()
}
