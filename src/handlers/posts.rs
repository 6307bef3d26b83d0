use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    dto::{StoreCommentDto, StorePostDto, UpdatePostDto},
    errors::AppResult,
    extract::{ValidatedJson, ValidatedQuery},
    models::{Commentable, Post},
    permissions::{Action, Resource},
    policy::{AuthUser, authorize, authorize_on},
    requests::{NestedCommentRequest, PageRequest, StorePostRequest},
    resources::{CommentResource, Created, JsonResponse, PostResource, created, ok, paginated},
    services::{CommentService, PostService, ensure_exists},
};

/// # Errors
/// Returns forbidden or database errors.
pub async fn index(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    ValidatedQuery(query): ValidatedQuery<PageRequest>,
) -> AppResult<JsonResponse<Vec<PostResource>>> {
    authorize(&actor, Resource::Post, Action::ViewAny)?;
    let page = PostService::new(&state.db).index(query.into()).await?;
    Ok(paginated("Posts retrieved", page))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn show(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(post): Path<String>,
) -> AppResult<JsonResponse<PostResource>> {
    let post = PostService::new(&state.db).show(&post).await?;
    authorize_on(&actor, Resource::Post, Action::View, &post)?;
    Ok(ok("Post retrieved", post.into()))
}

/// # Errors
/// Returns forbidden, validation or database errors.
pub async fn store(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    ValidatedJson(payload): ValidatedJson<StorePostRequest>,
) -> AppResult<Created<PostResource>> {
    authorize(&actor, Resource::Post, Action::Create)?;
    if let Some(book_id) = payload.book_id {
        ensure_exists(&state.db, "books", "book_id", &[book_id]).await?;
    }

    let dto = StorePostDto::from_request(payload, actor.id)?;
    let post = PostService::new(&state.db).store(dto).await?;
    Ok(created("Post created", post.into()))
}

/// # Errors
/// Returns not found, forbidden, validation or database errors.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(post): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdatePostDto>,
) -> AppResult<JsonResponse<PostResource>> {
    let service = PostService::new(&state.db);
    let post = service.find(&post).await?;
    authorize_on(&actor, Resource::Post, Action::Update, &post)?;
    let post = service.update(dto, &post).await?;
    Ok(ok("Post updated", post.into()))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(post): Path<String>,
) -> AppResult<StatusCode> {
    let service = PostService::new(&state.db);
    let post = service.find(&post).await?;
    authorize_on(&actor, Resource::Post, Action::Delete, &post)?;
    service.destroy(&post).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn viewable(state: &AppState, actor: &AuthUser, slug: &str) -> AppResult<Post> {
    let post = PostService::new(&state.db).find(slug).await?;
    authorize_on(actor, Resource::Post, Action::View, &post)?;
    Ok(post)
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn comments(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(post): Path<String>,
    ValidatedQuery(query): ValidatedQuery<PageRequest>,
) -> AppResult<JsonResponse<Vec<CommentResource>>> {
    let post = viewable(&state, &actor, &post).await?;
    authorize(&actor, Resource::Comment, Action::ViewAny)?;
    let page = CommentService::new(&state.db)
        .by_commentable(Commentable::Post(post.id), query.into())
        .await?;
    Ok(paginated("Comments retrieved", page))
}

/// Commenting on a post requires following its author.
///
/// # Errors
/// Returns a conflict when the caller does not follow the author, or not found,
/// forbidden, validation and database errors.
pub async fn store_comment(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(post): Path<String>,
    ValidatedJson(payload): ValidatedJson<NestedCommentRequest>,
) -> AppResult<Created<CommentResource>> {
    let post = viewable(&state, &actor, &post).await?;
    authorize(&actor, Resource::Comment, Action::Create)?;
    let dto = StoreCommentDto::nested(payload, Commentable::Post(post.id), actor.id)?;
    let comment = CommentService::new(&state.db)
        .store_by_post(&post, dto.user_id, dto.body)
        .await?;
    Ok(created("Comment created", comment.into()))
}
