use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    dto::{StoreCommentDto, UpdateCommentDto},
    errors::AppResult,
    extract::{ValidatedJson, ValidatedQuery},
    models::CommentableType,
    permissions::{Action, Resource},
    policy::{AuthUser, authorize, authorize_on},
    requests::{PageRequest, StoreCommentRequest},
    resources::{CommentResource, Created, JsonResponse, created, ok, paginated},
    services::{CommentService, ensure_exists},
};

/// # Errors
/// Returns forbidden or database errors.
pub async fn index(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    ValidatedQuery(query): ValidatedQuery<PageRequest>,
) -> AppResult<JsonResponse<Vec<CommentResource>>> {
    authorize(&actor, Resource::Comment, Action::ViewAny)?;
    let page = CommentService::new(&state.db).index(query.into()).await?;
    Ok(paginated("Comments retrieved", page))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn show(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(comment): Path<String>,
) -> AppResult<JsonResponse<CommentResource>> {
    let comment = CommentService::new(&state.db).show(&comment).await?;
    authorize_on(&actor, Resource::Comment, Action::View, &comment)?;
    Ok(ok("Comment retrieved", comment.into()))
}

/// Comment on any book, post or review named in the body.
///
/// # Errors
/// Returns a conflict when the follow rule fails, or forbidden, validation and
/// database errors.
pub async fn store(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    ValidatedJson(payload): ValidatedJson<StoreCommentRequest>,
) -> AppResult<Created<CommentResource>> {
    authorize(&actor, Resource::Comment, Action::Create)?;
    if let (Some(kind), Some(id)) = (payload.commentable_type, payload.commentable_id) {
        let table = match kind {
            CommentableType::Book => "books",
            CommentableType::Post => "posts",
            CommentableType::Review => "reviews",
        };
        ensure_exists(&state.db, table, "commentable_id", &[id]).await?;
    }

    let dto = StoreCommentDto::from_request(payload, actor.id)?;
    let comment = CommentService::new(&state.db).store(dto).await?;
    Ok(created("Comment created", comment.into()))
}

/// # Errors
/// Returns not found, forbidden, validation or database errors.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(comment): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdateCommentDto>,
) -> AppResult<JsonResponse<CommentResource>> {
    let service = CommentService::new(&state.db);
    let comment = service.find(&comment).await?;
    authorize_on(&actor, Resource::Comment, Action::Update, &comment)?;
    let comment = service.update(dto, &comment).await?;
    Ok(ok("Comment updated", comment.into()))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(comment): Path<String>,
) -> AppResult<StatusCode> {
    let service = CommentService::new(&state.db);
    let comment = service.find(&comment).await?;
    authorize_on(&actor, Resource::Comment, Action::Delete, &comment)?;
    service.destroy(&comment).await?;
    Ok(StatusCode::NO_CONTENT)
}
